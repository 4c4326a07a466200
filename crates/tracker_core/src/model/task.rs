use crate::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// A single tracked task, stored as one object in the backing JSON array.
///
/// Date fields stay textual at rest so a hand-edited file with a malformed
/// value still loads; use [`Task::due`] for the parsed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default, deserialize_with = "lenient_description")]
    pub description: String,
    pub status: TaskStatus,
    pub created_at: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub due_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
        }
    }
}

impl Task {
    /// Parsed due date; `None` when absent or not a valid `YYYY-MM-DD`.
    pub fn due(&self) -> Option<Date> {
        self.due_date
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| parse_date(value).ok())
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Pending with a valid due date strictly before `today`.
    pub fn is_overdue(&self, today: Date) -> bool {
        if self.is_completed() {
            return false;
        }
        matches!(self.due(), Some(due) if due < today)
    }
}

// Optional text fields accept any JSON value; anything but a string reads as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

fn lenient_description<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

pub fn parse_date(value: &str) -> Result<Date, AppError> {
    Date::parse(value, DATE_FORMAT)
        .map_err(|_| AppError::invalid_input("due date must be in YYYY-MM-DD format"))
}

pub fn format_timestamp(timestamp: PrimitiveDateTime) -> Result<String, AppError> {
    timestamp
        .format(TIMESTAMP_FORMAT)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
