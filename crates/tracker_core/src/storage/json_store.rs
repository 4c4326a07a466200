use crate::error::AppError;
use crate::model::Task;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const BACKUP_SUFFIX: &str = ".backup";
const TEMP_SUFFIX: &str = ".tmp";

/// The backing file: a pretty-printed JSON array of tasks, rewritten in full on every save.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling_path(&self.path, BACKUP_SUFFIX)
    }

    pub fn ensure_exists(&self) -> Result<(), AppError> {
        if self.path.exists() {
            return Ok(());
        }
        tracing::debug!(path = %self.path.display(), "creating empty task store");
        write_tasks(&self.path, &[])
    }

    /// Strict load: a missing file is empty, anything unreadable is an error.
    pub fn try_load(&self) -> Result<Vec<Task>, AppError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|err| AppError::io(format!("{}: {}", self.path.display(), err)))?;
        let tasks: Vec<Task> = serde_json::from_str(&content).map_err(|err| {
            AppError::invalid_data(format!("invalid JSON in {}: {}", self.path.display(), err))
        })?;

        tracing::debug!(path = %self.path.display(), count = tasks.len(), "loaded tasks");
        Ok(tasks)
    }

    /// Lenient load used at startup: failures are logged and read as "no tasks".
    pub fn load(&self) -> Vec<Task> {
        match self.try_load() {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "could not load tasks, starting empty");
                Vec::new()
            }
        }
    }

    pub fn save(&self, tasks: &[Task]) -> Result<(), AppError> {
        write_tasks(&self.path, tasks)?;
        tracing::debug!(path = %self.path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }

    /// Copies the current on-disk collection to `<file>.backup`.
    pub fn backup(&self) -> Result<PathBuf, AppError> {
        let tasks = self.load();
        let backup_path = self.backup_path();
        write_tasks(&backup_path, &tasks)?;
        tracing::info!(path = %backup_path.display(), count = tasks.len(), "wrote task backup");
        Ok(backup_path)
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn write_tasks(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let mut content = serde_json::to_string_pretty(tasks)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    content.push('\n');

    let temp_path = sibling_path(path, TEMP_SUFFIX);
    std::fs::write(&temp_path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp_path, permissions)
            .map_err(|err| AppError::io(err.to_string()))?;
    }

    if let Err(err) = std::fs::rename(&temp_path, path) {
        std::fs::remove_file(&temp_path).ok();
        return Err(AppError::io(err.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::JsonStore;
    use crate::model::{Task, TaskStatus};
    use std::fs;

    fn task(id: u64, due_date: Option<&str>) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: String::new(),
            status: TaskStatus::Pending,
            created_at: "2025-12-20 08:00:00".to_string(),
            due_date: due_date.map(str::to_string),
            completed_at: None,
        }
    }

    #[test]
    fn ensure_exists_creates_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested").join("tasks.json"));

        store.ensure_exists().unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.trim(), "[]");
    }

    #[test]
    fn ensure_exists_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tasks.json"));
        store.save(&[task(1, None)]).unwrap();

        store.ensure_exists().unwrap();

        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tasks.json"));
        let mut done = task(2, Some("2024-01-01"));
        done.status = TaskStatus::Completed;
        done.completed_at = Some("2024-01-02 10:00:00".to_string());
        let tasks = vec![task(1, None), done];

        store.save(&tasks).unwrap();

        assert_eq!(store.load(), tasks);
    }

    #[test]
    fn save_writes_two_space_indented_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tasks.json"));

        store.save(&[task(1, None)]).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("[\n  {\n    \"id\": 1,"));
        assert!(content.contains("\"due_date\": null"));
        assert!(!content.contains("completed_at"));
        assert!(!dir.path().join("tasks.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tasks.json"));
        store.save(&[]).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("missing.json"));

        assert!(store.load().is_empty());
        assert!(store.try_load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty_but_try_load_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tasks.json"));
        fs::write(store.path(), "[{ not json").unwrap();

        assert!(store.load().is_empty());
        assert_eq!(store.try_load().unwrap_err().code(), "invalid_data");
    }

    #[test]
    fn load_accepts_compact_external_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tasks.json"));
        fs::write(
            store.path(),
            r#"[{"id":7,"title":"t","status":"Pending","created_at":"2025-01-01 00:00:00","due_date":"31/12/2025"}]"#,
        )
        .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 7);
        assert_eq!(loaded[0].due_date.as_deref(), Some("31/12/2025"));
        assert_eq!(loaded[0].due(), None);
    }

    #[test]
    fn backup_copies_on_disk_state_to_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("tasks.json"));
        store.save(&[task(1, None), task(2, Some("2030-01-01"))]).unwrap();

        let backup_path = store.backup().unwrap();

        assert_eq!(backup_path, dir.path().join("tasks.json.backup"));
        assert_eq!(JsonStore::new(&backup_path).load(), store.load());
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = JsonStore::new(blocker.join("tasks.json"));

        let err = store.save(&[task(1, None)]).unwrap_err();
        assert_eq!(err.code(), "io_error");
    }
}
