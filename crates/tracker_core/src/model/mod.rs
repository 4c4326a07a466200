mod task;

pub use task::{Task, TaskStatus, format_timestamp, parse_date};
