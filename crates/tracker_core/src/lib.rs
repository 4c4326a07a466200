pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod task_api;

pub use task_api::{TaskManager, TaskStats};
