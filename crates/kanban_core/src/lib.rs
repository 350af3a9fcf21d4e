pub mod config;
pub mod debounce;
pub mod error;
pub mod model;
pub mod storage;
pub mod task_api;
pub mod timestamp;
