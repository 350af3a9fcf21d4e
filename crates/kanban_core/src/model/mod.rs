mod column;
mod task;

pub use column::{Column, Direction, Priority, WORKFLOW_COLUMNS};
pub use task::{NewTask, Subtask, Task, TaskPatch};
