//! Caller-side rules layered over [`TaskStore`]: input validation, not-found reporting,
//! free-text search, board partitioning and directional moves.

use crate::error::AppError;
use crate::model::{Column, Direction, NewTask, Priority, Task, TaskPatch, WORKFLOW_COLUMNS};
use crate::storage::sqlite_store::TaskStore;
use crate::timestamp;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub include_archived: bool,
    pub project: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardColumn {
    pub name: Column,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    pub columns: Vec<BoardColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved { from: Column, to: Column },
    NotMoved,
}

impl StepOutcome {
    pub fn moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn require_title(title: &str) -> Result<String, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    Ok(trimmed.to_string())
}

fn known_column(raw: &str) -> Result<String, AppError> {
    Ok(raw.trim().parse::<Column>()?.as_str().to_string())
}

fn optional_timestamp(raw: Option<&str>) -> Result<Option<String>, AppError> {
    non_blank(raw).map(timestamp::normalize).transpose()
}

pub fn create_task(store: &TaskStore, request: NewTask) -> Result<i64, AppError> {
    let task = NewTask {
        title: require_title(&request.title)?,
        description: request.description,
        column: non_blank(request.column.as_deref())
            .map(known_column)
            .transpose()?,
        priority: non_blank(request.priority.as_deref()).map(Priority::canonicalize),
        project: non_blank(request.project.as_deref()).map(str::to_string),
        date_added: optional_timestamp(request.date_added.as_deref())?,
        deadline: optional_timestamp(request.deadline.as_deref())?,
        subtasks: request.subtasks,
    };

    let id = store.add(&task)?;
    info!(
        id,
        title = %task.title,
        column = task.column.as_deref().unwrap_or(Column::Backlog.as_str()),
        priority = task.priority.as_deref().unwrap_or(Priority::default().as_str()),
        "add_task"
    );
    Ok(id)
}

pub fn get_task(store: &TaskStore, id: i64) -> Result<Task, AppError> {
    store
        .get(id)?
        .ok_or_else(|| AppError::not_found(format!("task {id} not found")))
}

pub fn list_tasks(store: &TaskStore, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
    let tasks = store.list(query.include_archived, non_blank(query.project.as_deref()))?;
    Ok(search_tasks(tasks, query.search.as_deref()))
}

/// Case-insensitive match on title or description; a blank query keeps everything.
pub fn search_tasks(tasks: Vec<Task>, query: Option<&str>) -> Vec<Task> {
    match non_blank(query) {
        Some(needle) => tasks
            .into_iter()
            .filter(|task| task.matches_search(needle))
            .collect(),
        None => tasks,
    }
}

/// Buckets tasks into the workflow columns, plus `Archived` when requested. Tasks whose
/// column is outside those buckets are left off the board.
pub fn build_board(tasks: Vec<Task>, include_archived: bool) -> BoardView {
    let mut columns: Vec<BoardColumn> = WORKFLOW_COLUMNS
        .iter()
        .map(|name| BoardColumn {
            name: *name,
            tasks: Vec::new(),
        })
        .collect();
    if include_archived {
        columns.push(BoardColumn {
            name: Column::Archived,
            tasks: Vec::new(),
        });
    }

    for task in tasks {
        let Some(kind) = task.column_kind() else {
            continue;
        };
        if let Some(bucket) = columns.iter_mut().find(|column| column.name == kind) {
            bucket.tasks.push(task);
        }
    }

    BoardView { columns }
}

pub fn board(store: &TaskStore, query: &TaskQuery) -> Result<BoardView, AppError> {
    let tasks = list_tasks(store, query)?;
    Ok(build_board(tasks, query.include_archived))
}

/// Moves a task to one of the workflow columns. Archiving goes through [`archive_task`].
pub fn move_task(store: &TaskStore, id: i64, target: &str) -> Result<Column, AppError> {
    let column = target
        .parse::<Column>()
        .ok()
        .filter(|column| column.is_workflow())
        .ok_or_else(|| AppError::invalid_input(format!("invalid target column '{target}'")))?;

    let task = get_task(store, id)?;
    store.move_task(id, column.as_str())?;
    info!(id, from = %task.column, to = %column, "move_task");
    Ok(column)
}

/// One step left or right along the workflow. Missing tasks, the board edges and columns
/// outside the workflow (Archived) all report `NotMoved`.
pub fn step_task(store: &TaskStore, id: i64, direction: Direction) -> Result<StepOutcome, AppError> {
    let Some(task) = store.get(id)? else {
        return Ok(StepOutcome::NotMoved);
    };
    let Some(from) = task.column_kind() else {
        return Ok(StepOutcome::NotMoved);
    };
    let Some(to) = from.neighbor(direction) else {
        return Ok(StepOutcome::NotMoved);
    };

    store.move_task(id, to.as_str())?;
    info!(id, from = %from, to = %to, "move_task");
    Ok(StepOutcome::Moved { from, to })
}

/// Unknown ids are a silent no-op, matching the store.
pub fn update_task(store: &TaskStore, id: i64, patch: TaskPatch) -> Result<(), AppError> {
    let patch = TaskPatch {
        title: patch.title.as_deref().map(require_title).transpose()?,
        description: patch.description,
        column: patch.column.as_deref().map(known_column).transpose()?,
        priority: non_blank(patch.priority.as_deref()).map(Priority::canonicalize),
        project: patch.project.map(|project| project.trim().to_string()),
        deadline: optional_timestamp(patch.deadline.as_deref())?,
        subtasks: patch.subtasks,
    };

    if patch.is_empty() {
        return Ok(());
    }

    store.update(id, &patch)?;
    info!(id, "update_task");
    Ok(())
}

pub fn archive_task(store: &TaskStore, id: i64) -> Result<(), AppError> {
    store.archive(id)?;
    info!(id, "archive_task");
    Ok(())
}

pub fn unarchive_task(store: &TaskStore, id: i64) -> Result<(), AppError> {
    store.unarchive(id)?;
    info!(id, "unarchive_task");
    Ok(())
}

pub fn delete_task(store: &TaskStore, id: i64) -> Result<(), AppError> {
    store.delete(id)?;
    info!(id, "delete_task");
    Ok(())
}

pub fn list_projects(store: &TaskStore) -> Result<Vec<String>, AppError> {
    store.list_projects()
}
