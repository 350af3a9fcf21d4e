use crate::error::AppError;
use crate::model::{Column, NewTask, Priority, Subtask, Task, TaskPatch};
use crate::timestamp;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PROJECT: &str = "Default";
pub const DB_FILE_NAME: &str = "kanban_board.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  description TEXT,
  "column" TEXT NOT NULL,
  priority TEXT,
  project TEXT DEFAULT 'Default',
  date_added DATETIME DEFAULT CURRENT_TIMESTAMP,
  deadline DATETIME DEFAULT (DATETIME('now', '+1 day')),
  subtasks TEXT DEFAULT '[]'
);
"#;

const SELECT_TASK: &str = r#"SELECT id, title, description, "column", priority, project, date_added, deadline, subtasks FROM tasks"#;

/// Raw row as SQLite hands it back; nullable columns stay optional until decoded.
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    column: String,
    priority: Option<String>,
    project: Option<String>,
    date_added: Option<String>,
    deadline: Option<String>,
    subtasks: Option<String>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            column: row.get(3)?,
            priority: row.get(4)?,
            project: row.get(5)?,
            date_added: row.get(6)?,
            deadline: row.get(7)?,
            subtasks: row.get(8)?,
        })
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let subtasks = decode_subtasks(row.subtasks.as_deref()).map_err(|err| {
            AppError::invalid_data(format!("task {}: invalid subtasks: {}", row.id, err))
        })?;

        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            column: row.column,
            priority: row
                .priority
                .unwrap_or_else(|| Priority::default().as_str().to_string()),
            project: row
                .project
                .filter(|project| !project.is_empty())
                .unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            date_added: row.date_added.unwrap_or_default(),
            deadline: row.deadline,
            subtasks,
        })
    }
}

fn decode_subtasks(raw: Option<&str>) -> Result<Vec<Subtask>, serde_json::Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text),
    }
}

fn encode_subtasks(subtasks: &[Subtask]) -> Result<String, AppError> {
    serde_json::to_string(subtasks).map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Owner of the `tasks` table. Holds only the database location; every operation opens its
/// own connection and drops it before returning.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Builds the store and makes sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let store = Self::new(path);
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn init(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| AppError::io(format!("{}: {}", parent.display(), err)))?;
        }

        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %self.path.display(), "task table ready");
        Ok(())
    }

    fn connect(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Inserts a row and returns its id. Title validation is the caller's job.
    pub fn add(&self, task: &NewTask) -> Result<i64, AppError> {
        let created = timestamp::now();
        let date_added = match task.date_added.as_deref() {
            Some(value) => value.to_string(),
            None => timestamp::format(created)?,
        };
        let deadline = match task.deadline.as_deref() {
            Some(value) => value.to_string(),
            None => timestamp::format(timestamp::default_deadline(created))?,
        };
        let subtasks = encode_subtasks(task.subtasks.as_deref().unwrap_or_default())?;

        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO tasks (title, description, "column", priority, project, date_added, deadline, subtasks)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                task.title,
                task.description,
                task.column.as_deref().unwrap_or(Column::Backlog.as_str()),
                task.priority
                    .as_deref()
                    .unwrap_or(Priority::default().as_str()),
                task.project.as_deref().unwrap_or(DEFAULT_PROJECT),
                date_added,
                deadline,
                subtasks,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, "inserted task");
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<Task>, AppError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!("{SELECT_TASK} WHERE id = ?1"),
                params![id],
                TaskRow::from_row,
            )
            .optional()?;
        row.map(Task::try_from).transpose()
    }

    /// Most recently added first. Archived rows only when `include_archived` is set.
    pub fn list(&self, include_archived: bool, project: Option<&str>) -> Result<Vec<Task>, AppError> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if !include_archived {
            clauses.push(r#""column" != ?"#);
            values.push(Value::Text(Column::Archived.as_str().to_string()));
        }
        if let Some(project) = project.filter(|value| !value.is_empty()) {
            clauses.push("project = ?");
            values.push(Value::Text(project.to_string()));
        }

        let mut sql = SELECT_TASK.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY date_added DESC, id DESC");

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Task::try_from).collect()
    }

    /// Applies the supplied fields only. Unknown ids are a silent no-op, as is an empty patch
    /// (no statement is executed for it).
    pub fn update(&self, id: i64, patch: &TaskPatch) -> Result<(), AppError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        let text_fields = [
            ("title", &patch.title),
            ("description", &patch.description),
            (r#""column""#, &patch.column),
            ("priority", &patch.priority),
            ("project", &patch.project),
            ("deadline", &patch.deadline),
        ];
        for (name, value) in text_fields {
            if let Some(value) = value {
                assignments.push(format!("{name} = ?"));
                values.push(Value::Text(value.clone()));
            }
        }
        if let Some(subtasks) = patch.subtasks.as_deref() {
            assignments.push("subtasks = ?".to_string());
            values.push(Value::Text(encode_subtasks(subtasks)?));
        }
        values.push(Value::Integer(id));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", assignments.join(", "));
        let conn = self.connect()?;
        let changed = conn.execute(&sql, params_from_iter(values))?;
        debug!(id, changed, "updated task");
        Ok(())
    }

    /// Column is written as given; callers decide which targets are legal.
    pub fn move_task(&self, id: i64, column: &str) -> Result<(), AppError> {
        self.update(id, &TaskPatch::column(column))
    }

    pub fn archive(&self, id: i64) -> Result<(), AppError> {
        self.move_task(id, Column::Archived.as_str())
    }

    /// Always lands in Backlog; the pre-archive column is not kept anywhere.
    pub fn unarchive(&self, id: i64) -> Result<(), AppError> {
        self.move_task(id, Column::Backlog.as_str())
    }

    pub fn delete(&self, id: i64) -> Result<(), AppError> {
        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        debug!(id, removed, "deleted task");
        Ok(())
    }

    /// Distinct project names over every task, archived included, in case-insensitive order.
    pub fn list_projects(&self) -> Result<Vec<String>, AppError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT project FROM tasks WHERE project IS NOT NULL AND project != '' ORDER BY project COLLATE NOCASE",
        )?;
        let projects = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PROJECT, TaskStore};
    use crate::model::{Column, NewTask, Subtask, TaskPatch};
    use crate::timestamp;
    use rusqlite::Connection;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::Duration;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("kanban-{nanos}-{file_name}"))
    }

    fn temp_store(file_name: &str) -> (TaskStore, PathBuf) {
        let path = temp_path(file_name);
        (TaskStore::open(&path).unwrap(), path)
    }

    fn task_in(title: &str, column: &str, date_added: &str) -> NewTask {
        NewTask {
            column: Some(column.to_string()),
            date_added: Some(date_added.to_string()),
            ..NewTask::titled(title)
        }
    }

    #[test]
    fn init_is_idempotent() {
        let (store, path) = temp_store("init.db");
        store.add(&NewTask::titled("kept")).unwrap();
        store.init().unwrap();
        let tasks = store.list(true, None).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn init_creates_missing_parent_directory() {
        let dir = temp_path("nested");
        let path = dir.join("inner").join("board.db");
        let store = TaskStore::open(&path).unwrap();
        let exists = store.path().exists();
        std::fs::remove_dir_all(&dir).ok();

        assert!(exists);
    }

    #[test]
    fn add_with_title_only_applies_defaults() {
        let (store, path) = temp_store("defaults.db");
        let id = store.add(&NewTask::titled("only a title")).unwrap();
        let task = store.get(id).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(task.title, "only a title");
        assert_eq!(task.description, "");
        assert_eq!(task.column, "Backlog");
        assert_eq!(task.priority, "Medium");
        assert_eq!(task.project, DEFAULT_PROJECT);
        assert!(task.subtasks.is_empty());

        let created = timestamp::parse(&task.date_added).unwrap();
        let deadline = timestamp::parse(task.deadline.as_deref().unwrap()).unwrap();
        assert_eq!(deadline - created, Duration::days(1));
    }

    #[test]
    fn add_keeps_supplied_fields() {
        let (store, path) = temp_store("supplied.db");
        let id = store
            .add(&NewTask {
                title: "Integration Test Task".into(),
                description: "Testing".into(),
                column: Some("Done".into()),
                priority: Some("High".into()),
                project: Some("QA".into()),
                date_added: Some("2025-01-01 08:00:00".into()),
                deadline: Some("2025-01-05 00:00:00".into()),
                subtasks: Some(vec![Subtask {
                    text: "a".into(),
                    completed: false,
                }]),
            })
            .unwrap();
        let task = store.get(id).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(task.column, "Done");
        assert_eq!(task.priority, "High");
        assert_eq!(task.project, "QA");
        assert_eq!(task.date_added, "2025-01-01 08:00:00");
        assert_eq!(task.deadline.as_deref(), Some("2025-01-05 00:00:00"));
        assert_eq!(
            task.subtasks,
            vec![Subtask {
                text: "a".into(),
                completed: false
            }]
        );
    }

    #[test]
    fn get_missing_returns_none() {
        let (store, path) = temp_store("missing.db");
        let task = store.get(42).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(task.is_none());
    }

    #[test]
    fn list_hides_archived_unless_requested() {
        let (store, path) = temp_store("archived.db");
        let visible = store.add(&NewTask::titled("visible")).unwrap();
        let hidden = store.add(&NewTask::titled("hidden")).unwrap();
        store.archive(hidden).unwrap();

        let default_ids: Vec<i64> = store
            .list(false, None)
            .unwrap()
            .iter()
            .map(|task| task.id)
            .collect();
        let all = store.list(true, None).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(default_ids, vec![visible]);
        assert!(all.iter().any(|task| task.id == hidden && task.column == "Archived"));
    }

    #[test]
    fn list_filters_by_exact_project() {
        let (store, path) = temp_store("project.db");
        let qa = store
            .add(&NewTask {
                project: Some("QA".into()),
                ..NewTask::titled("qa task")
            })
            .unwrap();
        store
            .add(&NewTask {
                project: Some("qa".into()),
                ..NewTask::titled("lowercase project")
            })
            .unwrap();
        store.add(&NewTask::titled("default project")).unwrap();

        let tasks = store.list(false, Some("QA")).unwrap();
        let unfiltered = store.list(false, Some("")).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, qa);
        assert_eq!(unfiltered.len(), 3);
    }

    #[test]
    fn list_orders_newest_first() {
        let (store, path) = temp_store("order.db");
        let old = store
            .add(&task_in("old", "Backlog", "2024-01-01 00:00:00"))
            .unwrap();
        let new = store
            .add(&task_in("new", "Backlog", "2025-06-01 00:00:00"))
            .unwrap();
        let middle = store
            .add(&task_in("middle", "Done", "2024-06-01 00:00:00"))
            .unwrap();

        let ids: Vec<i64> = store
            .list(false, None)
            .unwrap()
            .iter()
            .map(|task| task.id)
            .collect();
        std::fs::remove_file(&path).ok();

        assert_eq!(ids, vec![new, middle, old]);
    }

    #[test]
    fn move_accepts_every_known_column() {
        let (store, path) = temp_store("move.db");
        let id = store.add(&NewTask::titled("walker")).unwrap();

        let mut seen = Vec::new();
        for column in Column::ALL {
            store.move_task(id, column.as_str()).unwrap();
            seen.push(store.get(id).unwrap().unwrap().column);
        }
        std::fs::remove_file(&path).ok();

        assert_eq!(seen, vec!["Backlog", "In Progress", "Done", "Archived"]);
    }

    #[test]
    fn unarchive_always_returns_to_backlog() {
        let (store, path) = temp_store("unarchive.db");
        let id = store
            .add(&NewTask {
                column: Some("Done".into()),
                ..NewTask::titled("finished")
            })
            .unwrap();

        store.archive(id).unwrap();
        let archived = store.get(id).unwrap().unwrap();
        store.unarchive(id).unwrap();
        let restored = store.get(id).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(archived.column, "Archived");
        assert_eq!(restored.column, "Backlog");
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let (store, path) = temp_store("update.db");
        let id = store
            .add(&NewTask {
                description: "Desc".into(),
                priority: Some("High".into()),
                ..NewTask::titled("Task1")
            })
            .unwrap();
        let before = store.get(id).unwrap().unwrap();

        store
            .update(
                id,
                &TaskPatch {
                    title: Some("Task1-upd".into()),
                    priority: Some("Low".into()),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        let after = store.get(id).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(after.title, "Task1-upd");
        assert_eq!(after.priority, "Low");
        assert_eq!(after.description, "Desc");
        assert_eq!(after.column, before.column);
        assert_eq!(after.date_added, before.date_added);
        assert_eq!(after.deadline, before.deadline);
    }

    #[test]
    fn update_round_trips_subtasks() {
        let (store, path) = temp_store("subtasks.db");
        let id = store.add(&NewTask::titled("checklist")).unwrap();
        let subtasks = vec![
            Subtask {
                text: "first".into(),
                completed: true,
            },
            Subtask {
                text: "second".into(),
                completed: false,
            },
        ];

        store
            .update(
                id,
                &TaskPatch {
                    subtasks: Some(subtasks.clone()),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        let task = store.get(id).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(task.subtasks, subtasks);
    }

    #[test]
    fn update_unknown_id_and_empty_patch_are_noops() {
        let (store, path) = temp_store("noop.db");
        let id = store.add(&NewTask::titled("stable")).unwrap();

        store.update(999, &TaskPatch::column("Done")).unwrap();
        store.update(id, &TaskPatch::default()).unwrap();
        let task = store.get(id).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(task.column, "Backlog");
    }

    #[test]
    fn empty_patch_does_not_touch_database() {
        let store = TaskStore::new(temp_path("never-created").join("board.db"));
        store.update(1, &TaskPatch::default()).unwrap();

        assert!(!store.path().exists());
    }

    #[test]
    fn delete_is_idempotent_and_ids_are_not_reused() {
        let (store, path) = temp_store("delete.db");
        let first = store.add(&NewTask::titled("first")).unwrap();
        store.delete(first).unwrap();
        let gone = store.get(first).unwrap();
        store.delete(first).unwrap();
        let second = store.add(&NewTask::titled("second")).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(gone.is_none());
        assert!(second > first);
    }

    #[test]
    fn list_projects_is_case_insensitive_and_includes_archived() {
        let (store, path) = temp_store("projects.db");
        for project in ["beta", "Alpha", "QA", "beta"] {
            store
                .add(&NewTask {
                    project: Some(project.into()),
                    ..NewTask::titled(project)
                })
                .unwrap();
        }
        let archived = store
            .add(&NewTask {
                project: Some("archive-only".into()),
                ..NewTask::titled("old")
            })
            .unwrap();
        store.archive(archived).unwrap();

        let projects = store.list_projects().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(projects, vec!["Alpha", "archive-only", "beta", "QA"]);
    }

    #[test]
    fn corrupt_subtasks_surface_as_invalid_data() {
        let (store, path) = temp_store("corrupt.db");
        let id = store.add(&NewTask::titled("broken")).unwrap();
        let conn = Connection::open(&path).unwrap();
        conn.execute("UPDATE tasks SET subtasks = 'not json' WHERE id = ?1", [id])
            .unwrap();
        drop(conn);

        let err = store.get(id).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn null_columns_decode_to_defaults() {
        let (store, path) = temp_store("nulls.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            r#"INSERT INTO tasks (title, description, "column", priority, project, date_added, subtasks) VALUES ('legacy', NULL, 'Backlog', NULL, NULL, NULL, NULL)"#,
            [],
        )
        .unwrap();
        drop(conn);

        let tasks = store.list(false, None).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "");
        assert_eq!(tasks[0].priority, "Medium");
        assert_eq!(tasks[0].project, DEFAULT_PROJECT);
        assert_eq!(tasks[0].date_added, "");
        assert!(tasks[0].subtasks.is_empty());
    }
}
