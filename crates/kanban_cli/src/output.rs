use kanban_core::error::AppError;
use kanban_core::model::Task;
use kanban_core::task_api::BoardView;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct TaskLine {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Added")]
    date_added: String,
    #[tabled(rename = "Deadline")]
    deadline: String,
}

impl From<&Task> for TaskLine {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            column: task.column.clone(),
            priority: task.priority.clone(),
            project: task.project.clone(),
            date_added: task.date_added.clone(),
            deadline: task.deadline.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string(value).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

pub fn print_tasks_plain(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }

    let lines: Vec<TaskLine> = tasks.iter().map(TaskLine::from).collect();
    let mut table = Table::new(lines);
    table.with(Style::psql());
    println!("{table}");
}

pub fn print_task_plain(task: &Task) {
    println!("#{} {}", task.id, task.title);
    println!("  column:   {}", task.column);
    println!("  priority: {}", task.priority);
    println!("  project:  {}", task.project);
    println!("  added:    {}", task.date_added);
    println!("  deadline: {}", task.deadline.as_deref().unwrap_or("-"));
    if !task.description.is_empty() {
        println!("  description:");
        for line in task.description.lines() {
            println!("    {line}");
        }
    }
    if !task.subtasks.is_empty() {
        println!("  subtasks:");
        for subtask in &task.subtasks {
            let mark = if subtask.completed { "x" } else { " " };
            println!("    [{mark}] {}", subtask.text);
        }
    }
}

pub fn print_board_plain(view: &BoardView) {
    for column in &view.columns {
        println!("== {} ({})", column.name, column.tasks.len());
        if column.tasks.is_empty() {
            println!("   No tasks in {}.", column.name);
        }
        for task in &column.tasks {
            println!("   #{} {} [{}] {}", task.id, task.title, task.priority, task.project);
        }
    }
}
