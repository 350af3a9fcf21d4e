use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Columns a task walks through with left/right moves, in board order.
pub const WORKFLOW_COLUMNS: [Column; 3] = [Column::Backlog, Column::InProgress, Column::Done];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Backlog,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
    Archived,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Backlog,
        Column::InProgress,
        Column::Done,
        Column::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
            Self::Archived => "Archived",
        }
    }

    pub fn is_workflow(self) -> bool {
        WORKFLOW_COLUMNS.contains(&self)
    }

    /// Adjacent workflow column in `direction`, or `None` at either end and for `Archived`.
    pub fn neighbor(self, direction: Direction) -> Option<Column> {
        let index = WORKFLOW_COLUMNS.iter().position(|column| *column == self)?;
        match direction {
            Direction::Left => index.checked_sub(1).map(|prev| WORKFLOW_COLUMNS[prev]),
            Direction::Right => WORKFLOW_COLUMNS.get(index + 1).copied(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|column| column.as_str() == raw)
            .ok_or_else(|| AppError::invalid_input(format!("unknown column '{raw}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl FromStr for Direction {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(AppError::invalid_input(
                "direction must be 'left' or 'right'",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse_loose(raw: &str) -> Option<Priority> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Priorities are free text in storage; known spellings are folded onto the canonical ones.
    pub fn canonicalize(raw: &str) -> String {
        match Self::parse_loose(raw) {
            Some(priority) => priority.as_str().to_string(),
            None => raw.trim().to_string(),
        }
    }
}
