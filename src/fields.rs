//! Enumerations and field types for work items.
//!
//! This module defines the structured data types shared by tasks, epics and
//! subtasks, along with the parse/format helpers used by the CSV snapshot codec.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Work item completion status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    #[serde(alias = "New", alias = "NEW")]
    New,
    #[serde(alias = "InProgress", alias = "IN_PROGRESS")]
    InProgress,
    #[serde(alias = "Done", alias = "DONE")]
    Done,
}

/// Format a status for display and for CSV rows.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::New => "new",
        Status::InProgress => "in-progress",
        Status::Done => "done",
    }
}

/// Parse a status string from CSV format.
pub fn parse_status(s: &str) -> Option<Status> {
    match s.to_lowercase().as_str() {
        "new" => Some(Status::New),
        "in-progress" | "in_progress" => Some(Status::InProgress),
        "done" => Some(Status::Done),
        _ => None,
    }
}

/// Kind discriminant used in CSV rows and list filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    Task,
    Epic,
    Subtask,
}

/// Format a kind for display and for CSV rows.
pub fn format_kind(k: Kind) -> &'static str {
    match k {
        Kind::Task => "task",
        Kind::Epic => "epic",
        Kind::Subtask => "subtask",
    }
}

/// Parse a kind string from CSV format.
pub fn parse_kind(s: &str) -> Option<Kind> {
    match s.to_lowercase().as_str() {
        "task" => Some(Kind::Task),
        "epic" => Some(Kind::Epic),
        "subtask" => Some(Kind::Subtask),
        _ => None,
    }
}
