//! Work item data structures and scheduling primitives.
//!
//! This module defines the three work item types (`Task`, `Epic`, `Subtask`),
//! the derived end-instant calculation, the half-open interval overlap test used
//! for schedule conflict detection, and the total ordering that backs the
//! repository's prioritised set.

use std::cmp::Ordering;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::fields::{Kind, Status};

/// A standalone work item with optional scheduling information.
///
/// `start_time` is absent for unscheduled tasks; `duration_minutes` is 0 in
/// that case. The end instant is always derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Assigned by the repository on add; 0 until then.
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub duration_minutes: i64,
}

impl Task {
    pub fn new(name: &str, description: &str, status: Status) -> Self {
        Task {
            id: 0,
            name: name.to_string(),
            description: description.to_string(),
            status,
            start_time: None,
            duration_minutes: 0,
        }
    }

    pub fn scheduled(
        name: &str,
        description: &str,
        status: Status,
        start_time: NaiveDateTime,
        duration_minutes: i64,
    ) -> Self {
        Task {
            start_time: Some(start_time),
            duration_minutes,
            ..Task::new(name, description, status)
        }
    }

    /// Derived end instant: start + duration, or absent when unscheduled.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        end_of(self.start_time, self.duration_minutes)
    }

    pub fn interval(&self) -> Option<Interval> {
        self.start_time.map(|start| Interval {
            start,
            end: start + Duration::minutes(self.duration_minutes),
        })
    }
}

/// A work item that aggregates subtasks.
///
/// Status, start, duration and end are derived from the subtasks and owned by
/// the repository: every subtask mutation recomputes them, so values supplied
/// by a caller never survive. `subtask_ids` holds insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Epic {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub duration_minutes: i64,
    /// Derived: max end instant among dated subtasks. Stored because it is
    /// not reconstructible from the epic's own start + duration.
    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub subtask_ids: Vec<u64>,
}

impl Epic {
    pub fn new(name: &str, description: &str) -> Self {
        Epic {
            id: 0,
            name: name.to_string(),
            description: description.to_string(),
            status: Status::New,
            start_time: None,
            duration_minutes: 0,
            end_time: None,
            subtask_ids: Vec::new(),
        }
    }
}

/// A work item owned by exactly one epic, referenced by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub duration_minutes: i64,
    pub epic_id: u64,
}

impl Subtask {
    pub fn new(name: &str, description: &str, status: Status, epic_id: u64) -> Self {
        Subtask {
            id: 0,
            name: name.to_string(),
            description: description.to_string(),
            status,
            start_time: None,
            duration_minutes: 0,
            epic_id,
        }
    }

    pub fn scheduled(
        name: &str,
        description: &str,
        status: Status,
        start_time: NaiveDateTime,
        duration_minutes: i64,
        epic_id: u64,
    ) -> Self {
        Subtask {
            start_time: Some(start_time),
            duration_minutes,
            ..Subtask::new(name, description, status, epic_id)
        }
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        end_of(self.start_time, self.duration_minutes)
    }

    pub fn interval(&self) -> Option<Interval> {
        self.start_time.map(|start| Interval {
            start,
            end: start + Duration::minutes(self.duration_minutes),
        })
    }
}

/// Derive an end instant from an optional start and a duration in minutes.
pub fn end_of(start: Option<NaiveDateTime>, duration_minutes: i64) -> Option<NaiveDateTime> {
    start.map(|s| s + Duration::minutes(duration_minutes))
}

/// A concrete half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// Half-open intersection test. Touching intervals do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Ordering key for the prioritised set.
///
/// Dated items sort before undated ones; dated items order by start instant
/// then id, undated items by id alone. Identity equality defines "same slot"
/// for replace-on-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleKey {
    pub start: Option<NaiveDateTime>,
    pub id: u64,
}

impl Ord for ScheduleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.start, other.start) {
            (Some(a), Some(b)) => a.cmp(&b).then(self.id.cmp(&other.id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.id.cmp(&other.id),
        }
    }
}

impl PartialOrd for ScheduleKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A uniform view over the three work item types.
///
/// Used wherever mixed collections cross the repository boundary: view
/// history snapshots, the prioritised schedule, and API payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkItem {
    Task(Task),
    Epic(Epic),
    Subtask(Subtask),
}

impl WorkItem {
    pub fn id(&self) -> u64 {
        match self {
            WorkItem::Task(t) => t.id,
            WorkItem::Epic(e) => e.id,
            WorkItem::Subtask(s) => s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WorkItem::Task(t) => &t.name,
            WorkItem::Epic(e) => &e.name,
            WorkItem::Subtask(s) => &s.name,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            WorkItem::Task(t) => t.status,
            WorkItem::Epic(e) => e.status,
            WorkItem::Subtask(s) => s.status,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            WorkItem::Task(_) => Kind::Task,
            WorkItem::Epic(_) => Kind::Epic,
            WorkItem::Subtask(_) => Kind::Subtask,
        }
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        match self {
            WorkItem::Task(t) => t.start_time,
            WorkItem::Epic(e) => e.start_time,
            WorkItem::Subtask(s) => s.start_time,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        match self {
            WorkItem::Task(t) => t.duration_minutes,
            WorkItem::Epic(e) => e.duration_minutes,
            WorkItem::Subtask(s) => s.duration_minutes,
        }
    }

    /// End instant: derived for tasks and subtasks, stored for epics.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        match self {
            WorkItem::Task(t) => t.end_time(),
            WorkItem::Epic(e) => e.end_time,
            WorkItem::Subtask(s) => s.end_time(),
        }
    }

    pub fn schedule_key(&self) -> ScheduleKey {
        ScheduleKey {
            start: self.start_time(),
            id: self.id(),
        }
    }
}
