//! Snapshot persistence for the task repository.
//!
//! A snapshot is the full repository state: every entity plus the ordered ids
//! of the view history. Stores are dumb — they encode and decode, nothing
//! more; the repository rebuilds its derived structures after a load.
//!
//! The CSV layout is a header row, one row per entity, a blank separator
//! line, then a single row of comma-joined history ids (`null` when empty):
//!
//! ```text
//! id,kind,name,status,description,start,duration,end,epic
//! 1,task,Call plumber,new,Fix the sink,2024-03-11T09:00:00,30,2024-03-11T09:30:00,
//! 2,epic,Renovation,new,,,0,,
//! 3,subtask,Paint walls,new,,,0,,2
//!
//! 3,1
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::StoreError;
use crate::fields::{format_kind, format_status, parse_kind, parse_status, Kind};
use crate::task::{Epic, Subtask, Task};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const HEADER: &str = "id,kind,name,status,description,start,duration,end,epic";

/// Full repository state as flat collections.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub epics: Vec<Epic>,
    pub subtasks: Vec<Subtask>,
    /// View history ids, oldest first.
    pub history_ids: Vec<u64>,
}

/// Persistence adapter consumed by the repository.
///
/// `save` runs after every mutating operation; `load` once at startup.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
    fn load(&self) -> Result<Snapshot, StoreError>;
}

/// Stores snapshots in a single local CSV file.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvStore { path: path.into() }
    }
}

impl SnapshotStore for CsvStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        for task in &snapshot.tasks {
            out.push_str(&task_row(task));
            out.push('\n');
        }
        for epic in &snapshot.epics {
            out.push_str(&epic_row(epic));
            out.push('\n');
        }
        for subtask in &snapshot.subtasks {
            out.push_str(&subtask_row(subtask));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&history_line(&snapshot.history_ids));
        out.push('\n');

        // Atomic-ish write via temp + rename.
        let tmp = self.path.with_extension("csv.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(out.as_bytes())?;
        f.flush()?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            path = %self.path.display(),
            tasks = snapshot.tasks.len(),
            epics = snapshot.epics.len(),
            subtasks = snapshot.subtasks.len(),
            "snapshot saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let snapshot = decode(&content)?;
        debug!(path = %self.path.display(), "snapshot loaded");
        Ok(snapshot)
    }
}

fn task_row(t: &Task) -> String {
    format!(
        "{},{},{},{},{},{},{},{},",
        t.id,
        format_kind(Kind::Task),
        escape(&t.name),
        format_status(t.status),
        escape(&t.description),
        time_field(t.start_time),
        t.duration_minutes,
        time_field(t.end_time()),
    )
}

fn epic_row(e: &Epic) -> String {
    format!(
        "{},{},{},{},{},{},{},{},",
        e.id,
        format_kind(Kind::Epic),
        escape(&e.name),
        format_status(e.status),
        escape(&e.description),
        time_field(e.start_time),
        e.duration_minutes,
        time_field(e.end_time),
    )
}

fn subtask_row(s: &Subtask) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{}",
        s.id,
        format_kind(Kind::Subtask),
        escape(&s.name),
        format_status(s.status),
        escape(&s.description),
        time_field(s.start_time),
        s.duration_minutes,
        time_field(s.end_time()),
        s.epic_id,
    )
}

fn history_line(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "null".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn time_field(t: Option<NaiveDateTime>) -> String {
    t.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Escape fields that contain commas or quotes. The format is line-oriented,
/// so embedded newlines are flattened to spaces.
fn escape(s: &str) -> String {
    let flat = s.replace('\n', " ");
    if flat.contains(',') || flat.contains('"') {
        format!("\"{}\"", flat.replace('"', "\"\""))
    } else {
        flat
    }
}

/// Quote-aware split of one CSV row.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn decode(content: &str) -> Result<Snapshot, StoreError> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Ok(Snapshot::default());
    }

    let separator = lines
        .iter()
        .position(|l| l.is_empty())
        .ok_or_else(|| StoreError::format(lines.len(), "missing blank separator line"))?;

    let mut snapshot = Snapshot::default();
    for (i, line) in lines.iter().enumerate().take(separator).skip(1) {
        decode_row(line, i + 1, &mut snapshot)?;
    }

    let history = lines
        .get(separator + 1)
        .ok_or_else(|| StoreError::format(separator + 2, "missing history line"))?;
    snapshot.history_ids = decode_history(history, separator + 2)?;
    Ok(snapshot)
}

fn decode_row(line: &str, line_no: usize, snapshot: &mut Snapshot) -> Result<(), StoreError> {
    let fields = split_row(line);
    if fields.len() < 9 {
        return Err(StoreError::format(line_no, "expected 9 fields"));
    }

    let id: u64 = fields[0]
        .parse()
        .map_err(|_| StoreError::format(line_no, "invalid id"))?;
    let kind = parse_kind(&fields[1])
        .ok_or_else(|| StoreError::format(line_no, format!("unknown kind \"{}\"", fields[1])))?;
    let status = parse_status(&fields[3])
        .ok_or_else(|| StoreError::format(line_no, format!("unknown status \"{}\"", fields[3])))?;
    let start = parse_time_field(&fields[5], line_no)?;
    let duration: i64 = fields[6]
        .parse()
        .map_err(|_| StoreError::format(line_no, "invalid duration"))?;
    let end = parse_time_field(&fields[7], line_no)?;

    match kind {
        Kind::Task => snapshot.tasks.push(Task {
            id,
            name: fields[2].clone(),
            description: fields[4].clone(),
            status,
            start_time: start,
            duration_minutes: duration,
        }),
        Kind::Epic => snapshot.epics.push(Epic {
            id,
            name: fields[2].clone(),
            description: fields[4].clone(),
            status,
            start_time: start,
            duration_minutes: duration,
            end_time: end,
            // Rebuilt by the repository from the subtasks' back-references.
            subtask_ids: Vec::new(),
        }),
        Kind::Subtask => {
            let epic_id: u64 = fields[8]
                .parse()
                .map_err(|_| StoreError::format(line_no, "invalid epic id"))?;
            snapshot.subtasks.push(Subtask {
                id,
                name: fields[2].clone(),
                description: fields[4].clone(),
                status,
                start_time: start,
                duration_minutes: duration,
                epic_id,
            });
        }
    }
    Ok(())
}

fn parse_time_field(field: &str, line_no: usize) -> Result<Option<NaiveDateTime>, StoreError> {
    if field.is_empty() || field == "null" {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(field, TIME_FORMAT)
        .map(Some)
        .map_err(|_| StoreError::format(line_no, format!("invalid instant \"{field}\"")))
}

fn decode_history(line: &str, line_no: usize) -> Result<Vec<u64>, StoreError> {
    if line.is_empty() || line == "null" {
        return Ok(Vec::new());
    }
    line.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| StoreError::format(line_no, format!("invalid history id \"{part}\"")))
        })
        .collect()
}
