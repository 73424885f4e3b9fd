//! The task repository: owns all work items and their derived views.
//!
//! All entity lifecycle goes through this type. It assigns identities,
//! enforces referential integrity between epics and subtasks, recomputes epic
//! status and time windows after every subtask mutation, maintains the
//! prioritised schedule with conflict rejection, records fetches in the view
//! history, and pushes a snapshot to the configured store after each change.
//!
//! Every public operation leaves the invariants fully re-established before
//! returning; callers never observe an epic whose status disagrees with its
//! subtasks or a schedule missing a stored entity.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::error::RepoError;
use crate::fields::Status;
use crate::history::ViewHistory;
use crate::store::{Snapshot, SnapshotStore};
use crate::task::{Epic, Interval, ScheduleKey, Subtask, Task, WorkItem};

/// In-memory repository for tasks, epics and subtasks.
///
/// Maps are keyed by id; ids are monotonic and never reused, so map iteration
/// order is insertion order.
#[derive(Default)]
pub struct TaskRepository {
    next_id: u64,
    tasks: BTreeMap<u64, Task>,
    epics: BTreeMap<u64, Epic>,
    subtasks: BTreeMap<u64, Subtask>,
    schedule: BTreeSet<ScheduleKey>,
    history: ViewHistory,
    store: Option<Box<dyn SnapshotStore>>,
}

impl TaskRepository {
    /// A repository with no persistence.
    pub fn new() -> Self {
        TaskRepository::default()
    }

    /// A repository restored from, and persisted to, the given store.
    pub fn with_store(store: Box<dyn SnapshotStore>) -> Result<Self, RepoError> {
        let snapshot = store.load()?;
        let mut repo = TaskRepository::new();
        repo.store = Some(store);
        repo.restore(snapshot);
        Ok(repo)
    }

    // ── Adds ──────────────────────────────────────────────────────────────

    /// Store a new task, assigning its id.
    ///
    /// Rejected with `ScheduleConflict` if its interval overlaps another
    /// scheduled task or subtask; nothing is committed and no id is consumed.
    pub fn add_task(&mut self, mut task: Task) -> Result<u64, RepoError> {
        self.check_conflict(task.interval(), None)?;
        let id = self.generate_id();
        task.id = id;
        self.schedule.insert(ScheduleKey { start: task.start_time, id });
        self.tasks.insert(id, task);
        self.persist()?;
        Ok(id)
    }

    /// Store a new epic, assigning its id.
    ///
    /// Any subtask ids or derived fields supplied by the caller are discarded;
    /// a fresh epic starts empty with status NEW and no time window.
    pub fn add_epic(&mut self, mut epic: Epic) -> Result<u64, RepoError> {
        let id = self.generate_id();
        epic.id = id;
        epic.subtask_ids.clear();
        epic.status = Status::New;
        epic.start_time = None;
        epic.duration_minutes = 0;
        epic.end_time = None;
        self.schedule.insert(ScheduleKey { start: None, id });
        self.epics.insert(id, epic);
        self.persist()?;
        Ok(id)
    }

    /// Store a new subtask under its epic, assigning its id.
    ///
    /// Rejected with `DanglingEpic` when the referenced epic does not exist
    /// and with `ScheduleConflict` on interval overlap; either rejection
    /// leaves the repository untouched and consumes no id.
    pub fn add_subtask(&mut self, mut subtask: Subtask) -> Result<u64, RepoError> {
        if !self.epics.contains_key(&subtask.epic_id) {
            return Err(RepoError::DanglingEpic(subtask.epic_id));
        }
        self.check_conflict(subtask.interval(), None)?;

        let id = self.generate_id();
        let epic_id = subtask.epic_id;
        subtask.id = id;
        self.schedule.insert(ScheduleKey { start: subtask.start_time, id });
        self.subtasks.insert(id, subtask);
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.subtask_ids.push(id);
        }
        self.recompute_epic(epic_id);
        self.persist()?;
        Ok(id)
    }

    // ── Updates ───────────────────────────────────────────────────────────

    /// Replace the stored task with the same id.
    pub fn update_task(&mut self, task: Task) -> Result<(), RepoError> {
        let Some(old) = self.tasks.get(&task.id) else {
            return Err(RepoError::NotFound(task.id));
        };
        let old_start = old.start_time;
        self.check_conflict(task.interval(), Some(task.id))?;
        self.schedule.remove(&ScheduleKey { start: old_start, id: task.id });
        self.schedule.insert(ScheduleKey { start: task.start_time, id: task.id });
        self.tasks.insert(task.id, task);
        self.persist()
    }

    /// Update the caller-mutable fields of an epic.
    ///
    /// Only name and description are taken; the subtask list and the derived
    /// status/time fields are repository-owned and survive unchanged.
    pub fn update_epic(&mut self, epic: Epic) -> Result<(), RepoError> {
        let Some(stored) = self.epics.get_mut(&epic.id) else {
            return Err(RepoError::NotFound(epic.id));
        };
        stored.name = epic.name;
        stored.description = epic.description;
        self.persist()
    }

    /// Replace the stored subtask with the same id.
    ///
    /// Both the previous and (when re-parented) the new owning epic are
    /// recomputed so list and back-reference stay mutually consistent.
    pub fn update_subtask(&mut self, subtask: Subtask) -> Result<(), RepoError> {
        let Some(old) = self.subtasks.get(&subtask.id) else {
            return Err(RepoError::NotFound(subtask.id));
        };
        if !self.epics.contains_key(&subtask.epic_id) {
            return Err(RepoError::DanglingEpic(subtask.epic_id));
        }
        self.check_conflict(subtask.interval(), Some(subtask.id))?;

        let old_epic_id = old.epic_id;
        let old_start = old.start_time;
        let id = subtask.id;
        let new_epic_id = subtask.epic_id;

        if old_epic_id != new_epic_id {
            if let Some(old_epic) = self.epics.get_mut(&old_epic_id) {
                old_epic.subtask_ids.retain(|&sid| sid != id);
            }
            if let Some(new_epic) = self.epics.get_mut(&new_epic_id) {
                new_epic.subtask_ids.push(id);
            }
        }

        self.schedule.remove(&ScheduleKey { start: old_start, id });
        self.schedule.insert(ScheduleKey { start: subtask.start_time, id });
        self.subtasks.insert(id, subtask);

        self.recompute_epic(old_epic_id);
        if old_epic_id != new_epic_id {
            self.recompute_epic(new_epic_id);
        }
        self.persist()
    }

    // ── Removals ──────────────────────────────────────────────────────────

    /// Remove a task. Returns whether it existed.
    pub fn remove_task(&mut self, id: u64) -> Result<bool, RepoError> {
        let Some(task) = self.tasks.remove(&id) else {
            return Ok(false);
        };
        self.history.evict(id);
        self.schedule.remove(&ScheduleKey { start: task.start_time, id });
        self.persist()?;
        Ok(true)
    }

    /// Remove an epic and, first, all of its subtasks.
    pub fn remove_epic(&mut self, id: u64) -> Result<bool, RepoError> {
        let Some(epic) = self.epics.remove(&id) else {
            return Ok(false);
        };
        for subtask_id in &epic.subtask_ids {
            if let Some(subtask) = self.subtasks.remove(subtask_id) {
                self.history.evict(*subtask_id);
                self.schedule
                    .remove(&ScheduleKey { start: subtask.start_time, id: *subtask_id });
            }
        }
        self.history.evict(id);
        self.schedule.remove(&ScheduleKey { start: epic.start_time, id });
        self.persist()?;
        Ok(true)
    }

    /// Remove a subtask and recompute its epic. Returns whether it existed.
    pub fn remove_subtask(&mut self, id: u64) -> Result<bool, RepoError> {
        let Some(subtask) = self.subtasks.remove(&id) else {
            return Ok(false);
        };
        self.history.evict(id);
        self.schedule.remove(&ScheduleKey { start: subtask.start_time, id });
        if let Some(epic) = self.epics.get_mut(&subtask.epic_id) {
            epic.subtask_ids.retain(|&sid| sid != id);
        }
        self.recompute_epic(subtask.epic_id);
        self.persist()?;
        Ok(true)
    }

    /// Remove every task.
    pub fn remove_all_tasks(&mut self) -> Result<(), RepoError> {
        for (id, task) in std::mem::take(&mut self.tasks) {
            self.history.evict(id);
            self.schedule.remove(&ScheduleKey { start: task.start_time, id });
        }
        self.persist()
    }

    /// Remove every subtask, leaving all epics empty and recomputed.
    pub fn remove_all_subtasks(&mut self) -> Result<(), RepoError> {
        for (id, subtask) in std::mem::take(&mut self.subtasks) {
            self.history.evict(id);
            self.schedule.remove(&ScheduleKey { start: subtask.start_time, id });
        }
        let epic_ids: Vec<u64> = self.epics.keys().copied().collect();
        for epic_id in epic_ids {
            if let Some(epic) = self.epics.get_mut(&epic_id) {
                epic.subtask_ids.clear();
            }
            self.recompute_epic(epic_id);
        }
        self.persist()
    }

    /// Remove every epic together with every subtask.
    pub fn remove_all_epics(&mut self) -> Result<(), RepoError> {
        for (id, subtask) in std::mem::take(&mut self.subtasks) {
            self.history.evict(id);
            self.schedule.remove(&ScheduleKey { start: subtask.start_time, id });
        }
        for (id, epic) in std::mem::take(&mut self.epics) {
            self.history.evict(id);
            self.schedule.remove(&ScheduleKey { start: epic.start_time, id });
        }
        self.persist()
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    /// Fetch a task by id, recording the view in history on a hit.
    pub fn get_task(&mut self, id: u64) -> Result<Option<Task>, RepoError> {
        let Some(task) = self.tasks.get(&id).cloned() else {
            return Ok(None);
        };
        self.history.record(WorkItem::Task(task.clone()));
        self.persist()?;
        Ok(Some(task))
    }

    /// Fetch an epic by id, recording the view in history on a hit.
    pub fn get_epic(&mut self, id: u64) -> Result<Option<Epic>, RepoError> {
        let Some(epic) = self.epics.get(&id).cloned() else {
            return Ok(None);
        };
        self.history.record(WorkItem::Epic(epic.clone()));
        self.persist()?;
        Ok(Some(epic))
    }

    /// Fetch a subtask by id, recording the view in history on a hit.
    pub fn get_subtask(&mut self, id: u64) -> Result<Option<Subtask>, RepoError> {
        let Some(subtask) = self.subtasks.get(&id).cloned() else {
            return Ok(None);
        };
        self.history.record(WorkItem::Subtask(subtask.clone()));
        self.persist()?;
        Ok(Some(subtask))
    }

    /// All tasks in insertion order.
    pub fn list_tasks(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// All epics in insertion order.
    pub fn list_epics(&self) -> Vec<Epic> {
        self.epics.values().cloned().collect()
    }

    /// All subtasks in insertion order.
    pub fn list_subtasks(&self) -> Vec<Subtask> {
        self.subtasks.values().cloned().collect()
    }

    /// Subtasks of an epic in the epic's recorded order.
    ///
    /// An existing epic with no subtasks yields an empty list; a missing epic
    /// is `NotFound`.
    pub fn get_epic_subtasks(&self, epic_id: u64) -> Result<Vec<Subtask>, RepoError> {
        let epic = self.epics.get(&epic_id).ok_or(RepoError::NotFound(epic_id))?;
        Ok(epic
            .subtask_ids
            .iter()
            .filter_map(|id| self.subtasks.get(id).cloned())
            .collect())
    }

    /// View history, oldest first.
    pub fn history(&self) -> Vec<WorkItem> {
        self.history.snapshot()
    }

    /// All work items in schedule order: dated by start then id, undated last
    /// by id.
    pub fn prioritized_tasks(&self) -> Vec<WorkItem> {
        self.schedule
            .iter()
            .filter_map(|key| self.resolve(key.id))
            .collect()
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn generate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn resolve(&self, id: u64) -> Option<WorkItem> {
        if let Some(task) = self.tasks.get(&id) {
            return Some(WorkItem::Task(task.clone()));
        }
        if let Some(epic) = self.epics.get(&id) {
            return Some(WorkItem::Epic(epic.clone()));
        }
        self.subtasks.get(&id).map(|s| WorkItem::Subtask(s.clone()))
    }

    /// Reject `candidate` if it overlaps any scheduled task or subtask other
    /// than `exclude_id`. Epics never participate; undated candidates pass.
    fn check_conflict(
        &self,
        candidate: Option<Interval>,
        exclude_id: Option<u64>,
    ) -> Result<(), RepoError> {
        let Some(candidate) = candidate else {
            return Ok(());
        };
        for key in &self.schedule {
            if key.start.is_none() {
                // Undated entries sort last; nothing beyond here is scheduled.
                break;
            }
            if Some(key.id) == exclude_id {
                continue;
            }
            let other = if let Some(task) = self.tasks.get(&key.id) {
                task.interval()
            } else if let Some(subtask) = self.subtasks.get(&key.id) {
                subtask.interval()
            } else {
                None
            };
            if let Some(other) = other {
                if candidate.overlaps(&other) {
                    return Err(RepoError::ScheduleConflict(key.id));
                }
            }
        }
        Ok(())
    }

    /// Recompute an epic's status and time window from its current subtasks
    /// and refresh its slot in the schedule.
    fn recompute_epic(&mut self, epic_id: u64) {
        let Some(epic) = self.epics.get(&epic_id) else {
            return;
        };
        let old_key = ScheduleKey { start: epic.start_time, id: epic_id };
        let subtasks: Vec<&Subtask> = epic
            .subtask_ids
            .iter()
            .filter_map(|id| self.subtasks.get(id))
            .collect();

        let status = derive_status(&subtasks);
        let duration_minutes: i64 = subtasks.iter().map(|s| s.duration_minutes).sum();
        let start_time = subtasks.iter().filter_map(|s| s.start_time).min();
        let end_time = subtasks.iter().filter_map(|s| s.end_time()).max();

        self.schedule.remove(&old_key);
        if let Some(epic) = self.epics.get_mut(&epic_id) {
            epic.status = status;
            epic.start_time = start_time;
            epic.duration_minutes = duration_minutes;
            epic.end_time = end_time;
        }
        self.schedule.insert(ScheduleKey { start: start_time, id: epic_id });
    }

    fn persist(&self) -> Result<(), RepoError> {
        if let Some(store) = &self.store {
            store.save(&self.snapshot())?;
        }
        Ok(())
    }

    /// Copy the full repository state out for persistence.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.list_tasks(),
            epics: self.list_epics(),
            subtasks: self.list_subtasks(),
            history_ids: self.history.snapshot().iter().map(|i| i.id()).collect(),
        }
    }

    /// Rebuild all state from a snapshot.
    ///
    /// Epic subtask lists are reconstructed from the subtasks' back-references
    /// (in id order, which is insertion order), derived fields are recomputed,
    /// history ids are replayed through the normal dedup path, and the id
    /// counter resumes above the highest id seen so ids are never reused.
    fn restore(&mut self, snapshot: Snapshot) {
        let max_id = snapshot
            .tasks
            .iter()
            .map(|t| t.id)
            .chain(snapshot.epics.iter().map(|e| e.id))
            .chain(snapshot.subtasks.iter().map(|s| s.id))
            .max()
            .unwrap_or(0);
        self.next_id = max_id;

        for task in snapshot.tasks {
            self.schedule
                .insert(ScheduleKey { start: task.start_time, id: task.id });
            self.tasks.insert(task.id, task);
        }
        for mut epic in snapshot.epics {
            epic.subtask_ids.clear();
            self.epics.insert(epic.id, epic);
        }
        for subtask in snapshot.subtasks {
            let Some(epic) = self.epics.get_mut(&subtask.epic_id) else {
                warn!(id = subtask.id, epic_id = subtask.epic_id, "dropping orphaned subtask");
                continue;
            };
            epic.subtask_ids.push(subtask.id);
            self.schedule
                .insert(ScheduleKey { start: subtask.start_time, id: subtask.id });
            self.subtasks.insert(subtask.id, subtask);
        }

        let epic_ids: Vec<u64> = self.epics.keys().copied().collect();
        for epic_id in epic_ids {
            // Puts the epic's slot into the schedule as a side effect.
            self.recompute_epic(epic_id);
        }

        for id in snapshot.history_ids {
            if let Some(item) = self.resolve(id) {
                self.history.record(item);
            }
        }
    }
}

/// Epic status as a pure function of its subtasks' statuses.
fn derive_status(subtasks: &[&Subtask]) -> Status {
    if subtasks.is_empty() {
        return Status::New;
    }
    let all_new = subtasks.iter().all(|s| s.status == Status::New);
    let all_done = subtasks.iter().all(|s| s.status == Status::Done);
    if all_new {
        Status::New
    } else if all_done {
        Status::Done
    } else {
        Status::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CsvStore;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::tempdir;

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn minutes(m: i64) -> chrono::Duration {
        chrono::Duration::minutes(m)
    }

    #[test]
    fn empty_epic_has_status_new_and_no_window() {
        let mut repo = TaskRepository::new();
        let id = repo.add_epic(Epic::new("release", "")).unwrap();

        let epic = repo.get_epic(id).unwrap().unwrap();
        assert_eq!(epic.status, Status::New);
        assert_eq!(epic.start_time, None);
        assert_eq!(epic.end_time, None);
        assert_eq!(epic.duration_minutes, 0);
    }

    #[test]
    fn epic_status_follows_subtask_statuses() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        let s1 = repo
            .add_subtask(Subtask::new("a", "", Status::New, epic_id))
            .unwrap();
        let s2 = repo
            .add_subtask(Subtask::new("b", "", Status::New, epic_id))
            .unwrap();
        assert_eq!(repo.get_epic(epic_id).unwrap().unwrap().status, Status::New);

        let mut sub = repo.get_subtask(s1).unwrap().unwrap();
        sub.status = Status::Done;
        repo.update_subtask(sub).unwrap();
        assert_eq!(
            repo.get_epic(epic_id).unwrap().unwrap().status,
            Status::InProgress
        );

        let mut sub = repo.get_subtask(s2).unwrap().unwrap();
        sub.status = Status::Done;
        repo.update_subtask(sub).unwrap();
        assert_eq!(repo.get_epic(epic_id).unwrap().unwrap().status, Status::Done);
    }

    #[test]
    fn in_progress_subtasks_make_epic_in_progress() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        repo.add_subtask(Subtask::new("a", "", Status::InProgress, epic_id))
            .unwrap();
        repo.add_subtask(Subtask::new("b", "", Status::InProgress, epic_id))
            .unwrap();
        assert_eq!(
            repo.get_epic(epic_id).unwrap().unwrap().status,
            Status::InProgress
        );
    }

    #[test]
    fn recomputation_is_idempotent() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        repo.add_subtask(Subtask::new("a", "", Status::Done, epic_id))
            .unwrap();

        repo.recompute_epic(epic_id);
        let first = repo.epics.get(&epic_id).unwrap().clone();
        repo.recompute_epic(epic_id);
        let second = repo.epics.get(&epic_id).unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn epic_window_tracks_subtask_lifecycle() {
        let mut repo = TaskRepository::new();
        let t = at(13, 0);
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();

        let s1 = repo
            .add_subtask(Subtask::scheduled("s1", "", Status::New, t, 40, epic_id))
            .unwrap();
        let epic = repo.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.status, Status::New);
        assert_eq!(epic.start_time, Some(t));
        assert_eq!(epic.duration_minutes, 40);
        assert_eq!(epic.end_time, Some(t + minutes(40)));

        repo.add_subtask(Subtask::scheduled(
            "s2",
            "",
            Status::Done,
            t - minutes(60),
            30,
            epic_id,
        ))
        .unwrap();
        let epic = repo.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.status, Status::InProgress);
        assert_eq!(epic.start_time, Some(t - minutes(60)));
        assert_eq!(epic.duration_minutes, 70);
        assert_eq!(epic.end_time, Some(t + minutes(40)));

        let mut sub = repo.get_subtask(s1).unwrap().unwrap();
        sub.status = Status::Done;
        repo.update_subtask(sub).unwrap();
        assert_eq!(repo.get_epic(epic_id).unwrap().unwrap().status, Status::Done);
    }

    #[test]
    fn epic_duration_sums_undated_subtasks_too() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        repo.add_subtask(Subtask::scheduled("dated", "", Status::New, at(9, 0), 45, epic_id))
            .unwrap();
        let mut undated = Subtask::new("undated", "", Status::New, epic_id);
        undated.duration_minutes = 15;
        repo.add_subtask(undated).unwrap();

        let epic = repo.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.duration_minutes, 60);
        assert_eq!(epic.start_time, Some(at(9, 0)));
    }

    #[test]
    fn epic_window_without_dated_subtasks_keeps_duration_sum() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        let mut sub = Subtask::new("undated", "", Status::New, epic_id);
        sub.duration_minutes = 25;
        repo.add_subtask(sub).unwrap();

        let epic = repo.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.start_time, None);
        assert_eq!(epic.end_time, None);
        assert_eq!(epic.duration_minutes, 25);
    }

    #[test]
    fn removing_subtask_shrinks_epic_window() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        let s1 = repo
            .add_subtask(Subtask::scheduled("s1", "", Status::New, at(9, 0), 30, epic_id))
            .unwrap();
        repo.add_subtask(Subtask::scheduled("s2", "", Status::New, at(11, 0), 20, epic_id))
            .unwrap();

        repo.remove_subtask(s1).unwrap();
        let epic = repo.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.start_time, Some(at(11, 0)));
        assert_eq!(epic.duration_minutes, 20);
        assert_eq!(epic.subtask_ids.len(), 1);
    }

    #[test]
    fn overlapping_task_is_rejected_and_nothing_changes() {
        let mut repo = TaskRepository::new();
        let a = repo
            .add_task(Task::scheduled("a", "", Status::New, at(10, 0), 30))
            .unwrap();

        let before = repo.prioritized_tasks();
        let result = repo.add_task(Task::scheduled("b", "", Status::New, at(10, 15), 30));
        assert!(matches!(result, Err(RepoError::ScheduleConflict(id)) if id == a));
        assert_eq!(repo.prioritized_tasks(), before);
        assert!(repo.get_task(a).unwrap().is_some());
        assert!(repo.list_tasks().len() == 1);
    }

    #[test]
    fn rejected_adds_do_not_consume_ids() {
        let mut repo = TaskRepository::new();
        repo.add_task(Task::scheduled("a", "", Status::New, at(10, 0), 30))
            .unwrap();
        let _ = repo.add_task(Task::scheduled("b", "", Status::New, at(10, 15), 30));
        let _ = repo.add_subtask(Subtask::new("s", "", Status::New, 99));

        let next = repo.add_task(Task::new("c", "", Status::New)).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn subtask_conflicts_with_scheduled_task() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        repo.add_task(Task::scheduled("standup", "", Status::New, at(10, 0), 30))
            .unwrap();

        let result = repo.add_subtask(Subtask::scheduled(
            "clash",
            "",
            Status::New,
            at(10, 15),
            30,
            epic_id,
        ));
        assert!(matches!(result, Err(RepoError::ScheduleConflict(_))));
        assert!(repo.get_epic_subtasks(epic_id).unwrap().is_empty());
    }

    #[test]
    fn updating_task_does_not_conflict_with_itself() {
        let mut repo = TaskRepository::new();
        let id = repo
            .add_task(Task::scheduled("a", "", Status::New, at(10, 0), 30))
            .unwrap();

        let mut task = repo.get_task(id).unwrap().unwrap();
        task.status = Status::Done;
        repo.update_task(task).unwrap();

        // Shifting within its own old window is fine too.
        let mut task = repo.get_task(id).unwrap().unwrap();
        task.start_time = Some(at(10, 10));
        repo.update_task(task).unwrap();
        assert_eq!(
            repo.get_task(id).unwrap().unwrap().start_time,
            Some(at(10, 10))
        );
    }

    #[test]
    fn update_conflict_leaves_old_state_in_place() {
        let mut repo = TaskRepository::new();
        let a = repo
            .add_task(Task::scheduled("a", "", Status::New, at(9, 0), 30))
            .unwrap();
        let b = repo
            .add_task(Task::scheduled("b", "", Status::New, at(11, 0), 30))
            .unwrap();

        let mut moved = repo.get_task(b).unwrap().unwrap();
        moved.start_time = Some(at(9, 15));
        assert!(matches!(
            repo.update_task(moved),
            Err(RepoError::ScheduleConflict(id)) if id == a
        ));
        assert_eq!(
            repo.get_task(b).unwrap().unwrap().start_time,
            Some(at(11, 0))
        );
    }

    #[test]
    fn epic_window_never_causes_conflicts() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        repo.add_subtask(Subtask::scheduled("early", "", Status::New, at(9, 0), 30, epic_id))
            .unwrap();
        repo.add_subtask(Subtask::scheduled("late", "", Status::New, at(11, 30), 30, epic_id))
            .unwrap();

        // The epic's derived window now spans 09:00–12:00. A task inside the
        // gap overlaps the window but no subtask, so it must be accepted.
        let id = repo
            .add_task(Task::scheduled("between", "", Status::New, at(10, 0), 30))
            .unwrap();
        assert!(repo.get_task(id).unwrap().is_some());
    }

    #[test]
    fn dangling_subtask_is_rejected_distinctly() {
        let mut repo = TaskRepository::new();
        let result = repo.add_subtask(Subtask::new("s", "", Status::New, 99));
        assert!(matches!(result, Err(RepoError::DanglingEpic(99))));
        assert!(repo.list_subtasks().is_empty());
    }

    #[test]
    fn update_to_dangling_epic_is_rejected() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        let sid = repo
            .add_subtask(Subtask::new("s", "", Status::New, epic_id))
            .unwrap();

        let mut sub = repo.get_subtask(sid).unwrap().unwrap();
        sub.epic_id = 404;
        assert!(matches!(
            repo.update_subtask(sub),
            Err(RepoError::DanglingEpic(404))
        ));
        assert_eq!(
            repo.get_subtask(sid).unwrap().unwrap().epic_id,
            epic_id
        );
    }

    #[test]
    fn update_of_missing_entities_is_not_found() {
        let mut repo = TaskRepository::new();
        assert!(matches!(
            repo.update_task(Task::new("x", "", Status::New)),
            Err(RepoError::NotFound(0))
        ));
        let mut epic = Epic::new("x", "");
        epic.id = 7;
        assert!(matches!(repo.update_epic(epic), Err(RepoError::NotFound(7))));
    }

    #[test]
    fn update_epic_keeps_derived_fields_and_subtasks() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "old")).unwrap();
        repo.add_subtask(Subtask::scheduled("s", "", Status::Done, at(9, 0), 30, epic_id))
            .unwrap();

        let mut doctored = repo.get_epic(epic_id).unwrap().unwrap();
        doctored.name = "release v2".to_string();
        doctored.description = "new".to_string();
        doctored.status = Status::New; // must not stick
        doctored.subtask_ids.clear(); // must not stick
        doctored.duration_minutes = 999;
        repo.update_epic(doctored).unwrap();

        let epic = repo.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.name, "release v2");
        assert_eq!(epic.description, "new");
        assert_eq!(epic.status, Status::Done);
        assert_eq!(epic.subtask_ids.len(), 1);
        assert_eq!(epic.duration_minutes, 30);
    }

    #[test]
    fn reparenting_subtask_recomputes_both_epics() {
        let mut repo = TaskRepository::new();
        let first = repo.add_epic(Epic::new("first", "")).unwrap();
        let second = repo.add_epic(Epic::new("second", "")).unwrap();
        let sid = repo
            .add_subtask(Subtask::scheduled("s", "", Status::Done, at(9, 0), 30, first))
            .unwrap();

        let mut sub = repo.get_subtask(sid).unwrap().unwrap();
        sub.epic_id = second;
        repo.update_subtask(sub).unwrap();

        let first_epic = repo.get_epic(first).unwrap().unwrap();
        assert!(first_epic.subtask_ids.is_empty());
        assert_eq!(first_epic.status, Status::New);
        assert_eq!(first_epic.duration_minutes, 0);

        let second_epic = repo.get_epic(second).unwrap().unwrap();
        assert_eq!(second_epic.subtask_ids, vec![sid]);
        assert_eq!(second_epic.status, Status::Done);
        assert_eq!(second_epic.duration_minutes, 30);
    }

    #[test]
    fn history_deduplicates_and_orders_by_recency() {
        let mut repo = TaskRepository::new();
        let a = repo.add_task(Task::new("a", "", Status::New)).unwrap();
        let b = repo.add_task(Task::new("b", "", Status::New)).unwrap();

        repo.get_task(a).unwrap();
        repo.get_task(b).unwrap();
        repo.get_task(a).unwrap();

        let ids: Vec<u64> = repo.history().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![b, a]);

        repo.remove_task(b).unwrap();
        let ids: Vec<u64> = repo.history().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![a]);
    }

    #[test]
    fn missing_lookups_do_not_touch_history() {
        let mut repo = TaskRepository::new();
        assert!(repo.get_task(1).unwrap().is_none());
        assert!(repo.get_epic(1).unwrap().is_none());
        assert!(repo.get_subtask(1).unwrap().is_none());
        assert!(repo.history().is_empty());
    }

    #[test]
    fn removing_epic_cascades_everywhere() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        let s1 = repo
            .add_subtask(Subtask::scheduled("s1", "", Status::New, at(9, 0), 30, epic_id))
            .unwrap();
        let s2 = repo
            .add_subtask(Subtask::new("s2", "", Status::New, epic_id))
            .unwrap();
        repo.get_subtask(s1).unwrap();
        repo.get_epic(epic_id).unwrap();

        assert!(repo.remove_epic(epic_id).unwrap());
        assert!(repo.list_subtasks().is_empty());
        assert!(repo.history().is_empty());
        assert!(repo.prioritized_tasks().is_empty());
        assert!(repo.get_subtask(s2).unwrap().is_none());
        assert!(matches!(
            repo.get_epic_subtasks(epic_id),
            Err(RepoError::NotFound(_))
        ));
    }

    #[test]
    fn removing_missing_entities_reports_false() {
        let mut repo = TaskRepository::new();
        assert!(!repo.remove_task(1).unwrap());
        assert!(!repo.remove_epic(1).unwrap());
        assert!(!repo.remove_subtask(1).unwrap());
    }

    #[test]
    fn remove_all_subtasks_resets_epics() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        repo.add_subtask(Subtask::scheduled("s", "", Status::Done, at(9, 0), 30, epic_id))
            .unwrap();

        repo.remove_all_subtasks().unwrap();
        let epic = repo.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.status, Status::New);
        assert_eq!(epic.start_time, None);
        assert_eq!(epic.duration_minutes, 0);
        assert!(repo.get_epic_subtasks(epic_id).unwrap().is_empty());
    }

    #[test]
    fn remove_all_epics_takes_subtasks_along() {
        let mut repo = TaskRepository::new();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        repo.add_subtask(Subtask::new("s", "", Status::New, epic_id))
            .unwrap();
        let task_id = repo.add_task(Task::new("keep", "", Status::New)).unwrap();

        repo.remove_all_epics().unwrap();
        assert!(repo.list_epics().is_empty());
        assert!(repo.list_subtasks().is_empty());
        assert_eq!(repo.list_tasks().len(), 1);
        assert!(repo.get_task(task_id).unwrap().is_some());
    }

    #[test]
    fn prioritized_order_is_start_then_id_with_undated_last() {
        let mut repo = TaskRepository::new();
        let undated = repo.add_task(Task::new("undated", "", Status::New)).unwrap();
        let late = repo
            .add_task(Task::scheduled("late", "", Status::New, at(15, 0), 30))
            .unwrap();
        let early = repo
            .add_task(Task::scheduled("early", "", Status::New, at(8, 0), 30))
            .unwrap();
        let epic_id = repo.add_epic(Epic::new("release", "")).unwrap();
        let sub = repo
            .add_subtask(Subtask::scheduled("mid", "", Status::New, at(12, 0), 30, epic_id))
            .unwrap();

        let ids: Vec<u64> = repo.prioritized_tasks().iter().map(|i| i.id()).collect();
        // The epic derives start 12:00 from its subtask; it ties with the
        // subtask and wins on the lower id.
        assert_eq!(ids, vec![early, epic_id, sub, late, undated]);
    }

    #[test]
    fn snapshot_round_trip_through_csv_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.csv");

        let (epic_id, task_id, sub_id);
        {
            let mut repo =
                TaskRepository::with_store(Box::new(CsvStore::new(&path))).unwrap();
            epic_id = repo.add_epic(Epic::new("release", "ship it")).unwrap();
            sub_id = repo
                .add_subtask(Subtask::scheduled("s", "", Status::Done, at(9, 0), 30, epic_id))
                .unwrap();
            task_id = repo
                .add_task(Task::scheduled("standup", "", Status::New, at(10, 0), 15))
                .unwrap();
            repo.get_task(task_id).unwrap();
            repo.get_epic(epic_id).unwrap();
        }

        let mut reopened = TaskRepository::with_store(Box::new(CsvStore::new(&path))).unwrap();
        let epic = reopened.get_epic(epic_id).unwrap().unwrap();
        assert_eq!(epic.status, Status::Done);
        assert_eq!(epic.subtask_ids, vec![sub_id]);
        assert_eq!(epic.start_time, Some(at(9, 0)));

        let history_ids: Vec<u64> = reopened.history().iter().map(|i| i.id()).collect();
        // task then epic were viewed, and reopening itself viewed the epic
        // again, which dedups to the same order.
        assert_eq!(history_ids, vec![task_id, epic_id]);

        // Ids resume above the highest persisted id.
        let fresh = reopened.add_task(Task::new("new", "", Status::New)).unwrap();
        assert!(fresh > task_id && fresh > sub_id);

        // Epic and subtask tie at 09:00; the epic's lower id sorts first.
        let ids: Vec<u64> = reopened.prioritized_tasks().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![epic_id, sub_id, task_id, fresh]);
    }
}
