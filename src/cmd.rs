//! Command implementations for the CLI interface.
//!
//! This module contains the command handlers for the various subcommands,
//! from basic CRUD operations to the schedule and history views and the
//! `serve` command that starts the REST API.

use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use chrono::NaiveDateTime;

use crate::cli::Cli;
use crate::error::RepoError;
use crate::fields::*;
use crate::repo::TaskRepository;
use crate::server;
use crate::task::{Epic, Subtask, Task, WorkItem};

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task, epic or subtask.
    Add {
        /// Short name for the work item.
        name: String,
        /// Optional longer description.
        #[arg(long, default_value = "")]
        desc: String,
        /// Item kind: task | epic | subtask.
        #[arg(long, value_enum, default_value_t = Kind::Task)]
        kind: Kind,
        /// Initial status (ignored for epics, whose status is derived).
        #[arg(long, value_enum, default_value_t = Status::New)]
        status: Status,
        /// Scheduled start: "YYYY-MM-DD HH:MM" (seconds optional, T accepted).
        #[arg(long)]
        start: Option<String>,
        /// Duration in minutes.
        #[arg(long, default_value_t = 0)]
        duration: i64,
        /// Owning epic id (required for subtasks).
        #[arg(long)]
        epic: Option<u64>,
    },

    /// List work items.
    List {
        /// Restrict to one kind.
        #[arg(long, value_enum)]
        kind: Option<Kind>,
    },

    /// View one work item (records it in the view history).
    View { id: u64 },

    /// Update fields of a work item.
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// New status (not valid for epics, whose status is derived).
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// New start: "YYYY-MM-DD HH:MM".
        #[arg(long)]
        start: Option<String>,
        /// Remove the scheduled start.
        #[arg(long)]
        clear_start: bool,
        #[arg(long)]
        duration: Option<i64>,
        /// Move a subtask to another epic.
        #[arg(long)]
        epic: Option<u64>,
    },

    /// Mark a task or subtask as done.
    Done { id: u64 },

    /// Delete a work item (deleting an epic deletes its subtasks).
    Delete { id: u64 },

    /// Show recently viewed items, oldest first.
    History,

    /// Show all items in schedule order.
    Schedule,

    /// Remove all items of a kind, or everything.
    Clear {
        #[arg(long, value_enum)]
        kind: Option<Kind>,
    },

    /// Start the REST API server.
    Serve {
        /// Bind address.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
        /// Persist snapshots to a remote KV server instead of the CSV file.
        #[arg(long)]
        kv_url: Option<String>,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn fail(err: RepoError) -> ! {
    eprintln!("error: {err}");
    std::process::exit(1);
}

/// Parse a start instant in the formats the CLI accepts.
pub fn parse_start_input(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_start_or_exit(s: &str) -> NaiveDateTime {
    parse_start_input(s).unwrap_or_else(|| {
        eprintln!("error: invalid start \"{s}\", expected YYYY-MM-DD HH:MM");
        std::process::exit(1);
    })
}

fn format_instant(t: Option<NaiveDateTime>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

/// Print work items in a formatted table.
fn print_items(items: &[WorkItem]) {
    // Header.
    println!(
        "{:<5} {:<8} {:<12} {:<17} {:<17} {:<6} {}",
        "ID", "Kind", "Status", "Start", "End", "Min", "Name"
    );
    for item in items {
        println!(
            "{:<5} {:<8} {:<12} {:<17} {:<17} {:<6} {}",
            item.id(),
            format_kind(item.kind()),
            format_status(item.status()),
            format_instant(item.start_time()),
            format_instant(item.end_time()),
            item.duration_minutes(),
            item.name()
        );
    }
}

pub fn cmd_add(
    repo: &mut TaskRepository,
    name: String,
    desc: String,
    kind: Kind,
    status: Status,
    start: Option<String>,
    duration: i64,
    epic: Option<u64>,
) {
    let start = start.as_deref().map(parse_start_or_exit);
    let result = match kind {
        Kind::Task => repo.add_task(Task {
            id: 0,
            name,
            description: desc,
            status,
            start_time: start,
            duration_minutes: duration,
        }),
        Kind::Epic => repo.add_epic(Epic::new(&name, &desc)),
        Kind::Subtask => {
            let Some(epic_id) = epic else {
                eprintln!("error: subtasks need --epic <id>");
                std::process::exit(1);
            };
            repo.add_subtask(Subtask {
                id: 0,
                name,
                description: desc,
                status,
                start_time: start,
                duration_minutes: duration,
                epic_id,
            })
        }
    };
    match result {
        Ok(id) => println!("added {} {}", format_kind(kind), id),
        Err(err) => fail(err),
    }
}

pub fn cmd_list(repo: &TaskRepository, kind: Option<Kind>) {
    let mut items: Vec<WorkItem> = Vec::new();
    if kind.is_none() || kind == Some(Kind::Task) {
        items.extend(repo.list_tasks().into_iter().map(WorkItem::Task));
    }
    if kind.is_none() || kind == Some(Kind::Epic) {
        items.extend(repo.list_epics().into_iter().map(WorkItem::Epic));
    }
    if kind.is_none() || kind == Some(Kind::Subtask) {
        items.extend(repo.list_subtasks().into_iter().map(WorkItem::Subtask));
    }
    print_items(&items);
}

pub fn cmd_view(repo: &mut TaskRepository, id: u64) {
    match repo.get_task(id) {
        Ok(Some(task)) => {
            print_items(&[WorkItem::Task(task.clone())]);
            if !task.description.is_empty() {
                println!("\n{}", task.description);
            }
            return;
        }
        Ok(None) => {}
        Err(err) => fail(err),
    }
    match repo.get_epic(id) {
        Ok(Some(epic)) => {
            print_items(&[WorkItem::Epic(epic.clone())]);
            if !epic.description.is_empty() {
                println!("\n{}", epic.description);
            }
            match repo.get_epic_subtasks(id) {
                Ok(subtasks) if !subtasks.is_empty() => {
                    println!("\nsubtasks:");
                    let items: Vec<WorkItem> =
                        subtasks.into_iter().map(WorkItem::Subtask).collect();
                    print_items(&items);
                }
                Ok(_) => {}
                Err(err) => fail(err),
            }
            return;
        }
        Ok(None) => {}
        Err(err) => fail(err),
    }
    match repo.get_subtask(id) {
        Ok(Some(subtask)) => {
            print_items(&[WorkItem::Subtask(subtask.clone())]);
            println!("\nepic: {}", subtask.epic_id);
            if !subtask.description.is_empty() {
                println!("{}", subtask.description);
            }
        }
        Ok(None) => {
            eprintln!("no work item with id {id}");
            std::process::exit(1);
        }
        Err(err) => fail(err),
    }
}

pub fn cmd_update(
    repo: &mut TaskRepository,
    id: u64,
    name: Option<String>,
    desc: Option<String>,
    status: Option<Status>,
    start: Option<String>,
    clear_start: bool,
    duration: Option<i64>,
    epic: Option<u64>,
) {
    let start = start.as_deref().map(parse_start_or_exit);

    if let Ok(Some(mut task)) = repo.get_task(id) {
        if let Some(name) = name {
            task.name = name;
        }
        if let Some(desc) = desc {
            task.description = desc;
        }
        if let Some(status) = status {
            task.status = status;
        }
        if clear_start {
            task.start_time = None;
        } else if start.is_some() {
            task.start_time = start;
        }
        if let Some(duration) = duration {
            task.duration_minutes = duration;
        }
        match repo.update_task(task) {
            Ok(()) => println!("updated task {id}"),
            Err(err) => fail(err),
        }
        return;
    }

    if let Ok(Some(mut stored)) = repo.get_epic(id) {
        if status.is_some() || start.is_some() || clear_start || duration.is_some() {
            eprintln!("error: epic status and schedule are derived from its subtasks");
            std::process::exit(1);
        }
        if let Some(name) = name {
            stored.name = name;
        }
        if let Some(desc) = desc {
            stored.description = desc;
        }
        match repo.update_epic(stored) {
            Ok(()) => println!("updated epic {id}"),
            Err(err) => fail(err),
        }
        return;
    }

    if let Ok(Some(mut subtask)) = repo.get_subtask(id) {
        if let Some(name) = name {
            subtask.name = name;
        }
        if let Some(desc) = desc {
            subtask.description = desc;
        }
        if let Some(status) = status {
            subtask.status = status;
        }
        if clear_start {
            subtask.start_time = None;
        } else if start.is_some() {
            subtask.start_time = start;
        }
        if let Some(duration) = duration {
            subtask.duration_minutes = duration;
        }
        if let Some(epic_id) = epic {
            subtask.epic_id = epic_id;
        }
        match repo.update_subtask(subtask) {
            Ok(()) => println!("updated subtask {id}"),
            Err(err) => fail(err),
        }
        return;
    }

    eprintln!("no work item with id {id}");
    std::process::exit(1);
}

pub fn cmd_done(repo: &mut TaskRepository, id: u64) {
    if let Ok(Some(mut task)) = repo.get_task(id) {
        task.status = Status::Done;
        match repo.update_task(task) {
            Ok(()) => println!("task {id} done"),
            Err(err) => fail(err),
        }
        return;
    }
    if let Ok(Some(mut subtask)) = repo.get_subtask(id) {
        subtask.status = Status::Done;
        match repo.update_subtask(subtask) {
            Ok(()) => println!("subtask {id} done"),
            Err(err) => fail(err),
        }
        return;
    }
    if let Ok(Some(_)) = repo.get_epic(id) {
        eprintln!("error: epic status is derived; complete its subtasks instead");
        std::process::exit(1);
    }
    eprintln!("no work item with id {id}");
    std::process::exit(1);
}

pub fn cmd_delete(repo: &mut TaskRepository, id: u64) {
    let removed = match repo.remove_task(id) {
        Ok(true) => true,
        Ok(false) => match repo.remove_epic(id) {
            Ok(true) => true,
            Ok(false) => match repo.remove_subtask(id) {
                Ok(found) => found,
                Err(err) => fail(err),
            },
            Err(err) => fail(err),
        },
        Err(err) => fail(err),
    };
    if removed {
        println!("deleted {id}");
    } else {
        eprintln!("no work item with id {id}");
        std::process::exit(1);
    }
}

pub fn cmd_history(repo: &TaskRepository) {
    print_items(&repo.history());
}

pub fn cmd_schedule(repo: &TaskRepository) {
    print_items(&repo.prioritized_tasks());
}

pub fn cmd_clear(repo: &mut TaskRepository, kind: Option<Kind>) {
    let result = match kind {
        Some(Kind::Task) => repo.remove_all_tasks(),
        Some(Kind::Epic) => repo.remove_all_epics(),
        Some(Kind::Subtask) => repo.remove_all_subtasks(),
        None => repo
            .remove_all_tasks()
            .and_then(|()| repo.remove_all_epics()),
    };
    match result {
        Ok(()) => println!("cleared"),
        Err(err) => fail(err),
    }
}

pub fn cmd_serve(repo: TaskRepository, addr: &str) {
    if let Err(err) = server::run(repo, addr) {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}

pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tb", &mut std::io::stdout());
}
