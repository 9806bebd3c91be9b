use crate::output::{print_json, print_table, truncate};
use agelum_core::item::{NewItem, WorkItem};
use agelum_core::settings::SettingsStore;
use agelum_core::types::{ItemKind, Priority};
use agelum_core::{board, store};
use anyhow::Context;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ItemSubcommand {
    /// List items, optionally in one state
    List {
        #[arg(long)]
        state: Option<String>,
    },
    /// Show the Kanban board
    Board,
    /// Show one item
    Show { id: String },
    /// Create an item
    Create {
        #[arg(required = true)]
        title: Vec<String>,
        #[arg(long)]
        description: Option<String>,
        /// Initial state (default depends on the kind)
        #[arg(long)]
        state: Option<String>,
        /// low, medium, high or urgent (tasks only)
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        reporter: Option<String>,
    },
    /// Move an item to another state
    Move {
        id: String,
        /// Target state
        to: String,
        /// Current state (default: looked up)
        #[arg(long)]
        from: Option<String>,
    },
    /// Rename a task or epic file after a new title
    Rename {
        path: String,
        #[arg(required = true)]
        title: Vec<String>,
    },
    /// Search titles and descriptions
    Search { query: String },
}

#[derive(Subcommand)]
pub enum TaskSubcommand {
    #[command(flatten)]
    Common(ItemSubcommand),
    /// Create a task from a markdown file (`-` reads stdin)
    CreateFrom {
        file: PathBuf,
        #[arg(long)]
        state: Option<String>,
        /// Title used for the file name
        #[arg(long)]
        name: Option<String>,
    },
}

pub fn run_task(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TaskSubcommand::Common(sub) => run(root, ItemKind::Task, sub, json),
        TaskSubcommand::CreateFrom { file, state, name } => {
            create_from(root, &file, state.as_deref(), name.as_deref(), json)
        }
    }
}

pub fn run(root: &Path, kind: ItemKind, subcmd: ItemSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ItemSubcommand::List { state } => list(root, kind, state.as_deref(), json),
        ItemSubcommand::Board => show_board(root, kind, json),
        ItemSubcommand::Show { id } => show(root, kind, &id, json),
        ItemSubcommand::Create {
            title,
            description,
            state,
            priority,
            assignee,
            reporter,
        } => {
            let new = NewItem {
                title: title.join(" "),
                description,
                state,
                assignee,
                reporter,
                priority,
                source_url: None,
            };
            create(root, kind, new, json)
        }
        ItemSubcommand::Move { id, to, from } => move_item(root, kind, &id, from.as_deref(), &to, json),
        ItemSubcommand::Rename { path, title } => rename(root, kind, &path, &title.join(" "), json),
        ItemSubcommand::Search { query } => search(root, kind, &query, json),
    }
}

fn print_items(items: &[WorkItem], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No items.");
        return Ok(());
    }
    let rows = items
        .iter()
        .map(|i| {
            vec![
                i.id.clone(),
                i.state.to_string(),
                truncate(&i.title, 50),
                i.epic.clone().unwrap_or_default(),
                i.created_at.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "STATE", "TITLE", "EPIC", "CREATED"], rows);
    Ok(())
}

fn list(root: &Path, kind: ItemKind, state: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut items = store::list(root, kind)?;
    if let Some(s) = state {
        let wanted = kind.parse_state(s)?;
        items.retain(|i| i.state == wanted);
    }
    print_items(&items, json)
}

fn show_board(root: &Path, kind: ItemKind, json: bool) -> anyhow::Result<()> {
    let columns = board::board(root, kind)?;
    if json {
        print_json(&columns)?;
    } else {
        print!("{}", board::render_text(&columns));
    }
    Ok(())
}

fn show(root: &Path, kind: ItemKind, id: &str, json: bool) -> anyhow::Result<()> {
    let item = store::get(root, kind, id)?;
    if json {
        return print_json(&item);
    }
    println!("{} [{}]", item.title, item.state);
    println!("id:      {}", item.id);
    println!("path:    {}", item.path.display());
    println!("created: {}", item.created_at.to_rfc3339());
    if let Some(epic) = &item.epic {
        println!("epic:    {epic}");
    }
    if let Some(p) = item.priority {
        println!("priority: {p}");
    }
    if !item.description.trim().is_empty() {
        println!("\n{}", item.description.trim());
    }
    Ok(())
}

fn create(root: &Path, kind: ItemKind, new: NewItem, json: bool) -> anyhow::Result<()> {
    let item = store::create(root, kind, new)?;
    if kind == ItemKind::Task && branch_per_task() {
        store::create_task_branch(root, &item.id);
    }
    if json {
        print_json(&item)?;
    } else {
        println!("Created {kind} [{}] in {}: {}", item.id, item.state, item.title);
    }
    Ok(())
}

/// Unreadable settings just mean no branch.
fn branch_per_task() -> bool {
    SettingsStore::from_env()
        .and_then(|s| s.load())
        .map(|s| s.create_branch_per_task)
        .unwrap_or(false)
}

fn create_from(
    root: &Path,
    file: &Path,
    state: Option<&str>,
    name: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let content = if file == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
    } else {
        std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?
    };
    let base = name.map(str::to_string).or_else(|| {
        file.file_stem()
            .filter(|_| file != Path::new("-"))
            .map(|s| s.to_string_lossy().into_owned())
    });
    let created = store::create_from_content(root, state, base.as_deref(), &content)?;
    if branch_per_task() {
        store::create_task_branch(root, &created.id);
    }
    if json {
        print_json(&created)?;
    } else {
        println!("Created task [{}]: {}", created.id, created.path.display());
    }
    Ok(())
}

fn move_item(
    root: &Path,
    kind: ItemKind,
    id: &str,
    from: Option<&str>,
    to: &str,
    json: bool,
) -> anyhow::Result<()> {
    let from = match from {
        Some(f) => f.to_string(),
        None => store::get(root, kind, id)?.state.to_string(),
    };
    let path = store::move_item(root, kind, id, &from, to)?;
    if json {
        print_json(&serde_json::json!({
            "id": id,
            "from_state": from,
            "to_state": to,
            "path": path,
        }))?;
    } else {
        println!("Moved {kind} [{id}]: {from} → {to}");
    }
    Ok(())
}

fn rename(root: &Path, kind: ItemKind, path: &str, title: &str, json: bool) -> anyhow::Result<()> {
    let renamed = store::rename(root, kind, path, title)?;
    if json {
        print_json(&renamed)?;
    } else {
        println!("Renamed to [{}]: {}", renamed.id, renamed.path.display());
    }
    Ok(())
}

fn search(root: &Path, kind: ItemKind, query: &str, json: bool) -> anyhow::Result<()> {
    let items = store::search(root, kind, query)?;
    print_items(&items, json)
}
