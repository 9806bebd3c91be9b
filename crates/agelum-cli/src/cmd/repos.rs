use crate::output::{print_json, print_table};
use agelum_core::settings::{ProjectKind, SettingsStore};
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ReposSubcommand {
    /// List repositories (the default)
    List,
    /// Register a directory as a repository
    Add {
        path: PathBuf,
        /// Name used to refer to it (default: directory name)
        #[arg(long)]
        name: Option<String>,
        /// Treat every subdirectory as its own repository
        #[arg(long)]
        folder: bool,
    },
    /// Forget a repository; its files are left in place
    Remove { name: String },
}

pub fn run(subcmd: Option<ReposSubcommand>, json: bool) -> anyhow::Result<()> {
    let store = SettingsStore::from_env()?;
    match subcmd.unwrap_or(ReposSubcommand::List) {
        ReposSubcommand::List => list(&store, json),
        ReposSubcommand::Add { path, name, folder } => {
            let kind = if folder {
                ProjectKind::Folder
            } else {
                ProjectKind::Project
            };
            let project = store.add_project(&path, name.as_deref(), kind)?;
            if json {
                print_json(&project)?;
            } else {
                println!("Added {} ({})", project.name, project.path.display());
            }
            Ok(())
        }
        ReposSubcommand::Remove { name } => {
            let removed = store.remove_project(&name)?;
            if json {
                print_json(&serde_json::json!({ "removed": removed.id }))?;
            } else {
                println!("Removed {}", removed.name);
            }
            Ok(())
        }
    }
}

fn list(store: &SettingsStore, json: bool) -> anyhow::Result<()> {
    let repos = store.list_repositories()?;

    if json {
        return print_json(&repos);
    }
    if repos.is_empty() {
        println!(
            "No repositories configured in {}",
            store.settings_path().display()
        );
        return Ok(());
    }
    let rows = repos
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.path.display().to_string(),
                p.url.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["NAME", "PATH", "URL"], rows);
    Ok(())
}
