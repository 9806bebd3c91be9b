use crate::output::{print_json, print_table};
use agelum_core::document;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum DocSubcommand {
    /// List documents and plans
    List,
    /// Print a document
    Read { path: String },
    /// Write a document from --content or stdin
    Write {
        path: String,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a document
    Delete { path: String },
    /// Show the markdown tree under .agelum/
    Tree {
        /// Subdirectory, e.g. doc/docs
        sub: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: DocSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DocSubcommand::List => list(root, json),
        DocSubcommand::Read { path } => read(root, &path, json),
        DocSubcommand::Write { path, content } => write(root, &path, content, json),
        DocSubcommand::Delete { path } => delete(root, &path, json),
        DocSubcommand::Tree { sub } => tree(root, sub.as_deref(), json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let docs = document::list_docs(root)?;
    if json {
        return print_json(&docs);
    }
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    let rows = docs
        .iter()
        .map(|d| {
            let rel = d.path.strip_prefix(root).unwrap_or(&d.path);
            vec![d.folder.clone(), d.name.clone(), rel.display().to_string()]
        })
        .collect();
    print_table(&["FOLDER", "NAME", "PATH"], rows);
    Ok(())
}

fn read(root: &Path, path: &str, json: bool) -> anyhow::Result<()> {
    let content = document::read(root, path)?;
    if json {
        print_json(&serde_json::json!({ "path": path, "content": content }))?;
    } else {
        print!("{content}");
    }
    Ok(())
}

fn write(root: &Path, path: &str, content: Option<String>, json: bool) -> anyhow::Result<()> {
    let content = match content {
        Some(c) => c,
        None => std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?,
    };
    let full = document::write(root, path, &content)?;
    if json {
        print_json(&serde_json::json!({ "path": full }))?;
    } else {
        println!("Wrote {}", full.display());
    }
    Ok(())
}

fn delete(root: &Path, path: &str, json: bool) -> anyhow::Result<()> {
    document::delete(root, path)?;
    if json {
        print_json(&serde_json::json!({ "deleted": path }))?;
    } else {
        println!("Deleted {path}");
    }
    Ok(())
}

fn tree(root: &Path, sub: Option<&str>, json: bool) -> anyhow::Result<()> {
    let node = document::tree(root, sub)?;
    if json {
        return print_json(&node);
    }
    print_node(&node, 0);
    Ok(())
}

fn print_node(node: &document::FileNode, depth: usize) {
    let suffix = if node.children.is_some() { "/" } else { "" };
    println!("{}{}{suffix}", "  ".repeat(depth), node.name);
    for child in node.children.iter().flatten() {
        print_node(child, depth + 1);
    }
}
