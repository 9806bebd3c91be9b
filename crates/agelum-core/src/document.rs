use crate::error::{AgelumError, Result};
use crate::io::{atomic_write, move_file};
use crate::paths;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Directories a document path may resolve into.
fn allowed_roots(root: &Path) -> Vec<PathBuf> {
    vec![paths::agelum_dir(root), paths::legacy_dir(root)]
}

/// Resolve a user-supplied document path, confined to the Agelum directories.
pub fn resolve(root: &Path, path: &str) -> Result<PathBuf> {
    paths::confine(root, path, &allowed_roots(root))
}

pub fn read(root: &Path, path: &str) -> Result<String> {
    let full = resolve(root, path)?;
    if !full.is_file() {
        return Err(AgelumError::FileNotFound(path.to_string()));
    }
    Ok(std::fs::read_to_string(full)?)
}

pub fn write(root: &Path, path: &str, content: &str) -> Result<PathBuf> {
    let full = resolve(root, path)?;
    if full.is_dir() {
        return Err(AgelumError::InvalidPath(format!("{path} is a directory")));
    }
    atomic_write(&full, content.as_bytes())?;
    tracing::debug!(path = %full.display(), "wrote document");
    Ok(full)
}

pub fn delete(root: &Path, path: &str) -> Result<()> {
    let full = resolve(root, path)?;
    if full.is_dir() {
        std::fs::remove_dir_all(&full)?;
    } else if full.is_file() {
        std::fs::remove_file(&full)?;
    } else {
        return Err(AgelumError::FileNotFound(path.to_string()));
    }
    tracing::info!(path = %full.display(), "deleted document");
    Ok(())
}

/// Move a document to a new path. The target must not exist.
pub fn rename(root: &Path, from: &str, to: &str) -> Result<PathBuf> {
    let src = resolve(root, from)?;
    let dst = resolve(root, to)?;
    if !src.exists() {
        return Err(AgelumError::FileNotFound(from.to_string()));
    }
    if dst.exists() {
        return Err(AgelumError::InvalidPath(format!("{to} already exists")));
    }
    move_file(&src, &dst)?;
    Ok(dst)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocEntry {
    pub name: String,
    /// `docs` or `plan`.
    pub folder: String,
    pub path: PathBuf,
}

/// Markdown files under `.agelum/doc/docs` and `.agelum/doc/plan`, recursively.
pub fn list_docs(root: &Path) -> Result<Vec<DocEntry>> {
    let mut out = Vec::new();
    for (folder, rel) in [("docs", paths::DOCS_DIR), ("plan", paths::PLAN_DIR)] {
        collect(&root.join(rel), folder, &mut out)?;
    }
    out.sort_by(|a, b| a.folder.cmp(&b.folder).then(a.path.cmp(&b.path)));
    Ok(out)
}

fn collect(dir: &Path, folder: &str, out: &mut Vec<DocEntry>) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect(&path, folder, out)?;
        } else if path.extension().is_some_and(|e| e == "md") {
            out.push(DocEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                folder: folder.to_string(),
                path,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileNode {
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

/// Directory tree of `.agelum/<sub>` showing markdown files only. Hidden
/// entries are skipped; directories sort before files.
pub fn tree(root: &Path, sub: Option<&str>) -> Result<FileNode> {
    let base = paths::agelum_dir(root);
    let dir = match sub.filter(|s| !s.is_empty()) {
        Some(s) => paths::confine(&base, s, std::slice::from_ref(&base))?,
        None => base,
    };
    if !dir.is_dir() {
        return Ok(FileNode {
            name: sub.unwrap_or(paths::AGELUM_DIR).to_string(),
            path: dir,
            node_type: NodeType::Directory,
            children: Some(Vec::new()),
        });
    }
    build_tree(&dir)
}

fn build_tree(dir: &Path) -> Result<FileNode> {
    let mut children = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            children.push(build_tree(&path)?);
        } else if ft.is_file() && name.ends_with(".md") {
            children.push(FileNode {
                name,
                path,
                node_type: NodeType::File,
                children: None,
            });
        }
    }
    children.sort_by(|a, b| match (&a.node_type, &b.node_type) {
        (NodeType::Directory, NodeType::File) => std::cmp::Ordering::Less,
        (NodeType::File, NodeType::Directory) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
    Ok(FileNode {
        name: dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: dir.to_path_buf(),
        node_type: NodeType::Directory,
        children: Some(children),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tree_lists_markdown_dirs_first() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, ".agelum/doc/docs/z.md", "z").unwrap();
        write(root, ".agelum/doc/docs/a/inner.md", "i").unwrap();
        write(root, ".agelum/doc/docs/skip.txt", "s").unwrap();
        write(root, ".agelum/doc/docs/.hidden.md", "h").unwrap();

        let node = tree(root, Some("doc/docs")).unwrap();
        assert_eq!(node.name, "docs");
        let kids = node.children.unwrap();
        let names: Vec<&str> = kids.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["a", "z.md"]);
        assert!(tree(root, Some("../..")).is_err());
    }

    #[test]
    fn write_read_delete_roundtrip() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let p = write(root, ".agelum/doc/docs/arch.md", "# Arch").unwrap();
        assert!(p.ends_with(".agelum/doc/docs/arch.md"));
        assert_eq!(read(root, ".agelum/doc/docs/arch.md").unwrap(), "# Arch");
        delete(root, ".agelum/doc/docs/arch.md").unwrap();
        assert!(matches!(
            read(root, ".agelum/doc/docs/arch.md"),
            Err(AgelumError::FileNotFound(_))
        ));
    }

    #[test]
    fn paths_outside_agelum_are_rejected() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("Cargo.toml"), "x").unwrap();
        assert!(matches!(read(root, "Cargo.toml"), Err(AgelumError::InvalidPath(_))));
        assert!(matches!(
            write(root, ".agelum/../../etc/x", "y"),
            Err(AgelumError::InvalidPath(_))
        ));
        assert!(write(root, "agelum/tasks/doing/x.md", "legacy ok").is_ok());
    }

    #[test]
    fn rename_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, ".agelum/doc/plan/a.md", "a").unwrap();
        write(root, ".agelum/doc/plan/b.md", "b").unwrap();
        assert!(rename(root, ".agelum/doc/plan/a.md", ".agelum/doc/plan/b.md").is_err());
        let moved = rename(root, ".agelum/doc/plan/a.md", ".agelum/doc/docs/a.md").unwrap();
        assert!(moved.is_file());
    }

    #[test]
    fn list_docs_covers_both_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, ".agelum/doc/docs/guide/setup.md", "s").unwrap();
        write(root, ".agelum/doc/plan/q3.md", "p").unwrap();
        write(root, ".agelum/doc/plan/notes.txt", "ignored").unwrap();
        let docs = list_docs(root).unwrap();
        let names: Vec<(&str, &str)> = docs
            .iter()
            .map(|d| (d.folder.as_str(), d.name.as_str()))
            .collect();
        assert_eq!(names, [("docs", "setup.md"), ("plan", "q3.md")]);
    }
}
