//! Move older layouts into the current `.agelum/` structure.
//!
//! Two older layouts exist in the wild: the legacy visible `agelum/` directory
//! and a flat `.agelum/` (`.agelum/tasks`, `.agelum/docs`, …). Both are folded
//! into the nested layout, and tasks/epics `priority` folders become `fixes`.
//! Existing files are never overwritten.

use crate::error::Result;
use crate::io::{move_file, prune_empty_dirs};
use crate::paths;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Flat directory name → nested location under `.agelum/`.
const FLAT_MOVES: &[(&str, &str)] = &[
    ("docs", "doc/docs"),
    ("plan", "doc/plan"),
    ("plans", "doc/plan"),
    ("research", "doc/research"),
    ("context", "doc/context"),
    ("ideas", "doc/ideas"),
    ("epics", "work/epics"),
    ("tasks", "work/tasks"),
    ("tests", "work/tests"),
    ("commands", "ai/commands"),
    ("skills", "ai/skills"),
    ("agents", "ai/agents"),
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub moved: Vec<MovedFile>,
    /// Entries left in place (symlinks and other non-regular files).
    pub skipped: Vec<PathBuf>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.skipped.is_empty()
    }
}

struct Migrator {
    dry_run: bool,
    report: MigrationReport,
    claimed: HashSet<PathBuf>,
}

pub fn migrate(root: &Path, dry_run: bool) -> Result<MigrationReport> {
    let primary = paths::agelum_dir(root);
    let legacy = paths::legacy_dir(root);
    let mut m = Migrator {
        dry_run,
        report: MigrationReport {
            dry_run,
            ..MigrationReport::default()
        },
        claimed: HashSet::new(),
    };

    for base in [&legacy, &primary] {
        for (from, to) in FLAT_MOVES {
            let src = base.join(from);
            if !src.is_dir() {
                continue;
            }
            let dst = primary.join(to);
            let remap_priority = matches!(*from, "tasks" | "epics");
            m.merge_children(&src, &dst, remap_priority)?;
            if !dry_run {
                prune_empty_dirs(&src, base)?;
            }
        }
    }

    for rel in [paths::TASKS_DIR, paths::EPICS_DIR] {
        let kind_root = root.join(rel);
        let priority = kind_root.join("priority");
        if priority.is_dir() {
            m.merge_tree(&priority, &kind_root.join("fixes"))?;
            if !dry_run {
                prune_empty_dirs(&priority, &kind_root)?;
            }
        }
    }

    if !dry_run && legacy.is_dir() {
        prune_empty_dirs(&legacy, root)?;
    }

    tracing::info!(
        moved = m.report.moved.len(),
        skipped = m.report.skipped.len(),
        dry_run,
        "migration finished"
    );
    Ok(m.report)
}

impl Migrator {
    fn merge_children(&mut self, src: &Path, dst: &Path, remap_priority: bool) -> Result<()> {
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            let name = entry.file_name();
            let target_name = if remap_priority && name == "priority" {
                "fixes".into()
            } else {
                name
            };
            self.merge_entry(&entry.path(), &dst.join(target_name))?;
        }
        Ok(())
    }

    fn merge_tree(&mut self, src: &Path, dst: &Path) -> Result<()> {
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            self.merge_entry(&entry.path(), &dst.join(entry.file_name()))?;
        }
        Ok(())
    }

    fn merge_entry(&mut self, src: &Path, dst: &Path) -> Result<()> {
        let meta = std::fs::symlink_metadata(src)?;
        if meta.is_dir() {
            self.merge_tree(src, dst)?;
            if !self.dry_run {
                let _ = std::fs::remove_dir(src);
            }
        } else if meta.is_file() {
            let target = self.free_target(dst);
            if !self.dry_run {
                move_file(src, &target)?;
            }
            self.claimed.insert(target.clone());
            self.report.moved.push(MovedFile {
                from: src.to_path_buf(),
                to: target,
            });
        } else {
            self.report.skipped.push(src.to_path_buf());
        }
        Ok(())
    }

    /// `dst`, or `<stem>-N.<ext>` when `dst` is taken on disk or by this run.
    fn free_target(&self, dst: &Path) -> PathBuf {
        let taken = |p: &Path| p.exists() || self.claimed.contains(p);
        if !taken(dst) {
            return dst.to_path_buf();
        }
        let dir = dst.parent().unwrap_or(Path::new(""));
        let stem = dst
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = dst.extension().map(|e| e.to_string_lossy().into_owned());
        let mut n = 2;
        loop {
            let name = match &ext {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            let candidate = dir.join(name);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
