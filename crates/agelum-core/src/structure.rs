use crate::error::Result;
use crate::io::ensure_dir;
use crate::paths;
use crate::types::ItemKind;
use std::path::Path;

/// Create the `.agelum/` directory tree. Idempotent.
pub fn ensure_structure(root: &Path) -> Result<()> {
    for dir in [
        paths::PLAN_DIR,
        paths::DOCS_DIR,
        paths::COMMANDS_DIR,
        paths::TESTS_DIR,
        paths::TASK_IMAGES_DIR,
    ] {
        ensure_dir(&root.join(dir))?;
    }
    for kind in ItemKind::all() {
        let base = paths::primary_root(root, *kind);
        for state in kind.states() {
            ensure_dir(&base.join(state.as_str()))?;
        }
    }
    Ok(())
}

pub fn is_initialized(root: &Path) -> bool {
    paths::agelum_dir(root).is_dir()
}
