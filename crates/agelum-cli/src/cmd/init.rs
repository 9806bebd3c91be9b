use crate::output::print_json;
use agelum_core::structure;
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let existed = structure::is_initialized(root);
    structure::ensure_structure(root)
        .with_context(|| format!("failed to create .agelum in {}", root.display()))?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "created": !existed,
        }))?;
    } else if existed {
        println!("Agelum already initialized in: {}", root.display());
    } else {
        println!("Initialized Agelum in: {}", root.display());
    }
    Ok(())
}
