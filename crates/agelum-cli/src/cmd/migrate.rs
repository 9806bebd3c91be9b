use crate::output::{print_json, print_table};
use agelum_core::migrate;
use std::path::Path;

pub fn run(root: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let report = migrate::migrate(root, dry_run)?;

    if json {
        return print_json(&report);
    }
    if report.is_empty() {
        println!("Nothing to migrate.");
        return Ok(());
    }

    let rel = |p: &Path| p.strip_prefix(root).unwrap_or(p).display().to_string();
    let rows = report
        .moved
        .iter()
        .map(|m| vec![rel(&m.from), rel(&m.to)])
        .collect();
    print_table(&["FROM", "TO"], rows);
    for skipped in &report.skipped {
        println!("skipped: {}", rel(skipped));
    }
    if dry_run {
        println!("\n{} file(s) would move (dry run).", report.moved.len());
    } else {
        println!("\nMoved {} file(s).", report.moved.len());
    }
    Ok(())
}
