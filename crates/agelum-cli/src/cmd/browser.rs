use crate::output::print_json;
use agelum_core::browser::{self, CommandOutcome, PlannedStep};
use agelum_core::settings::SettingsStore;
use anyhow::bail;
use std::path::Path;

/// `agelum browser navigate <test-id>` replays a stored test; any other
/// arguments are handed to `agent-browser` unchanged.
pub fn run(root: &Path, args: &[String], json: bool) -> anyhow::Result<()> {
    let settings = SettingsStore::from_env()?.load()?;
    let exe = browser::resolve(&settings)?;

    if args.first().map(String::as_str) != Some("navigate") {
        let code = browser::passthrough(&exe, args)?;
        if code != 0 {
            std::process::exit(code);
        }
        return Ok(());
    }

    let Some(test_id) = args.get(1) else {
        bail!("usage: agelum browser navigate <test-id>");
    };

    let mut steps = Vec::new();
    let summary = browser::navigate(&exe, root, test_id, |step, outcome| {
        if json {
            steps.push(serde_json::json!({ "step": step, "outcome": outcome }));
        } else {
            println!("{}", describe(step, outcome));
        }
    })?;

    if json {
        print_json(&serde_json::json!({ "steps": steps, "summary": summary }))?;
    } else {
        println!(
            "\n{} executed, {} skipped",
            summary.executed, summary.skipped
        );
    }
    if let Some(index) = summary.failed_at {
        bail!("step {} failed", index + 1);
    }
    Ok(())
}

fn describe(step: &PlannedStep, outcome: Option<&CommandOutcome>) -> String {
    let label = step.name.as_deref().unwrap_or(step.action);
    match outcome {
        None => format!("{:>3}. skip  {label} (needs a model)", step.index + 1),
        Some(o) if o.success => format!("{:>3}. ok    {label}", step.index + 1),
        Some(o) => format!(
            "{:>3}. FAIL  {label}: {}",
            step.index + 1,
            o.error.as_deref().unwrap_or("").trim()
        ),
    }
}
