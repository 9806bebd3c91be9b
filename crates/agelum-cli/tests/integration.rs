#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Env {
    project: TempDir,
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            project: TempDir::new().unwrap(),
            home: TempDir::new().unwrap(),
        }
    }

    fn agelum(&self) -> Command {
        let mut cmd = Command::cargo_bin("agelum").unwrap();
        cmd.current_dir(self.project.path())
            .env("AGELUM_ROOT", self.project.path())
            .env("AGELUM_HOME", self.home.path())
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json` and parse stdout.
    fn json(&self, args: &[&str]) -> Value {
        let out = self
            .agelum()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).unwrap()
    }
}

// ---------------------------------------------------------------------------
// agelum init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let env = Env::new();
    env.agelum()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized Agelum"));

    let root = env.project.path();
    for dir in [
        ".agelum/work/tasks/pending",
        ".agelum/work/epics/backlog",
        ".agelum/doc/ideas/thinking",
        ".agelum/doc/docs",
    ] {
        assert!(root.join(dir).is_dir(), "{dir} missing");
    }
}

#[test]
fn init_is_idempotent() {
    let env = Env::new();
    env.agelum().arg("init").assert().success();
    env.agelum()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

// ---------------------------------------------------------------------------
// agelum task
// ---------------------------------------------------------------------------

#[test]
fn task_create_list_and_move() {
    let env = Env::new();
    let created = env.json(&[
        "task",
        "create",
        "Fix",
        "login",
        "--description",
        "Session cookie expires early",
    ]);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["state"], "pending");
    assert!(id.ends_with("Fix-login"), "{id}");

    let listed = env.json(&["task", "list", "--state", "pending"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    env.agelum()
        .args(["task", "move", &id, "doing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending → doing"));

    let board = env.json(&["task", "board"]);
    let doing = board
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["state"] == "doing")
        .unwrap();
    assert_eq!(doing["items"][0]["id"], id.as_str());
}

#[test]
fn task_search_matches_description() {
    let env = Env::new();
    env.agelum()
        .args(["task", "create", "Header", "--description", "Overlaps the logo"])
        .assert()
        .success();
    env.agelum()
        .args(["task", "create", "Footer"])
        .assert()
        .success();

    let hits = env.json(&["task", "search", "logo"]);
    assert_eq!(hits.as_array().unwrap().len(), 1);
}

#[test]
fn task_move_to_unknown_state_fails() {
    let env = Env::new();
    let created = env.json(&["task", "create", "Anything"]);
    let id = created["id"].as_str().unwrap();
    env.agelum()
        .args(["task", "move", id, "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn task_create_from_file() {
    let env = Env::new();
    let file = env.project.path().join("crash.md");
    std::fs::write(&file, "Steps to reproduce\n").unwrap();

    let created = env.json(&["task", "create-from", "crash.md", "--state", "inbox"]);
    let path = created["path"].as_str().unwrap();
    assert!(path.contains("/inbox/"), "{path}");
    assert!(path.ends_with("crash.md"), "{path}");
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.contains("Steps to reproduce"));
}

#[test]
fn show_unknown_task_fails() {
    let env = Env::new();
    env.agelum()
        .args(["task", "show", "missing"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// agelum epic / idea
// ---------------------------------------------------------------------------

#[test]
fn epic_and_idea_default_states() {
    let env = Env::new();
    let epic = env.json(&["epic", "create", "Checkout", "revamp"]);
    assert_eq!(epic["state"], "backlog");
    assert_eq!(epic["title"], "Checkout revamp");

    let idea = env.json(&["idea", "create", "Dark", "mode"]);
    assert_eq!(idea["state"], "thinking");
}

// ---------------------------------------------------------------------------
// agelum doc
// ---------------------------------------------------------------------------

#[test]
fn doc_write_read_and_delete() {
    let env = Env::new();
    env.agelum().arg("init").assert().success();
    env.agelum()
        .args(["doc", "write", ".agelum/doc/docs/intro.md", "--content", "# Intro\n"])
        .assert()
        .success();

    env.agelum()
        .args(["doc", "read", ".agelum/doc/docs/intro.md"])
        .assert()
        .success()
        .stdout("# Intro\n");

    let docs = env.json(&["doc", "list"]);
    assert!(docs.to_string().contains("intro"));

    env.agelum()
        .args(["doc", "delete", ".agelum/doc/docs/intro.md"])
        .assert()
        .success();
    assert!(!env.project.path().join(".agelum/doc/docs/intro.md").exists());
}

#[test]
fn doc_paths_outside_agelum_are_rejected() {
    let env = Env::new();
    env.agelum()
        .args(["doc", "write", "../escape.md", "--content", "x"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// agelum test
// ---------------------------------------------------------------------------

#[test]
fn test_create_steps_and_finish() {
    let env = Env::new();
    let created = env.json(&["test", "create", "Login", "flow"]);
    assert_eq!(created["id"], "login-flow");
    assert_eq!(created["group"], "FEATURES");

    env.agelum()
        .args([
            "test",
            "add-step",
            "login-flow",
            r#"{"action":"open","url":"http://localhost:3000"}"#,
        ])
        .assert()
        .success();

    let steps = env.json(&["test", "steps", "login-flow"]);
    assert_eq!(steps.as_array().unwrap().len(), 1);
    assert_eq!(steps[0]["action"], "open");

    let listed = env.json(&["test", "list"]);
    assert_eq!(listed[0]["stepsCount"], 1);

    let result = env.json(&[
        "test",
        "finish",
        "login-flow",
        "--execution-id",
        "exec-1",
        "--status",
        "passed",
        "--log",
        "all good",
    ]);
    assert_eq!(result["status"], "passed");

    let runs = env.json(&["test", "executions", "login-flow"]);
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["id"], "exec-1");
}

#[test]
fn test_add_step_rejects_bad_json() {
    let env = Env::new();
    env.agelum().args(["test", "create", "Bad"]).assert().success();
    env.agelum()
        .args(["test", "add-step", "bad", "not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid step JSON"));
}

#[test]
fn test_groups_lists_created_group() {
    let env = Env::new();
    let groups = env.json(&["test", "groups", "--create", "SMOKE"]);
    assert!(groups
        .as_array()
        .unwrap()
        .iter()
        .any(|g| g == "SMOKE"));
}

// ---------------------------------------------------------------------------
// agelum repos / migrate
// ---------------------------------------------------------------------------

#[test]
fn repos_lists_configured_projects() {
    let env = Env::new();
    std::fs::write(
        env.home.path().join("user-settings.json"),
        serde_json::json!({
            "projects": [{ "id": "demo", "name": "demo", "path": env.project.path() }]
        })
        .to_string(),
    )
    .unwrap();

    env.agelum()
        .arg("repos")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"));
}

#[test]
fn repos_without_settings_is_empty() {
    let env = Env::new();
    env.agelum()
        .arg("repos")
        .assert()
        .success()
        .stdout(predicate::str::contains("No repositories configured"));
}

#[test]
fn repos_add_and_remove() {
    let env = Env::new();
    let app = env.project.path().join("app");
    std::fs::create_dir(&app).unwrap();

    let added = env.json(&["repos", "add", "app", "--name", "shop"]);
    assert_eq!(added["id"], "shop");
    assert_eq!(added["type"], "project");

    env.agelum()
        .args(["repos", "add", "app", "--name", "shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already configured"));

    let listed = env.json(&["repos", "list"]);
    assert_eq!(listed[0]["name"], "shop");

    env.agelum()
        .args(["repos", "remove", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed shop"));
    env.agelum()
        .arg("repos")
        .assert()
        .success()
        .stdout(predicate::str::contains("No repositories configured"));
}

#[test]
fn repos_add_folder_lists_children() {
    let env = Env::new();
    std::fs::create_dir_all(env.project.path().join("work/api")).unwrap();
    std::fs::create_dir_all(env.project.path().join("work/web")).unwrap();

    env.agelum()
        .args(["repos", "add", "work", "--folder"])
        .assert()
        .success();
    let listed = env.json(&["repos"]);
    let names: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["api", "web"]);
}

#[test]
fn serve_binds_loopback_by_default() {
    let env = Env::new();
    env.agelum()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: 127.0.0.1]"));
}

#[test]
fn migrate_dry_run_leaves_files_in_place() {
    let env = Env::new();
    let legacy = env.project.path().join("agelum/tasks/pending");
    std::fs::create_dir_all(&legacy).unwrap();
    std::fs::write(legacy.join("old.md"), "# old\n").unwrap();

    let report = env.json(&["migrate", "--dry-run"]);
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["moved"].as_array().unwrap().len(), 1);
    assert!(legacy.join("old.md").exists());

    env.agelum()
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 1 file(s)"));
    assert!(!legacy.join("old.md").exists());
}
