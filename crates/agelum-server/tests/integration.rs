use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

use agelum_core::settings::SettingsStore;
use agelum_server::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A settings home plus one registered project called `demo`.
struct Fixture {
    home: TempDir,
    project: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self::with_settings(json!({}))
    }

    /// Extra top-level settings keys are merged into `user-settings.json`.
    fn with_settings(extra: serde_json::Value) -> Self {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let mut settings = json!({
            "projects": [{ "id": "demo", "name": "demo", "path": project.path() }],
            "googleApiKey": "test-key",
        });
        if let (Some(base), Some(more)) = (settings.as_object_mut(), extra.as_object()) {
            for (k, v) in more {
                base.insert(k.clone(), v.clone());
            }
        }
        std::fs::write(
            home.path().join("user-settings.json"),
            serde_json::to_vec_pretty(&settings).unwrap(),
        )
        .unwrap();
        Self { home, project }
    }

    fn state(&self) -> AppState {
        AppState::new(SettingsStore::new(self.home.path()), None)
    }

    fn app(&self) -> axum::Router {
        agelum_server::router(self.state())
    }

    fn root(&self) -> &Path {
        self.project.path()
    }
}

async fn send(app: axum::Router, req: axum::http::Request<axum::body::Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    send(app, req).await
}

/// Send a request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn with_json(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, req).await
}

async fn post_json(app: axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    with_json(app, "POST", uri, body).await
}

async fn delete(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    send(app, req).await
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lists_configured_repositories() {
    let fx = Fixture::new();
    let (status, body) = get(fx.app(), "/api/repositories").await;
    assert_eq!(status, StatusCode::OK);
    let repos = body["repositories"].as_array().unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0]["name"], "demo");
}

#[tokio::test]
async fn unknown_repository_is_not_found() {
    let fx = Fixture::new();
    let (status, body) = get(fx.app(), "/api/tasks?repo=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn missing_repository_without_default_is_bad_request() {
    let fx = Fixture::new();
    let (status, body) = get(fx.app(), "/api/tasks").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Repository is required");
}

#[tokio::test]
async fn default_root_serves_requests_without_repo() {
    let fx = Fixture::new();
    let state = AppState::new(
        SettingsStore::new(fx.home.path()),
        Some(fx.root().to_path_buf()),
    );
    let (status, body) = get(agelum_server::router(state), "/api/ideas").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ideas"], json!([]));
}

#[tokio::test]
async fn repositories_can_be_added_and_removed() {
    let fx = Fixture::new();
    let other = TempDir::new().unwrap();

    let (status, body) = post_json(
        fx.app(),
        "/api/repositories",
        json!({ "path": other.path(), "name": "shop" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["repository"]["id"], "shop");

    let (status, _) = post_json(
        fx.app(),
        "/api/repositories",
        json!({ "path": other.path(), "name": "shop" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = get(fx.app(), "/api/repositories").await;
    assert_eq!(body["repositories"].as_array().unwrap().len(), 2);

    let (status, body) = delete(fx.app(), "/api/repositories?repo=shop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], "shop");
    let (status, _) = delete(fx.app(), "/api/repositories?repo=shop").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settings_read_patch_and_reset() {
    let fx = Fixture::with_settings(json!({ "theme": "dark" }));

    let (status, body) = get(fx.app(), "/api/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["projects"][0]["name"], "demo");
    assert_eq!(body["settings"]["theme"], "dark");

    let (status, body) = with_json(
        fx.app(),
        "PATCH",
        "/api/settings",
        json!({ "settings": { "createBranchPerTask": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["createBranchPerTask"], true);
    assert_eq!(body["settings"]["googleApiKey"], "test-key");
    assert_eq!(body["settings"]["projects"][0]["name"], "demo");

    let (status, _) = with_json(fx.app(), "PATCH", "/api/settings", json!({ "projects": 3 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = delete(fx.app(), "/api/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["projects"].as_array().unwrap().len(), 0);
    let (status, _) = get(fx.app(), "/api/tasks?repo=demo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_config_reads_detected_url_and_saves() {
    let fx = Fixture::new();
    std::fs::write(
        fx.root().join("package.json"),
        r#"{"scripts": {"dev": "next dev -p 4100"}}"#,
    )
    .unwrap();

    let (status, body) = get(fx.app(), "/api/project/config?repo=demo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["url"], "http://localhost:4100/");

    let (status, _) = post_json(
        fx.app(),
        "/api/project/config",
        json!({ "repo": "demo", "config": { "commands": { "dev": "npm start" }, "autoRun": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(fx.app(), "/api/project/config?repo=demo").await;
    assert_eq!(body["config"]["commands"]["dev"], "npm start");
    assert_eq!(body["config"]["autoRun"], true);
}

#[tokio::test]
async fn settings_replace_overwrites_document() {
    let fx = Fixture::new();
    let (status, body) = post_json(
        fx.app(),
        "/api/settings",
        json!({ "projects": [], "activeWorkflow": "kanban" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["activeWorkflow"], "kanban");

    let raw = std::fs::read_to_string(fx.home.path().join("user-settings.json")).unwrap();
    assert!(!raw.contains("demo"));
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_create_move_and_board() {
    let fx = Fixture::new();

    let (status, created) = post_json(
        fx.app(),
        "/api/tasks",
        json!({
            "repo": "demo",
            "action": "create",
            "data": { "title": "Fix login", "state": "pending" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["state"], "pending");

    let (status, moved) = post_json(
        fx.app(),
        "/api/tasks",
        json!({
            "repo": "demo",
            "action": "move",
            "taskId": id,
            "fromState": "pending",
            "toState": "doing"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{moved}");
    assert!(moved["path"].as_str().unwrap().contains("/doing/"));

    let (status, board) = get(fx.app(), "/api/board?repo=demo&kind=task").await;
    assert_eq!(status, StatusCode::OK);
    let doing = board["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["state"] == "doing")
        .unwrap();
    assert_eq!(doing["items"][0]["id"], id.as_str());
}

#[tokio::test]
async fn create_from_content_lands_in_requested_state() {
    let fx = Fixture::new();
    let (status, created) = post_json(
        fx.app(),
        "/api/tasks",
        json!({
            "repo": "demo",
            "action": "createFromContent",
            "data": { "content": "Steps to reproduce", "state": "inbox", "fileName": "Crash on save" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let path = created["path"].as_str().unwrap();
    assert!(path.contains("/inbox/"));
    assert!(created["content"].as_str().unwrap().contains("Steps to reproduce"));

    let (_, list) = get(fx.app(), "/api/tasks?repo=demo").await;
    assert_eq!(list["tasks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_action_is_rejected() {
    let fx = Fixture::new();
    let (status, body) = post_json(
        fx.app(),
        "/api/ideas",
        json!({ "repo": "demo", "action": "rename", "path": "x.md", "newTitle": "y" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("rename"));
}

#[tokio::test]
async fn move_with_bad_state_is_bad_request() {
    let fx = Fixture::new();
    let (status, _) = post_json(
        fx.app(),
        "/api/epics",
        json!({ "repo": "demo", "action": "move", "id": "e1", "fromState": "backlog", "toState": "nowhere" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_write_read_delete() {
    let fx = Fixture::new();
    let (status, _) = with_json(
        fx.app(),
        "PUT",
        "/api/file",
        json!({ "repo": "demo", "path": ".agelum/doc/docs/intro.md", "content": "# Intro\n" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(fx.app(), "/api/file?repo=demo&path=.agelum/doc/docs/intro.md").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "# Intro\n");

    let (_, docs) = get(fx.app(), "/api/docs?repo=demo").await;
    assert_eq!(docs["docs"][0]["name"], "intro.md");

    let (status, _) = delete(fx.app(), "/api/file?repo=demo&path=.agelum/doc/docs/intro.md").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(fx.app(), "/api/file?repo=demo&path=.agelum/doc/docs/intro.md").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn file_outside_project_is_rejected() {
    let fx = Fixture::new();
    let (status, _) = get(fx.app(), "/api/file?repo=demo&path=../../etc/passwd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Browser tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_crud_and_steps() {
    let fx = Fixture::new();
    let (status, entry) = post_json(
        fx.app(),
        "/api/tests",
        json!({ "repo": "demo", "name": "Login Flow", "group": "LOGIN" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{entry}");
    assert_eq!(entry["id"], "login-flow");

    let (status, _) = post_json(
        fx.app(),
        "/api/tests/login-flow/steps?repo=demo",
        json!({ "action": "open", "url": "http://localhost:3000" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, steps) = get(fx.app(), "/api/tests/login-flow/steps?repo=demo").await;
    assert_eq!(steps["steps"][0]["action"], "open");

    let (_, test) = get(fx.app(), "/api/tests/login-flow?repo=demo").await;
    assert_eq!(test["name"], "Login Flow");
    assert_eq!(test["group"], "LOGIN");

    let (status, _) = delete(fx.app(), "/api/tests/login-flow?repo=demo").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(fx.app(), "/api/tests/login-flow?repo=demo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn groups_include_defaults() {
    let fx = Fixture::new();
    let (status, body) = get(fx.app(), "/api/tests/groups?repo=demo").await;
    assert_eq!(status, StatusCode::OK);
    let groups = body["groups"].as_array().unwrap();
    assert!(groups.iter().any(|g| g == "REGRESSION"));
}

#[tokio::test]
async fn finish_records_an_execution() {
    let fx = Fixture::new();
    post_json(fx.app(), "/api/tests", json!({ "repo": "demo", "name": "Smoke" })).await;

    let (status, result) = post_json(
        fx.app(),
        "/api/tests/smoke/finish?repo=demo",
        json!({ "executionId": "exec-1", "status": "passed", "logs": ["ok"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{result}");

    let (_, list) = get(fx.app(), "/api/tests/smoke/executions?repo=demo&last=5").await;
    let executions = list["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0]["status"], "passed");
}

#[cfg(unix)]
#[tokio::test]
async fn run_streams_output_with_execution_header() {
    let fx = Fixture::with_settings(json!({ "testRunner": "echo" }));
    post_json(fx.app(), "/api/tests", json!({ "repo": "demo", "name": "Smoke" })).await;

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/tests/smoke/run?repo=demo")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = fx.app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let exec_id = response
        .headers()
        .get("x-execution-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(exec_id.starts_with("exec-"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(first["type"], "exec_start");
    assert!(text.contains("Process exited with code 0"));
    let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["type"], "exec_complete");
    assert_eq!(last["status"], "passed");
}

#[tokio::test]
async fn missing_artifact_is_not_found() {
    let fx = Fixture::new();
    let (status, _) = get(fx.app(), "/api/tests/artifacts/smoke/exec-1/shot.png?repo=demo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recorder_validates_input() {
    let fx = Fixture::new();
    let (status, body) = post_json(
        fx.app(),
        "/api/tests/record/ai",
        json!({ "backend": "google-api", "snapshot": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Prompt required");

    let (_, body) = post_json(
        fx.app(),
        "/api/tests/record/ai",
        json!({ "prompt": "click", "snapshot": "x" }),
    )
    .await;
    assert_eq!(body["error"], "Backend required");

    let (_, body) = post_json(
        fx.app(),
        "/api/tests/record/ai",
        json!({ "prompt": "click", "backend": "google-api", "deterministic": true }),
    )
    .await;
    assert_eq!(body["error"], "Snapshot required");

    let (status, _) = post_json(fx.app(), "/api/tests/record/execute", json!({ "command": " " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recorder_asks_google_api_for_a_command() {
    let fx = Fixture::new();
    let mut server = mockito::Server::new_async().await;
    let answer = json!({
        "type": "command",
        "command": "click",
        "args": ["@e1"],
        "explanation": "Sign in button",
        "stepDescription": "Click sign in"
    })
    .to_string();
    let mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .match_query(mockito::Matcher::UrlEncoded("key".into(), "test-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"candidates":[{"content":{"parts":[{"text": answer}]}}]}).to_string())
        .create_async()
        .await;

    let mut state = fx.state();
    state.google_base_url = Some(server.url());
    let (status, body) = post_json(
        agelum_server::router(state),
        "/api/tests/record/ai",
        json!({
            "repo": "demo",
            "prompt": "sign in",
            "snapshot": "- button \"Sign in\" [ref=e1]",
            "deterministic": true,
            "backend": "google-api"
        }),
    )
    .await;
    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["command"], "click");
    assert_eq!(body["args"], json!(["@e1"]));
    assert_eq!(body["stepDescription"], "Click sign in");
}

#[tokio::test]
async fn google_api_errors_map_to_bad_gateway() {
    let fx = Fixture::new();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", mockito::Matcher::Any)
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let mut state = fx.state();
    state.google_base_url = Some(server.url());
    let (status, body) = post_json(
        agelum_server::router(state),
        "/api/tests/record/ai",
        json!({ "prompt": "x", "snapshot": "y", "deterministic": true, "backend": "google-api" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn unknown_backend_is_bad_request() {
    let fx = Fixture::new();
    let (status, _) = post_json(
        fx.app(),
        "/api/tests/record/ai",
        json!({ "prompt": "x", "snapshot": "y", "deterministic": true, "backend": "gpt" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backends_include_google_when_key_set() {
    let fx = Fixture::new();
    let (status, body) = get(fx.app(), "/api/tests/record/backends").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b["id"] == "google-api"));
}

// ---------------------------------------------------------------------------
// Annotations and reports
// ---------------------------------------------------------------------------

/// 1x1 transparent PNG.
const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[tokio::test]
async fn render_returns_svg_and_prompts() {
    let fx = Fixture::new();
    let (status, body) = post_json(
        fx.app(),
        "/api/annotations/render",
        json!({
            "annotations": [{ "id": 1, "type": "modify", "x": 10, "y": 20, "width": 30, "height": 40, "prompt": "Bigger" }],
            "displayWidth": 100, "displayHeight": 100,
            "naturalWidth": 200, "naturalHeight": 200,
            "imageHref": "shot.png"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["svg"].as_str().unwrap().starts_with("<svg"));
    assert!(body["prompts"].as_str().unwrap().contains("**Modify**"));
}

#[tokio::test]
async fn report_creates_inbox_task_with_images() {
    let fx = Fixture::new();
    let (status, body) = post_json(
        fx.app(),
        "/api/reports",
        json!({
            "repo": "demo",
            "title": "Header overlaps",
            "description": "The header covers the menu",
            "screenshot": PIXEL_PNG,
            "annotations": [{ "id": 1, "type": "remove", "x": 0, "y": 0, "width": 1, "height": 1, "prompt": "" }],
            "sourceUrl": "http://localhost:3000/"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["path"].as_str().unwrap().contains("/inbox/"));
    let shot = body["screenshot"].as_str().unwrap();
    assert!(Path::new(shot).exists());
    assert!(Path::new(body["overlay"].as_str().unwrap()).exists());

    let (_, list) = get(fx.app(), "/api/tasks?repo=demo").await;
    assert_eq!(list["tasks"][0]["state"], "inbox");
}

// ---------------------------------------------------------------------------
// Preview app
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_of_idle_project() {
    let fx = Fixture::new();
    let (status, body) = get(fx.app(), "/api/app-status?repo=demo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_running"], false);
    assert_eq!(body["is_managed"], false);
    assert_eq!(body["command"], "pnpm dev");
}

#[tokio::test]
async fn stop_without_process_is_not_found() {
    let fx = Fixture::new();
    let (status, body) = post_json(
        fx.app(),
        "/api/app-status",
        json!({ "repo": "demo", "action": "stop" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No running process found");
}

#[tokio::test]
async fn logs_of_idle_project_are_empty() {
    let fx = Fixture::new();
    let (status, body) = get(fx.app(), "/api/app-logs?repo=demo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "");
    assert_eq!(body["running"], false);
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn migrate_dry_run_reports_moves() {
    let fx = Fixture::new();
    let legacy = fx.root().join("agelum/tasks/pending");
    std::fs::create_dir_all(&legacy).unwrap();
    std::fs::write(legacy.join("old.md"), "# old\n").unwrap();

    let (status, body) = post_json(
        fx.app(),
        "/api/migrate",
        json!({ "repo": "demo", "dry_run": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["moved"].as_array().unwrap().len(), 1);
    assert!(legacy.join("old.md").exists());
}
