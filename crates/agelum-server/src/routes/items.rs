use agelum_core::item::NewItem;
use agelum_core::store;
use agelum_core::types::ItemKind;
use agelum_core::AgelumError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::RepoQuery;
use crate::error::AppError;
use crate::state::{AppState, Topic};

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

async fn list_kind(
    app: AppState,
    repo: Option<String>,
    kind: ItemKind,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(repo.as_deref())?;
    let result = tokio::task::spawn_blocking(move || {
        let items = store::list(&root, kind)?;
        let key = format!("{}s", kind.as_str());
        Ok::<_, AgelumError>(serde_json::json!({ key: items }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/tasks: `{tasks: [...]}`.
pub async fn list_tasks(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    list_kind(app, q.repo, ItemKind::Task).await
}

/// GET /api/epics: `{epics: [...]}`.
pub async fn list_epics(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    list_kind(app, q.repo, ItemKind::Epic).await
}

/// GET /api/ideas: `{ideas: [...]}`.
pub async fn list_ideas(
    State(app): State<AppState>,
    Query(q): Query<RepoQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    list_kind(app, q.repo, ItemKind::Idea).await
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Body of `POST /api/{tasks,epics,ideas}`. Which fields matter depends on
/// `action`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemActionBody {
    #[serde(default)]
    pub repo: Option<String>,
    pub action: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default, alias = "epicId", alias = "ideaId")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub from_state: Option<String>,
    #[serde(default)]
    pub to_state: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub new_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentData {
    #[serde(default)]
    content: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

enum ItemOp {
    Create(NewItem),
    FromContent(ContentData),
    Move { id: String, from: String, to: String },
    Rename { path: String, new_title: String },
}

fn required(value: Option<String>, what: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{what} is required")))
}

fn parse_op(kind: ItemKind, body: ItemActionBody) -> Result<ItemOp, AppError> {
    let data = body.data.unwrap_or(serde_json::Value::Null);
    match body.action.as_str() {
        "create" => {
            let new: NewItem = serde_json::from_value(data)
                .map_err(|e| AppError::bad_request(format!("invalid data: {e}")))?;
            Ok(ItemOp::Create(new))
        }
        "createFromContent" if kind == ItemKind::Task => {
            let data: ContentData = serde_json::from_value(data)
                .map_err(|e| AppError::bad_request(format!("invalid data: {e}")))?;
            if data.content.trim().is_empty() {
                return Err(AppError::bad_request("content is required"));
            }
            Ok(ItemOp::FromContent(data))
        }
        "move" => Ok(ItemOp::Move {
            id: required(body.task_id.or(body.id), "id")?,
            from: required(body.from_state, "fromState")?,
            to: required(body.to_state, "toState")?,
        }),
        "rename" if kind != ItemKind::Idea => Ok(ItemOp::Rename {
            path: required(body.path, "path")?,
            new_title: required(body.new_title, "newTitle")?,
        }),
        other => Err(AppError::bad_request(format!(
            "Unknown action '{other}' for {kind}s"
        ))),
    }
}

async fn item_action(
    app: AppState,
    kind: ItemKind,
    body: ItemActionBody,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.repo_root(body.repo.as_deref())?;
    let branch_per_task = kind == ItemKind::Task && app.load_settings()?.create_branch_per_task;
    let op = parse_op(kind, body)?;

    let result = tokio::task::spawn_blocking(move || {
        let value = match op {
            ItemOp::Create(new) => {
                let item = store::create(&root, kind, new)?;
                if branch_per_task {
                    store::create_task_branch(&root, &item.id);
                }
                serde_json::to_value(&item)?
            }
            ItemOp::FromContent(data) => {
                let created = store::create_from_content(
                    &root,
                    data.state.as_deref(),
                    data.file_name.as_deref(),
                    &data.content,
                )?;
                if branch_per_task {
                    store::create_task_branch(&root, &created.id);
                }
                serde_json::to_value(&created)?
            }
            ItemOp::Move { id, from, to } => {
                let path = store::move_item(&root, kind, &id, &from, &to)?;
                serde_json::json!({
                    "id": id,
                    "from_state": from,
                    "to_state": to,
                    "path": path,
                })
            }
            ItemOp::Rename { path, new_title } => {
                serde_json::to_value(store::rename(&root, kind, &path, &new_title)?)?
            }
        };
        Ok::<_, AgelumError>(value)
    })
    .await
    .map_err(AppError::join)??;

    app.notify(Topic::Items);
    Ok(Json(result))
}

/// POST /api/tasks: create, createFromContent, move or rename a task.
pub async fn task_action(
    State(app): State<AppState>,
    Json(body): Json<ItemActionBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    item_action(app, ItemKind::Task, body).await
}

/// POST /api/epics: create, move or rename an epic.
pub async fn epic_action(
    State(app): State<AppState>,
    Json(body): Json<ItemActionBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    item_action(app, ItemKind::Epic, body).await
}

/// POST /api/ideas: create or move an idea.
pub async fn idea_action(
    State(app): State<AppState>,
    Json(body): Json<ItemActionBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    item_action(app, ItemKind::Idea, body).await
}
