use crate::frontmatter;
use crate::naming::file_id;
use crate::types::{ItemKind, ItemState, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A task, epic or idea backed by one markdown file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub description: String,
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Fields accepted when creating an item. Task-only fields are ignored for
/// epics and ideas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl NewItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Build a [`WorkItem`] from file content. `folder_epic` is the epic
/// subdirectory a task was found in, if any.
pub fn parse_content(
    kind: ItemKind,
    path: &Path,
    content: &str,
    state: ItemState,
    folder_epic: Option<&str>,
    created_at: DateTime<Utc>,
) -> WorkItem {
    let id = file_id(path);
    let fields = frontmatter::fields(content);

    let title = match kind {
        ItemKind::Task => id.clone(),
        ItemKind::Epic | ItemKind::Idea => {
            non_empty(fields.get("title")).unwrap_or_else(|| id.clone())
        }
    };
    let description = non_empty(fields.get("description"))
        .unwrap_or_else(|| frontmatter::body_text(content));

    let mut item = WorkItem {
        id,
        kind,
        title,
        description,
        state,
        created_at,
        path: path.to_path_buf(),
        epic: None,
        assignee: None,
        reporter: None,
        priority: None,
        source_url: None,
    };

    if kind == ItemKind::Task {
        item.assignee = non_empty(fields.get("assignee"));
        item.reporter = non_empty(fields.get("reporter"));
        item.source_url = non_empty(fields.get("source"));
        item.priority = fields.get("priority").and_then(|p| p.parse().ok());
        item.epic = non_empty(fields.get("epic")).or_else(|| folder_epic.map(str::to_string));
    }
    item
}

/// Read and parse an item file. Unreadable files yield `None`.
pub fn parse_file(
    kind: ItemKind,
    path: &Path,
    state: ItemState,
    folder_epic: Option<&str>,
) -> Option<WorkItem> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "skipping unreadable item");
            return None;
        }
    };
    let created_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    Some(parse_content(kind, path, &content, state, folder_epic, created_at))
}

impl WorkItem {
    /// Case-insensitive match against id, title and description.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.id.to_lowercase().contains(&q)
            || self.title.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
