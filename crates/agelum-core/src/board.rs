use crate::error::Result;
use crate::item::WorkItem;
use crate::store;
use crate::types::{ItemKind, ItemState};
use serde::Serialize;
use std::path::Path;

/// One Kanban column.
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub state: ItemState,
    pub items: Vec<WorkItem>,
}

/// The board for `kind`: one column per state, in display order, each column
/// sorted oldest first. Moving a card between columns is [`store::move_item`].
pub fn board(root: &Path, kind: ItemKind) -> Result<Vec<Column>> {
    let items = store::list(root, kind)?;
    Ok(group(kind, items))
}

pub fn group(kind: ItemKind, items: Vec<WorkItem>) -> Vec<Column> {
    let mut columns: Vec<Column> = kind
        .states()
        .iter()
        .map(|s| Column {
            state: *s,
            items: Vec::new(),
        })
        .collect();
    for item in items {
        if let Some(col) = columns.iter_mut().find(|c| c.state == item.state) {
            col.items.push(item);
        }
    }
    for col in &mut columns {
        col.items
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
    columns
}

/// Plain-text rendering used by the CLI.
pub fn render_text(columns: &[Column]) -> String {
    let mut out = String::new();
    for col in columns {
        out.push_str(&format!("{} ({})\n", col.state.as_str().to_uppercase(), col.items.len()));
        for item in &col.items {
            match &item.epic {
                Some(epic) => out.push_str(&format!("  - {} [{epic}]\n", item.title)),
                None => out.push_str(&format!("  - {}\n", item.title)),
            }
        }
    }
    out
}
