use crate::error::AgelumError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Task,
    Epic,
    Idea,
}

impl ItemKind {
    pub fn all() -> &'static [ItemKind] {
        &[ItemKind::Task, ItemKind::Epic, ItemKind::Idea]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Task => "task",
            ItemKind::Epic => "epic",
            ItemKind::Idea => "idea",
        }
    }

    /// Board columns, in display order.
    pub fn states(self) -> &'static [ItemState] {
        match self {
            ItemKind::Task => &[
                ItemState::Backlog,
                ItemState::Fixes,
                ItemState::Pending,
                ItemState::Doing,
                ItemState::Done,
                ItemState::Inbox,
            ],
            ItemKind::Epic => &[
                ItemState::Backlog,
                ItemState::Fixes,
                ItemState::Pending,
                ItemState::Doing,
                ItemState::Done,
            ],
            ItemKind::Idea => &[
                ItemState::Thinking,
                ItemState::Important,
                ItemState::Priority,
                ItemState::Planned,
                ItemState::Done,
            ],
        }
    }

    pub fn default_state(self) -> ItemState {
        match self {
            ItemKind::Task => ItemState::Pending,
            ItemKind::Epic => ItemState::Backlog,
            ItemKind::Idea => ItemState::Thinking,
        }
    }

    /// Directory names scanned when reading, paired with the state they map to.
    /// Tasks and epics still read the legacy `priority` folder as `fixes`.
    pub fn read_dirs(self) -> Vec<(&'static str, ItemState)> {
        let mut dirs: Vec<(&'static str, ItemState)> =
            self.states().iter().map(|s| (s.as_str(), *s)).collect();
        if matches!(self, ItemKind::Task | ItemKind::Epic) {
            dirs.push(("priority", ItemState::Fixes));
        }
        dirs
    }

    /// Parse a state name for this kind, applying the `priority` → `fixes` redirect.
    pub fn parse_state(self, s: &str) -> Result<ItemState, AgelumError> {
        let lower = s.trim().to_lowercase();
        let state = match lower.as_str() {
            "priority" if self != ItemKind::Idea => ItemState::Fixes,
            other => other.parse::<ItemState>().map_err(|_| AgelumError::InvalidState {
                kind: self.to_string(),
                state: s.to_string(),
            })?,
        };
        if !self.states().contains(&state) {
            return Err(AgelumError::InvalidState {
                kind: self.to_string(),
                state: s.to_string(),
            });
        }
        Ok(state)
    }

    /// Prefix used for generated ids of epics and ideas.
    pub fn id_prefix(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemKind {
    type Err = AgelumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_end_matches('s') {
            "task" => Ok(ItemKind::Task),
            "epic" => Ok(ItemKind::Epic),
            "idea" => Ok(ItemKind::Idea),
            _ => Err(AgelumError::InvalidKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ItemState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Backlog,
    Fixes,
    Pending,
    Doing,
    Done,
    Inbox,
    Thinking,
    Important,
    Priority,
    Planned,
}

impl ItemState {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemState::Backlog => "backlog",
            ItemState::Fixes => "fixes",
            ItemState::Pending => "pending",
            ItemState::Doing => "doing",
            ItemState::Done => "done",
            ItemState::Inbox => "inbox",
            ItemState::Thinking => "thinking",
            ItemState::Important => "important",
            ItemState::Priority => "priority",
            ItemState::Planned => "planned",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(ItemState::Backlog),
            "fixes" => Ok(ItemState::Fixes),
            "pending" => Ok(ItemState::Pending),
            "doing" => Ok(ItemState::Doing),
            "done" => Ok(ItemState::Done),
            "inbox" => Ok(ItemState::Inbox),
            "thinking" => Ok(ItemState::Thinking),
            "important" => Ok(ItemState::Important),
            "priority" => Ok(ItemState::Priority),
            "planned" => Ok(ItemState::Planned),
            _ => Err(format!("unknown state: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("unknown priority: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
