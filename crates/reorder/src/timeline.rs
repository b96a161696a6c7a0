use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::UserId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineAction {
    RequestCreated,
    StatusChanged,
    NoteAdded,
}

impl TimelineAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TimelineAction::RequestCreated => "request_created",
            TimelineAction::StatusChanged => "status_changed",
            TimelineAction::NoteAdded => "note_added",
        }
    }
}

/// One audit entry on a reorder request. Entries are never edited or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub action: TimelineAction,
    pub actor: UserId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Free-form discussion note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub actor: UserId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
