use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::content::PromptContent;
use crate::ids::VersionId;

pub const MAX_NODE_NAME_CHARS: usize = 50;
pub const MAX_MESSAGE_CHARS: usize = 255;

/// One immutable snapshot of prompt content under a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub node_name: String,
    /// Per-node version number, assigned as `max + 1` at creation.
    pub ordinal: u32,
    pub content: PromptContent,
    pub message: Option<String>,
    pub production: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-side aggregate of all versions sharing a node name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node_name: String,
    pub prompt_count: u64,
    pub latest_created_at: DateTime<Utc>,
}

/// Trim and check a node name.
pub fn normalize_node_name(raw: &str) -> Result<String, CoreError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("node name is required".into()));
    }
    if name.chars().count() > MAX_NODE_NAME_CHARS {
        return Err(CoreError::Validation(format!(
            "node name exceeds {MAX_NODE_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Blank messages are dropped; overlong ones are rejected.
pub fn normalize_message(raw: Option<&str>) -> Result<Option<String>, CoreError> {
    match raw {
        Some(text) if !text.trim().is_empty() => {
            if text.chars().count() > MAX_MESSAGE_CHARS {
                return Err(CoreError::Validation(format!(
                    "message exceeds {MAX_MESSAGE_CHARS} characters"
                )));
            }
            Ok(Some(text.to_string()))
        }
        _ => Ok(None),
    }
}
