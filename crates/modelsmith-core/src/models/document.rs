use serde::{Deserialize, Serialize};

use super::message::{new_id, now_millis};

/// A free-form Markdown document attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Unix timestamp in milliseconds of the last write
    pub last_updated: i64,
}

impl ProjectDocument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            content: content.into(),
            last_updated: now_millis(),
        }
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.last_updated = now_millis();
    }
}

/// Starter body for a freshly created document
pub fn template_content(title: &str) -> String {
    format!("# {title}\n\nStart writing here...")
}
