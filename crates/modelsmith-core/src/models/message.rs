use serde::{Deserialize, Serialize};

use super::attachment::Attachment;
use super::model_type::ModelType;

/// Current time as Unix milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Ai,
}

/// Whether a message is a provisional "response pending" entry or a settled turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Placeholder,
    #[default]
    Final,
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<ModelType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: new_id(),
            sender: Sender::User,
            content: content.into(),
            timestamp: now_millis(),
            kind: MessageKind::Final,
            model_used: None,
            attachments,
        }
    }

    pub fn ai(content: impl Into<String>, model: Option<ModelType>) -> Self {
        Self {
            id: new_id(),
            sender: Sender::Ai,
            content: content.into(),
            timestamp: now_millis(),
            kind: MessageKind::Final,
            model_used: model,
            attachments: Vec::new(),
        }
    }

    /// An empty AI turn standing in for a response that has not arrived yet
    pub fn placeholder(model: ModelType) -> Self {
        Self {
            kind: MessageKind::Placeholder,
            ..Self::ai(String::new(), Some(model))
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.kind == MessageKind::Placeholder
    }

    /// Settle a placeholder into a final AI turn, keeping its sender and model.
    /// The settled message gets a fresh id and timestamp.
    pub fn settle(&self, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            content: content.into(),
            timestamp: now_millis(),
            kind: MessageKind::Final,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_thinking_ai_turn() {
        let msg = Message::placeholder(ModelType::Fast);
        assert!(msg.is_thinking());
        assert_eq!(msg.sender, Sender::Ai);
        assert!(msg.content.is_empty());
        assert_eq!(msg.model_used, Some(ModelType::Fast));
    }

    #[test]
    fn test_settle_keeps_model_and_changes_id() {
        let placeholder = Message::placeholder(ModelType::Expert);
        let settled = placeholder.settle("done");

        assert!(!settled.is_thinking());
        assert_ne!(settled.id, placeholder.id);
        assert_eq!(settled.content, "done");
        assert_eq!(settled.model_used, Some(ModelType::Expert));
    }

    #[test]
    fn test_sender_wire_format() {
        let msg = Message::user("hi", Vec::new());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "USER");
        assert!(json.get("attachments").is_none());

        let back: Message = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "sender": "AI",
            "content": "hello",
            "timestamp": 1,
        }))
        .unwrap();
        assert_eq!(back.sender, Sender::Ai);
        assert_eq!(back.kind, MessageKind::Final);
    }
}
