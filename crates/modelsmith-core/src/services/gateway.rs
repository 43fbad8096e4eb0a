use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Attachment, Message, ModelType, Sender};

pub const MISSING_API_KEY: &str = "Gemini API Key is not configured on the server.";

/// Failures surfaced by a completion gateway. `Display` is the text shown to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Service(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("The AI service did not respond within {} seconds", .0.as_secs_f64())]
    Timeout(Duration),
}

/// One prior conversation turn as sent to the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub sender: Sender,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender,
            content: message.content.clone(),
            attachments: message.attachments.clone(),
        }
    }
}

/// Everything a completion call needs. The provider keeps no session state,
/// so the full history travels with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: ModelType,
    pub history: Vec<HistoryEntry>,
    pub attachments: Vec<Attachment>,
}

impl GenerateRequest {
    /// Build a request from a project's messages, leaving out placeholders
    pub fn from_messages(
        prompt: impl Into<String>,
        model: ModelType,
        messages: &[Message],
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            model,
            history: messages
                .iter()
                .filter(|m| !m.is_thinking())
                .map(HistoryEntry::from)
                .collect(),
            attachments,
        }
    }
}

/// Boundary to the generative AI service.
///
/// `cancel` is raised when the caller stops caring about the result.
/// Implementations may use it to abort early; callers never depend on that.
#[async_trait]
pub trait CompletionGateway: Send + Sync + 'static {
    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_messages_filters_placeholders() {
        let messages = vec![
            Message::ai("welcome", Some(ModelType::Expert)),
            Message::user("design a blog schema", Vec::new()),
            Message::placeholder(ModelType::Expert),
        ];

        let request =
            GenerateRequest::from_messages("design a blog schema", ModelType::Fast, &messages, Vec::new());

        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[1].sender, Sender::User);
        assert_eq!(request.history[1].content, "design a blog schema");
    }

    #[test]
    fn test_error_display_is_user_facing() {
        let err = GatewayError::Configuration(MISSING_API_KEY.to_string());
        assert_eq!(err.to_string(), MISSING_API_KEY);
        assert_eq!(
            GatewayError::Timeout(Duration::from_secs(30)).to_string(),
            "The AI service did not respond within 30 seconds"
        );
        assert_eq!(
            GatewayError::Timeout(Duration::from_millis(1500)).to_string(),
            "The AI service did not respond within 1.5 seconds"
        );
    }
}
