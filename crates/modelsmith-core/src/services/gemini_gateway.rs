use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use rig::OneOrMany;
use rig::client::CompletionClient;
use rig::completion::Message as RigMessage;
use rig::completion::message::{AssistantContent, DocumentMediaType, ImageDetail, ImageMediaType, Text};
use rig::message::UserContent;
use rig::streaming::StreamingPrompt;
use tracing::{debug, error, warn};

use super::gateway::{CompletionGateway, GatewayError, GenerateRequest, HistoryEntry, MISSING_API_KEY};
use crate::models::{Attachment, Sender};
use crate::prompts;

/// Completion gateway backed by Google Gemini through rig.
///
/// A fresh agent is built per call: the provider is stateless and the
/// thinking budget depends on the requested model.
pub struct GeminiGateway {
    api_key: Option<String>,
    preamble: String,
}

impl GeminiGateway {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            preamble: prompts::SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GatewayError::Configuration(MISSING_API_KEY.to_string()))
    }
}

#[async_trait]
impl CompletionGateway for GeminiGateway {
    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<String, GatewayError> {
        let key = self.api_key()?;

        let client = rig::providers::gemini::Client::new(key).map_err(|e| {
            error!(error = %e, "Failed to create Gemini client");
            GatewayError::Configuration(e.to_string())
        })?;

        let budget = request.model.thinking_budget();
        let mut builder = client
            .agent(request.model.identifier())
            .preamble(&self.preamble);
        if budget > 0 {
            builder = builder.additional_params(serde_json::json!({
                "generationConfig": {
                    "thinkingConfig": { "thinkingBudget": budget }
                }
            }));
        }
        let agent = builder.build();

        let history = to_rig_history(prior_turns(&request));
        let prompt = user_message(&request.prompt, &request.attachments)?;

        debug!(
            model = %request.model,
            history_len = history.len(),
            attachment_count = request.attachments.len(),
            "Sending completion request"
        );

        let mut stream = agent.stream_prompt(prompt).with_history(history).await;

        let mut response = String::new();
        while let Some(item) = stream.next().await {
            if cancel.load(Ordering::Relaxed) {
                debug!("Completion cancelled by caller");
                return Err(GatewayError::Cancelled);
            }
            match item {
                Ok(rig::agent::MultiTurnStreamItem::StreamAssistantItem(
                    rig::streaming::StreamedAssistantContent::Text(text),
                )) => {
                    response.push_str(&text.text);
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Gemini API error");
                    return Err(GatewayError::Service(e.to_string()));
                }
            }
        }

        if response.trim().is_empty() {
            warn!("Gemini returned no text");
            return Ok(prompts::EMPTY_RESPONSE_FALLBACK.to_string());
        }
        Ok(response)
    }
}

/// History without the trailing user turn that repeats the prompt.
///
/// The session sends the just-appended user message as part of the history;
/// the provider receives it once, as the prompt.
fn prior_turns(request: &GenerateRequest) -> &[HistoryEntry] {
    match request.history.split_last() {
        Some((last, rest)) if last.sender == Sender::User && last.content == request.prompt => rest,
        _ => &request.history,
    }
}

fn to_rig_history(entries: &[HistoryEntry]) -> Vec<RigMessage> {
    entries
        .iter()
        .filter_map(|entry| match entry.sender {
            Sender::User => user_message(&entry.content, &entry.attachments).ok(),
            Sender::Ai => Some(RigMessage::Assistant {
                id: None,
                content: OneOrMany::one(AssistantContent::Text(Text {
                    text: entry.content.clone(),
                })),
            }),
        })
        .collect()
}

/// Attachments first, then the text, mirroring how the user composed the turn
fn user_message(text: &str, attachments: &[Attachment]) -> Result<RigMessage, GatewayError> {
    let mut contents: Vec<UserContent> = attachments
        .iter()
        .filter_map(attachment_to_user_content)
        .collect();
    contents.push(UserContent::text(text));

    let content = OneOrMany::many(contents)
        .map_err(|e| GatewayError::Service(format!("Failed to build message: {e}")))?;
    Ok(RigMessage::User { content })
}

fn attachment_to_user_content(attachment: &Attachment) -> Option<UserContent> {
    if attachment.is_text() {
        let bytes = attachment.decode_data().ok()?;
        let body = String::from_utf8_lossy(&bytes);
        return Some(UserContent::text(format!(
            "[Attachment: {}]\n{}",
            attachment.name, body
        )));
    }

    if attachment.is_pdf() {
        return Some(UserContent::document(
            attachment.data.clone(),
            Some(DocumentMediaType::PDF),
        ));
    }

    let media_type = match attachment.mime_type.as_str() {
        "image/png" => ImageMediaType::PNG,
        "image/jpeg" => ImageMediaType::JPEG,
        "image/gif" => ImageMediaType::GIF,
        "image/webp" => ImageMediaType::WEBP,
        "image/svg+xml" => ImageMediaType::SVG,
        other => {
            warn!(name = %attachment.name, mime_type = other, "Unsupported attachment type, skipping");
            return None;
        }
    };

    Some(UserContent::image_base64(
        attachment.data.clone(),
        Some(media_type),
        Some(ImageDetail::Auto),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelType;

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let gateway = GeminiGateway::new(None);
        let request = GenerateRequest::from_messages("hi", ModelType::Fast, &[], Vec::new());

        let result = gateway
            .generate(request, Arc::new(AtomicBool::new(false)))
            .await;

        assert_eq!(
            result,
            Err(GatewayError::Configuration(MISSING_API_KEY.to_string()))
        );
    }

    #[tokio::test]
    async fn test_blank_key_is_configuration_error() {
        let gateway = GeminiGateway::new(Some("  ".to_string()));
        let request = GenerateRequest::from_messages("hi", ModelType::Expert, &[], Vec::new());

        let result = gateway
            .generate(request, Arc::new(AtomicBool::new(false)))
            .await;
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[test]
    fn test_prior_turns_drops_repeated_prompt() {
        let messages = vec![
            crate::models::Message::ai("welcome", None),
            crate::models::Message::user("design a blog schema", Vec::new()),
        ];
        let request = GenerateRequest::from_messages(
            "design a blog schema",
            ModelType::Fast,
            &messages,
            Vec::new(),
        );

        let prior = prior_turns(&request);
        assert_eq!(prior.len(), 1);
        assert_eq!(prior[0].sender, Sender::Ai);
    }

    #[test]
    fn test_unsupported_binary_attachment_is_skipped() {
        let att = Attachment::from_bytes("blob.bin", "application/octet-stream", &[0, 1]);
        assert!(attachment_to_user_content(&att).is_none());

        let sql = Attachment::from_bytes("schema.sql", "application/sql", b"select 1;");
        assert!(attachment_to_user_content(&sql).is_some());
    }
}
