//! In-process gateways for tests and offline runs.
//!
//! [`ScriptedGateway`] hands every call to the test as a [`PendingCall`] and
//! waits until the test answers it, which makes it possible to interleave
//! `stop()` or a second `send()` with an unresolved request.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::gateway::{CompletionGateway, GatewayError, GenerateRequest};

/// A completion call waiting for its scripted answer
pub struct PendingCall {
    pub request: GenerateRequest,
    pub cancel: Arc<AtomicBool>,
    reply: oneshot::Sender<Result<String, GatewayError>>,
}

impl PendingCall {
    pub fn respond(self, result: Result<String, GatewayError>) {
        // The caller may already be gone; nothing to do then
        let _ = self.reply.send(result);
    }

    pub fn succeed(self, text: impl Into<String>) {
        self.respond(Ok(text.into()));
    }

    pub fn fail(self, message: impl Into<String>) {
        self.respond(Err(GatewayError::Service(message.into())));
    }
}

pub struct ScriptedGateway {
    calls: mpsc::UnboundedSender<PendingCall>,
}

impl ScriptedGateway {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { calls: tx }, rx)
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<String, GatewayError> {
        let (reply, response) = oneshot::channel();
        self.calls
            .send(PendingCall {
                request,
                cancel,
                reply,
            })
            .map_err(|_| GatewayError::Service("Scripted gateway is closed".to_string()))?;

        response
            .await
            .map_err(|_| GatewayError::Service("Scripted call was dropped".to_string()))?
    }
}

/// Answers every call with the same result
pub struct StaticGateway {
    result: Result<String, GatewayError>,
}

impl StaticGateway {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            result: Ok(text.into()),
        }
    }

    pub fn failing(error: GatewayError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl CompletionGateway for StaticGateway {
    async fn generate(
        &self,
        _request: GenerateRequest,
        _cancel: Arc<AtomicBool>,
    ) -> Result<String, GatewayError> {
        self.result.clone()
    }
}
