use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::message::new_id;
use super::model_type::ModelType;

/// Handle for one outgoing completion request.
///
/// The cancel flag is shared with the gateway call so that a transport able
/// to abort early can do so; the coordinator never relies on it.
#[derive(Clone, Debug)]
pub struct RequestTicket {
    pub request_id: String,
    pub project_id: String,
    /// Id of the placeholder message this request will settle
    pub placeholder_id: String,
    pub model: ModelType,
    cancel_flag: Arc<AtomicBool>,
}

impl RequestTicket {
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

/// Lifecycle of the session's single tracked request
#[derive(Clone, Debug, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Pending(RequestTicket),
}

/// Tracks at most one outstanding completion request per session.
///
/// Responses are applied only while their ticket is still the tracked one;
/// anything else is a stale response and must be dropped by the caller.
#[derive(Debug, Default)]
pub struct RequestCoordinator {
    state: RequestState,
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new request. A request that is still pending is
    /// superseded: its cancel flag is raised and its response will be stale.
    pub fn begin(
        &mut self,
        project_id: &str,
        placeholder_id: &str,
        model: ModelType,
    ) -> RequestTicket {
        if let RequestState::Pending(previous) = &self.state {
            previous.cancel();
            debug!(request_id = %previous.request_id, "Superseded pending request");
        }

        let ticket = RequestTicket {
            request_id: new_id(),
            project_id: project_id.to_string(),
            placeholder_id: placeholder_id.to_string(),
            model,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        };
        self.state = RequestState::Pending(ticket.clone());
        ticket
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        matches!(&self.state, RequestState::Pending(current) if current.request_id == ticket.request_id)
    }

    /// Settle a request. Returns true and goes idle only if `ticket` is still
    /// the tracked request; returns false for a stale ticket without touching state.
    pub fn finish(&mut self, ticket: &RequestTicket) -> bool {
        if !self.is_current(ticket) {
            debug!(request_id = %ticket.request_id, "Discarding stale response");
            return false;
        }
        self.state = RequestState::Idle;
        true
    }

    /// Stop tracking the pending request, if any, and return it
    pub fn stop(&mut self) -> Option<RequestTicket> {
        match std::mem::take(&mut self.state) {
            RequestState::Pending(ticket) => {
                ticket.cancel();
                debug!(request_id = %ticket.request_id, "Request stopped");
                Some(ticket)
            }
            RequestState::Idle => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, RequestState::Pending(_))
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }
}
