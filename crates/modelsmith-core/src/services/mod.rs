pub mod chat_session;
pub mod gateway;
pub mod gemini_gateway;
pub mod scripted_gateway;

pub use chat_session::{ChatSession, SendOutcome, SessionEvent};
pub use gateway::{CompletionGateway, GatewayError, GenerateRequest, HistoryEntry};
pub use gemini_gateway::GeminiGateway;
pub use scripted_gateway::{PendingCall, ScriptedGateway, StaticGateway};
