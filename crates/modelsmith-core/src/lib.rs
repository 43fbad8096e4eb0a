//! Domain modeling assistant: projects with chat history, working documents
//! and a live schema diagram that follows the AI's latest answer.

pub mod models;
pub mod prompts;
pub mod repositories;
pub mod services;
pub mod settings;

pub use models::{Message, ModelType, Project, ProjectsStore, WorkspaceSnapshot};
pub use services::{ChatSession, CompletionGateway, GatewayError, GeminiGateway, SendOutcome};
pub use settings::AppSettings;
