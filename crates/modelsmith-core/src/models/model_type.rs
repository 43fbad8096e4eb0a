use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two completion modes offered to the user.
///
/// Both run against the same provider; they differ in the underlying model
/// and in the thinking budget passed along with the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelType {
    #[default]
    #[serde(rename = "gemini-3-pro-preview")]
    Expert,
    #[serde(rename = "gemini-2.5-flash")]
    Fast,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::Expert, ModelType::Fast];

    /// Provider model identifier sent on the wire
    pub fn identifier(&self) -> &'static str {
        match self {
            ModelType::Expert => "gemini-3-pro-preview",
            ModelType::Fast => "gemini-2.5-flash",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelType::Expert => "Expert Analysis (Gemini 3.0 Pro)",
            ModelType::Fast => "Fast Response (Gemini 2.5 Flash)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ModelType::Expert => {
                "Deep reasoning with the newest Gemini 3.0 Pro model for complex architecture tasks."
            }
            ModelType::Fast => "Quick clarifications using Gemini 2.5 Flash.",
        }
    }

    /// Thinking budget in tokens; zero disables thinking entirely
    pub fn thinking_budget(&self) -> u32 {
        match self {
            ModelType::Expert => 32768,
            ModelType::Fast => 0,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown model type: {0}")]
pub struct UnknownModelType(pub String);

impl FromStr for ModelType {
    type Err = UnknownModelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expert" | "pro" | "gemini-3-pro-preview" => Ok(ModelType::Expert),
            "fast" | "flash" | "gemini-2.5-flash" => Ok(ModelType::Fast),
            other => Err(UnknownModelType(other.to_string())),
        }
    }
}
