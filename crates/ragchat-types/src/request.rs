use serde::{Deserialize, Serialize};

use crate::events::Source;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_MAX_HISTORY_TURNS: u32 = 10;

/// Body of `POST /conversations/{id}/chat[/stream]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatQuery {
    pub query: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 0 disables conversation memory on the server
    pub max_history_turns: u32,
}

impl ChatQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn max_history_turns(mut self, turns: u32) -> Self {
        self.max_history_turns = turns;
        self
    }

    /// Answer without prior turns as context
    pub fn without_memory(self) -> Self {
        self.max_history_turns(0)
    }
}

/// Non-streaming chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Response of the knowledge base upload endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
