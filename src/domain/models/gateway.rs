use async_trait::async_trait;
use serde_json::Value;

use super::ConversationMessage;
use super::PipelineError;

/// A single chat-completion request. One request maps to exactly one
/// provider call, there are no retries at this layer.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ConversationMessage>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: &str, messages: Vec<ConversationMessage>) -> ChatRequest {
        return ChatRequest {
            model: model.to_string(),
            messages,
            temperature: 0.7,
            max_tokens: None,
        };
    }

    pub fn with_temperature(mut self, temperature: f64) -> ChatRequest {
        self.temperature = temperature;
        return self;
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> ChatRequest {
        self.max_tokens = Some(max_tokens);
        return self;
    }
}

/// The provider's raw JSON reply. Different models stuff their answers in
/// different places, so the raw value stays reachable for the extraction
/// strategies.
#[derive(Clone, Debug)]
pub struct ChatReply {
    raw: Value,
}

impl ChatReply {
    pub fn new(raw: Value) -> ChatReply {
        return ChatReply { raw };
    }

    pub fn raw(&self) -> &Value {
        return &self.raw;
    }

    /// `choices[0].message`, when present.
    pub fn message(&self) -> Option<&Value> {
        return self.raw.get("choices")?.get(0)?.get("message");
    }

    /// The assistant's text content. A string content is returned as-is; an
    /// array-valued content yields its concatenated text parts.
    pub fn content_text(&self) -> Option<String> {
        let content = self.message()?.get("content")?;

        if let Some(text) = content.as_str() {
            return Some(text.to_string());
        }

        if let Some(parts) = content.as_array() {
            let texts = parts
                .iter()
                .filter_map(|part| {
                    return part.get("text")?.as_str();
                })
                .collect::<Vec<&str>>();

            if !texts.is_empty() {
                return Some(texts.join("\n"));
            }
        }

        return None;
    }
}

#[async_trait]
pub trait Gateway {
    /// Used at startup to verify the gateway is usable at all before any
    /// pipeline step runs.
    async fn health_check(&self) -> Result<(), PipelineError>;

    /// Forwards one chat-completion request and returns the parsed reply.
    /// A non-success status is returned as `PipelineError::Upstream` with
    /// the raw body attached for diagnostics. Single attempt, the caller
    /// decides whether to retry.
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, PipelineError>;
}

pub type GatewayBox = Box<dyn Gateway + Send + Sync>;
