#[cfg(test)]
#[path = "openrouter_test.rs"]
mod tests;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatReply;
use crate::domain::models::ChatRequest;
use crate::domain::models::Gateway;
use crate::domain::models::PipelineError;

// Attribution headers OpenRouter uses for ranking and abuse contact.
const REFERER: &str = "https://github.com/easel-tools/easel";
const TITLE: &str = "Easel";

pub struct OpenRouter {
    url: String,
    api_key: String,
}

impl Default for OpenRouter {
    fn default() -> OpenRouter {
        return OpenRouter {
            url: Config::get(ConfigKey::GatewayUrl),
            api_key: Config::get(ConfigKey::ApiKey),
        };
    }
}

#[async_trait]
impl Gateway for OpenRouter {
    async fn health_check(&self) -> Result<(), PipelineError> {
        if self.api_key.is_empty() {
            return Err(PipelineError::MissingCredential);
        }

        // OpenRouter's index route is not a health endpoint, and a
        // completions probe would bill tokens. Credential presence is the
        // only startup check.
        return Ok(());
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, PipelineError> {
        if self.api_key.is_empty() {
            return Err(PipelineError::MissingCredential);
        }
        if request.messages.is_empty() {
            return Err(PipelineError::MissingInput("messages"));
        }

        tracing::debug!(
            model = request.model,
            temperature = request.temperature,
            messages = request.messages.len(),
            "gateway request"
        );

        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let res = reqwest::Client::new()
            .post(format!("{url}/v1/chat/completions", url = self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&body)
            .send()
            .await
            .map_err(PipelineError::transport)?;

        let status = res.status().as_u16();
        let text = res.text().await.map_err(PipelineError::transport)?;

        if status >= 400 {
            tracing::error!(status = status, "gateway request failed");
            return Err(PipelineError::Upstream { status, body: text });
        }

        let raw = serde_json::from_str::<Value>(&text).map_err(|err| {
            tracing::error!(error = %err, "gateway reply was not JSON");
            return PipelineError::MalformedReply {
                details: clip(&text, 500),
            };
        })?;

        return Ok(ChatReply::new(raw));
    }
}

impl OpenRouter {
    #[cfg(test)]
    pub fn with_url(url: String) -> OpenRouter {
        return OpenRouter {
            url,
            api_key: "abc".to_string(),
        };
    }
}

/// Truncates diagnostics payloads so error bodies stay readable.
pub fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    return text.chars().take(max_chars).collect();
}
