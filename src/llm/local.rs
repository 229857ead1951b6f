//! Local text-generation server (GPT4All / text-generation-webui style)
//!
//! These servers disagree about response shape, so the reply body is read
//! leniently: plain strings, `[{generated_text}]`, `{text}`, `{output: [...]}`.

use super::{GenerationRequest, LlmError, TextGenerator};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct LocalRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    max_new_tokens: u32,
}

/// Generator backed by a self-hosted HTTP endpoint
pub struct LocalGenerator {
    client: Client,
    url: String,
}

impl LocalGenerator {
    pub fn new(url: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TextGenerator for LocalGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let prompt = request.prompt();
        let body = LocalRequest {
            prompt: &prompt,
            temperature: request.temperature,
            max_new_tokens: request.max_new_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status, &text));
        }

        Ok(text_from_body(&text))
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Pull generated text out of whatever the local server sent back.
pub(crate) fn text_from_body(body: &str) -> String {
    let Ok(data) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    match &data {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .first()
            .and_then(|item| first_text(item, &["generated_text", "text"]))
            .unwrap_or_default(),
        Value::Object(map) => {
            if let Some(text) = first_text(&data, &["generated_text", "text"]) {
                return text;
            }
            match map.get("output") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|o| first_text(o, &["generated_text", "text"]).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => data.to_string(),
            }
        }
        other => other.to_string(),
    }
}

/// First non-empty string among `keys` on a JSON object.
pub(crate) fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
