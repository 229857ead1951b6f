//! Hugging Face Inference API text generation

use super::local::first_text;
use super::{GenerationRequest, LlmError, TextGenerator};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_GEN_MODEL: &str = "google/mt5-small";
const INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct HfRequest<'a> {
    inputs: &'a str,
    parameters: HfParameters,
}

#[derive(Debug, Serialize)]
struct HfParameters {
    temperature: f32,
    max_new_tokens: u32,
}

/// Generator backed by the hosted inference API
pub struct HuggingFaceGenerator {
    client: Client,
    api_key: String,
    url: String,
}

impl HuggingFaceGenerator {
    pub fn new(api_key: impl Into<String>, model: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: format!("{INFERENCE_BASE_URL}/{model}"),
        })
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let prompt = request.prompt();
        let body = HfRequest {
            inputs: &prompt,
            parameters: HfParameters {
                temperature: request.temperature,
                max_new_tokens: request.max_new_tokens,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
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

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::unknown(format!("Invalid inference response: {e}")))?;
        Ok(generated_text(&data))
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

/// The inference API usually answers `[{generated_text}]`; summarisation
/// models answer `summary_text`.
fn generated_text(data: &Value) -> String {
    match data {
        Value::Array(items) => items
            .first()
            .and_then(|item| first_text(item, &["generated_text", "summary_text"]))
            .unwrap_or_default(),
        other => first_text(other, &["generated_text"]).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_text_shapes() {
        assert_eq!(generated_text(&json!([{"generated_text": "नमस्ते"}])), "नमस्ते");
        assert_eq!(generated_text(&json!([{"summary_text": "short"}])), "short");
        assert_eq!(generated_text(&json!({"generated_text": "obj"})), "obj");
        assert_eq!(generated_text(&json!({"error": "loading"})), "");
    }

    #[test]
    fn test_request_body_shape() {
        let body = HfRequest {
            inputs: "p",
            parameters: HfParameters {
                temperature: 0.5,
                max_new_tokens: 200,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["inputs"], "p");
        assert_eq!(value["parameters"]["max_new_tokens"], 200);
    }
}
