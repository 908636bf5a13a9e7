use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use weft_core::config::ModelConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::CompletionBackend;
use weft_core::types::{CompletionRequest, CompletionResponse};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completion client. Works with OpenAI, Ollama, vLLM,
/// Groq, OpenRouter, etc.
///
/// The prompt is sent as a single user message. `model` on the request
/// overrides the configured model; request options are copied into the
/// body and override the configured `max_tokens` and `temperature`.
pub struct OpenAiCompletion {
    http: Client,
    config: ModelConfig,
}

impl OpenAiCompletion {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn request_body(&self, request: CompletionRequest) -> Value {
        let model = request
            .model
            .unwrap_or_else(|| self.config.model_id.clone());
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
        });
        if let Value::Object(map) = &mut body {
            for (k, v) in request.options {
                map.insert(k, v);
            }
        }
        body
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionBackend for OpenAiCompletion {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>> {
        Box::pin(async move {
            let base_url = self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
            let body = self.request_body(request);
            debug!(url = %base_url, model = %body["model"], "Sending completion request");

            let mut req = self.http.post(base_url).json(&body);
            if let Some(api_key) = &self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = req
                .send()
                .await
                .map_err(|e| WeftError::Completion(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(WeftError::Completion(format!("HTTP {}: {}", status, body)));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| WeftError::Completion(format!("invalid response: {}", e)))?;

            let completion = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| WeftError::Completion("response contained no choices".into()))?;

            Ok(CompletionResponse { completion })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig {
            provider: "openai".into(),
            model_id: "gpt-4o-mini".into(),
            api_key: None,
            base_url: None,
            max_tokens: 256,
            temperature: 0.0,
            retry: None,
        }
    }

    #[test]
    fn body_uses_configured_model_by_default() {
        let client = OpenAiCompletion::new(config());
        let body = client.request_body(CompletionRequest::new("hi"));
        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["messages"][0]["content"], json!("hi"));
        assert_eq!(body["max_tokens"], json!(256));
    }

    #[test]
    fn request_model_and_options_override() {
        let client = OpenAiCompletion::new(config());
        let mut request = CompletionRequest::new("hi").with_model("other");
        request.options.insert("temperature".into(), json!(0.7));
        request.options.insert("top_p".into(), json!(0.9));

        let body = client.request_body(request);
        assert_eq!(body["model"], json!("other"));
        assert_eq!(body["temperature"], json!(0.7));
        assert_eq!(body["top_p"], json!(0.9));
    }

    #[test]
    fn parses_first_choice() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"done"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("done"));
    }
}
