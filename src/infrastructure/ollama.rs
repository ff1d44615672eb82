use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{AnswerGenerator, GenerationError};

/// Connection and sampling settings for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "mistral".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(120),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Generates answers through Ollama's non-streaming chat endpoint.
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    settings: OllamaSettings,
}

impl OllamaGenerator {
    pub fn new(settings: OllamaSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client for Ollama")?;
        let endpoint = format!("{}/api/chat", settings.base_url.trim_end_matches('/'));
        info!(
            "Configured Ollama generator: model='{}', endpoint={}, timeout={:?}",
            settings.model, endpoint, settings.timeout
        );
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: self.settings.temperature,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        Ok(parsed.message.content)
    }

    fn classify(&self, error: reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::Timeout(self.settings.timeout)
        } else {
            GenerationError::Unreachable(error.to_string())
        }
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            debug!("Calling Ollama (attempt {}/{})", attempt + 1, self.settings.max_retries + 1);
            match self.generate_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    let backoff = self.settings.retry_backoff * 2u32.saturating_pow(attempt);
                    warn!("Ollama call failed ({}), retrying in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> OllamaSettings {
        OllamaSettings {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(10),
            ..OllamaSettings::default()
        }
    }

    fn chat_reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "model": "mistral",
            "message": { "role": "assistant", "content": content },
            "done": true
        }))
    }

    #[tokio::test]
    async fn test_generate_sends_deterministic_chat_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "mistral",
                "stream": false,
                "options": { "temperature": 0.0 },
                "messages": [{ "role": "user", "content": "the prompt" }]
            })))
            .respond_with(chat_reply(" The fund returned 9.8%. "))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(settings_for(&server)).unwrap();
        let answer = generator.generate("the prompt").await.unwrap();
        assert_eq!(answer, " The fund returned 9.8%. ");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model 'mistral' not found"))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(settings_for(&server)).unwrap();
        let err = generator.generate("p").await.unwrap_err();
        assert_matches!(err, GenerationError::Status { status: 404, ref body } if body.contains("not found"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(settings_for(&server)).unwrap();
        assert_matches!(generator.generate("p").await, Err(GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(chat_reply("too late").set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(OllamaSettings {
            timeout: Duration::from_millis(100),
            ..settings_for(&server)
        })
        .unwrap();
        assert_matches!(generator.generate("p").await, Err(GenerationError::Timeout(t)) if t == Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Nothing listens on the discard port
        let generator = OllamaGenerator::new(OllamaSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            ..OllamaSettings::default()
        })
        .unwrap();
        assert_matches!(generator.generate("p").await, Err(GenerationError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(chat_reply("recovered"))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(OllamaSettings {
            max_retries: 2,
            ..settings_for(&server)
        })
        .unwrap();
        assert_eq!(generator.generate("p").await.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_no_retry_without_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(settings_for(&server)).unwrap();
        assert_matches!(generator.generate("p").await, Err(GenerationError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(OllamaSettings {
            max_retries: 3,
            ..settings_for(&server)
        })
        .unwrap();
        assert!(generator.generate("p").await.is_err());
    }
}
