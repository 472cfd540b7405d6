//! HTTP client for an OpenAI-compatible chat completion endpoint.

use std::time::Duration;

use futures::StreamExt;

use crate::config::RuntimeConfig;

use super::errors::InferenceError;
use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl InferenceClient {
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, InferenceError> {
        let api_key = config.openai_api_key().ok_or(InferenceError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.openai_base_url().trim_end_matches('/').to_string(),
            api_key,
            model: config.openai_model(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(InferenceError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// One non-streaming completion; returns the assistant text.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.2),
            stream: None,
        };

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let parsed: ChatCompletionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|c| c.text())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(text)
    }

    /// Streaming completion: each content delta is handed to `on_delta` as
    /// it arrives; the full text is returned at the end.
    pub async fn stream_complete<F>(
        &self,
        messages: Vec<ChatMessage>,
        mut on_delta: F,
    ) -> Result<String, InferenceError>
    where
        F: FnMut(&str),
    {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.2),
            stream: Some(true),
        };

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let mut stream = Self::check(response).await?.bytes_stream();

        let mut buffer = String::new();
        let mut full_text = String::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);

                let Some(payload) = line.strip_prefix("data:") else {
                    continue;
                };
                let payload = payload.trim();
                if payload.is_empty() || payload == "[DONE]" {
                    continue;
                }
                let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(payload) else {
                    tracing::debug!(line = payload, "skipping unparseable stream chunk");
                    continue;
                };
                if let Some(delta) = chunk
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.as_deref())
                {
                    full_text.push_str(delta);
                    on_delta(delta);
                }
            }
        }

        if full_text.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        let config = RuntimeConfig::from_pairs::<_, String, String>([]);
        assert!(matches!(
            InferenceClient::from_config(&config).unwrap_err(),
            InferenceError::MissingApiKey
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = RuntimeConfig::from_pairs([
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "https://llm.example.com/v1/"),
        ]);
        let client = InferenceClient::from_config(&config).unwrap();
        assert_eq!(
            client.completions_url(),
            "https://llm.example.com/v1/chat/completions"
        );
    }
}
