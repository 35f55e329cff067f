//! Answer and decision oracle.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Text in, text out. Transport and auth failures are `Error::Oracle`.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatOracle {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
    temperature: f32,
}

impl ChatOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            temperature: 0.2,
        }
    }

    /// Configure from `APPLY_PILOT_API_KEY` (or `OPENAI_API_KEY`),
    /// `APPLY_PILOT_BASE_URL` and `APPLY_PILOT_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("APPLY_PILOT_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| Error::Config("APPLY_PILOT_API_KEY or OPENAI_API_KEY must be set".into()))?;
        let mut oracle = Self::new(api_key);
        if let Ok(base_url) = std::env::var("APPLY_PILOT_BASE_URL") {
            oracle = oracle.base_url(base_url);
        }
        if let Ok(model) = std::env::var("APPLY_PILOT_MODEL") {
            oracle = oracle.model(model);
        }
        Ok(oracle)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

/// First choice's message text, or the API's error message.
fn reply_content(status: StatusCode, body: &Value) -> Result<String> {
    if !status.is_success() {
        let message = body["error"]["message"].as_str().unwrap_or("unknown error");
        return Err(Error::Oracle(format!("{status}: {message}")));
    }
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Oracle("response has no message content".into()))
}

#[async_trait]
impl Oracle for ChatOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| Error::Oracle(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Oracle(format!("unreadable response ({status}): {e}")))?;
        let content = reply_content(status, &body)?;
        debug!(model = %self.model, chars = content.len(), "oracle replied");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_goes_first() {
        let oracle = ChatOracle::new("key")
            .model("small")
            .system_prompt("Be brief.");
        let body = oracle.request_body("Why Acme?");
        assert_eq!(body["model"], "small");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Why Acme?");
    }

    #[test]
    fn error_bodies_become_oracle_errors() {
        let body = json!({"error": {"message": "Incorrect API key provided"}});
        let err = reply_content(StatusCode::UNAUTHORIZED, &body).unwrap_err();
        assert!(matches!(err, Error::Oracle(ref m) if m.contains("Incorrect API key")));

        let body = json!({"choices": [{"message": {"content": "SKIP"}}]});
        assert_eq!(reply_content(StatusCode::OK, &body).unwrap(), "SKIP");
        assert!(reply_content(StatusCode::OK, &json!({"choices": []})).is_err());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let oracle = ChatOracle::new("key").base_url("http://localhost:8080/v1/");
        assert_eq!(oracle.base_url, "http://localhost:8080/v1");
    }
}
