use std::future::Future;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Text-in, text-out access to a hosted model.
pub trait Generate: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL").unwrap_or_else(|_| {
            "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
        });
        let model =
            dotenv::var("LLM_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let api_key = dotenv::var("LLM_API_KEY")
            .or_else(|_| dotenv::var("GEMINI_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") || base.ends_with("/openai") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message], temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": 2048,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read LLM response")?;

        if !status.is_success() {
            let detail = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|j| j["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| text.chars().take(300).collect());
            bail!("LLM returned {}: {}", status, detail);
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;

        completion_text(&json)
    }
}

/// Text of `choices[0].message.content`; a null or blank completion is an error.
fn completion_text(json: &serde_json::Value) -> Result<String> {
    let choice = &json["choices"][0];
    match choice["message"]["content"].as_str() {
        Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
        _ => {
            let reason = choice["finish_reason"].as_str().unwrap_or("unknown");
            bail!("LLM returned an empty completion (finish_reason: {})", reason)
        }
    }
}

impl Generate for LlmClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let messages = vec![Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat(&messages, temperature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> LlmClient {
        LlmClient {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
        }
    }

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(
            client("https://generativelanguage.googleapis.com/v1beta/openai/").endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
        assert_eq!(
            client("http://localhost:1234/v1").endpoint(),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(
            client("http://localhost:1234").endpoint(),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(
            client("http://host/v1/chat/completions").endpoint(),
            "http://host/v1/chat/completions"
        );
    }

    #[test]
    fn test_completion_text() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "hola"}, "finish_reason": "stop"}]
        });
        assert_eq!(completion_text(&json).unwrap(), "hola");
    }

    #[test]
    fn test_null_completion_is_an_error() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": null}, "finish_reason": "length"}]
        });
        let err = completion_text(&json).unwrap_err();
        assert!(format!("{:#}", err).contains("finish_reason: length"));

        let blank = serde_json::json!({"choices": [{"message": {"content": "  "}}]});
        assert!(completion_text(&blank).is_err());
        assert!(completion_text(&serde_json::json!({"choices": []})).is_err());
    }
}
