use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.7;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

/// One LLM completion call. Callers supply the API key per invocation because
/// generation runs under the owning user's own credential, not a process key.
#[async_trait]
pub trait LlmApi: Send + Sync {
    async fn complete(&self, api_key: &str, model: &str, prompt: &str) -> Result<String>;
}

pub struct AnthropicClient {
    client: Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl LlmApi for AnthropicClient {
    async fn complete(&self, api_key: &str, model: &str, prompt: &str) -> Result<String> {
        let req = MessagesRequest {
            model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };
        let res = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await?;
        // Non-2xx (429, 5xx) surfaces as an error; the task queue owns retry.
        if !res.status().is_success() {
            return Err(anyhow!(
                "LLM API error (HTTP {}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: MessagesResponse = res.json().await?;
        Ok(parsed
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}
