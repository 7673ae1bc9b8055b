use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[async_trait]
pub trait ImageHostApi: Send + Sync {
    /// Render `hook_text` over the source image and host the result. Returns
    /// the public URL of the hosted image.
    async fn host_with_overlay(&self, image_url: &str, hook_text: &str) -> Result<String>;
}

pub struct OverlayHostClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct HostedImage {
    url: String,
}

impl OverlayHostClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl ImageHostApi for OverlayHostClient {
    async fn host_with_overlay(&self, image_url: &str, hook_text: &str) -> Result<String> {
        let res = self
            .client
            .post(format!("{}/v1/images", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "source_url": image_url,
                "overlay_text": hook_text,
            }))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(anyhow!("Image hosting failed (HTTP {status}): {detail}"));
        }
        let hosted: HostedImage = res.json().await?;
        Ok(hosted.url)
    }
}
