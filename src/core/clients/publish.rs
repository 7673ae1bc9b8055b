use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart;
use serde::Deserialize;

#[async_trait]
pub trait VideoPublishApi: Send + Sync {
    /// Publish a hosted video with the given copy. Returns the published
    /// video id.
    async fn publish(
        &self,
        refresh_token: &str,
        video_url: &str,
        title: &str,
        description: &str,
    ) -> Result<String>;
}

pub struct YouTubeClient {
    client: Client,
    token_url: String,
    upload_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UploadedVideo {
    id: String,
}

impl YouTubeClient {
    pub fn new(
        token_url: String,
        upload_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            client: Client::new(),
            token_url,
            upload_url,
            client_id,
            client_secret,
        }
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let res = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(anyhow!("Token refresh failed (HTTP {status}): {detail}"));
        }
        let token: TokenResponse = res.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl VideoPublishApi for YouTubeClient {
    async fn publish(
        &self,
        refresh_token: &str,
        video_url: &str,
        title: &str,
        description: &str,
    ) -> Result<String> {
        let access_token = self.refresh_access_token(refresh_token).await?;

        let res = self.client.get(video_url).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Failed to fetch video for publishing (HTTP {})",
                res.status()
            ));
        }
        let media = res.bytes().await?;

        let snippet = serde_json::json!({
            "snippet": {
                "title": title,
                "description": description,
                "categoryId": "22",
            },
            "status": { "privacyStatus": "public" },
        });
        let form = multipart::Form::new()
            .part(
                "snippet",
                multipart::Part::text(snippet.to_string()).mime_str("application/json")?,
            )
            .part(
                "media",
                multipart::Part::bytes(media.to_vec()).mime_str("video/mp4")?,
            );

        let res = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&access_token)
            .query(&[("part", "snippet,status"), ("uploadType", "multipart")])
            .multipart(form)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(anyhow!("Video upload failed (HTTP {status}): {detail}"));
        }
        let uploaded: UploadedVideo = res.json().await?;
        Ok(uploaded.id)
    }
}
