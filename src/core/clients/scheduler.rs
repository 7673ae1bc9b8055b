use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Schedule a post for `platform` at `publish_at` (scheduler-local
    /// "YYYY-MM-DDTHH:MM:SS" timestamp).
    async fn schedule_post(
        &self,
        blog_id: &str,
        user_id: &str,
        platform: &str,
        text: &str,
        media_urls: &[String],
        publish_at: &str,
    ) -> Result<()>;

    /// Add a post to a best-times list. Creates the draft first, then attaches
    /// text and pictures to it.
    async fn post_to_list(
        &self,
        blog_id: &str,
        user_id: &str,
        list_id: &str,
        text: &str,
        picture_urls: &[String],
    ) -> Result<()>;
}

pub struct MetricoolClient {
    client: Client,
    base_url: String,
    api_token: String,
}

#[derive(Deserialize)]
struct CreatedListPost {
    #[serde(rename = "postId")]
    post_id: i64,
}

impl MetricoolClient {
    pub fn new(base_url: String, api_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_token,
        }
    }
}

#[async_trait]
impl SchedulerApi for MetricoolClient {
    async fn schedule_post(
        &self,
        blog_id: &str,
        user_id: &str,
        platform: &str,
        text: &str,
        media_urls: &[String],
        publish_at: &str,
    ) -> Result<()> {
        let body = serde_json::json!({
            "providers": [{ "network": platform.to_lowercase() }],
            "publicationDate": { "dateTime": publish_at, "timezone": "UTC" },
            "text": text,
            "media": media_urls,
            "autoPublish": true,
        });
        let res = self
            .client
            .post(format!("{}/v2/scheduler/posts", self.base_url))
            .query(&[("blogId", blog_id), ("userId", user_id)])
            .header("X-Mc-Auth", &self.api_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(anyhow!("Scheduler rejected post (HTTP {status}): {detail}"));
        }
        Ok(())
    }

    async fn post_to_list(
        &self,
        blog_id: &str,
        user_id: &str,
        list_id: &str,
        text: &str,
        picture_urls: &[String],
    ) -> Result<()> {
        let res = self
            .client
            .get(format!("{}/lists/posts/create", self.base_url))
            .query(&[
                ("blogId", blog_id),
                ("userId", user_id),
                ("listId", list_id),
            ])
            .header("X-Mc-Auth", &self.api_token)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "List post creation failed (HTTP {})",
                res.status()
            ));
        }
        let created: CreatedListPost = res.json().await?;

        let mut form = reqwest::multipart::Form::new()
            .text("listid", list_id.to_string())
            .text("postid", created.post_id.to_string())
            .text("text", text.to_string());
        for url in picture_urls {
            form = form.text("pictures", url.clone());
        }
        let res = self
            .client
            .post(format!("{}/lists/posts/updatepostlist", self.base_url))
            .query(&[("blogId", blog_id), ("userId", user_id)])
            .header("X-Mc-Auth", &self.api_token)
            .multipart(form)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(anyhow!("List post update failed (HTTP {status}): {detail}"));
        }
        Ok(())
    }
}
