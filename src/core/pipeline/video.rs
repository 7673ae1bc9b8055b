//! Video processing stages. The pipeline is strictly sequential and each
//! stage persists a checkpoint field the moment it completes, so a retried
//! task resumes at the first incomplete stage instead of redoing paid work.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use super::{PipelineContext, payload_str};
use crate::core::clients::imagegen::{PollPolicy, poll_until_complete};
use crate::core::clients::storage::download_to_scratch;
use crate::core::queue::{TaskOutcome, fatal};
use crate::core::store::types::VIDEO_STATUS_FOR_REVIEW;

#[derive(Debug, Deserialize, PartialEq)]
pub(crate) struct VideoCopy {
    pub title: String,
    pub description: String,
    pub hook: String,
}

/// Extract a JSON block from LLM output. Tries fenced ```json ... ``` first,
/// then raw JSON starting with `{`.
fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let content_start = start + 7;
        if let Some(end) = trimmed[content_start..].find("```") {
            let block = trimmed[content_start..content_start + end].trim();
            if !block.is_empty() {
                return Some(block);
            }
        }
    }
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }
    None
}

/// Parse the title/description/hook the model returned. A parse failure is
/// retryable; the next attempt re-prompts from the persisted transcript.
pub(crate) fn parse_video_copy(response: &str) -> Result<VideoCopy> {
    let block = extract_json_block(response)
        .ok_or_else(|| anyhow!("LLM response contains no JSON block"))?;
    serde_json::from_str(block).context("Failed to parse video copy JSON")
}

fn copy_prompt(transcript: &str) -> String {
    format!(
        "You are writing video marketing copy. Based on the transcript below, \
         respond with a JSON object with exactly these string fields: \
         \"title\" (under 70 characters), \"description\" (2-3 sentences), and \
         \"hook\" (one attention-grabbing line under 10 words).\n\n\
         Transcript:\n{}",
        transcript
    )
}

fn image_prompt(title: &str, description: &str) -> String {
    format!(
        "Write a single vivid text-to-image prompt for a video thumbnail. \
         The video is titled \"{}\". Description: {} \
         Respond with the prompt text only, no commentary.",
        title, description
    )
}

impl PipelineContext {
    /// Fetch the source video into scratch unless an earlier stage already
    /// did. The scratch copy is removed once transcription has checkpointed.
    async fn ensure_local_copy(&self, video_url: &str, file_name: &str) -> Result<PathBuf> {
        let path = self.config.scratch_dir.join(file_name);
        if tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }
        download_to_scratch(
            &self.clients.http,
            video_url,
            &self.config.scratch_dir,
            file_name,
        )
        .await
    }

    /// The publish trigger names the user by id; the processing trigger may
    /// carry only the display name, resolved through the users table.
    async fn resolve_user_id(&self, payload: &Value, user_name: &str) -> Result<String> {
        if let Some(id) = payload
            .get("user_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return Ok(id.to_string());
        }
        self.store
            .find_user_by_name(user_name)
            .await?
            .ok_or_else(|| fatal(format!("No user record named '{}'", user_name)))
    }

    pub(crate) async fn process_video(&self, payload: &Value) -> Result<TaskOutcome> {
        let record_id = payload_str(payload, "record_id")?;
        let video_url = payload_str(payload, "video_url")?;
        let file_name = payload_str(payload, "file_name")?;
        let customer_name = payload_str(payload, "customer_name")?;
        let user_name = payload_str(payload, "user_name")?;

        // Idempotent: an existing row keeps its checkpoints.
        self.store
            .create_video_job(record_id, video_url, file_name, customer_name, user_name)
            .await?;
        let mut job = self
            .store
            .get_video_job(record_id)
            .await?
            .ok_or_else(|| anyhow!("Video job {} missing after create", record_id))?;

        if job.storage_ref.is_none() {
            let local = self.ensure_local_copy(video_url, file_name).await?;
            let folder = format!("{}/{}", customer_name, user_name);
            let storage_ref = self
                .clients
                .storage
                .upload_video(&local, file_name, &folder)
                .await?;
            self.store
                .set_video_storage_ref(record_id, &storage_ref)
                .await?;
            job.storage_ref = Some(storage_ref);
        } else {
            info!("Video {} already uploaded, skipping", record_id);
        }

        if job.transcript.is_none() {
            let local = self.ensure_local_copy(video_url, file_name).await?;
            let transcript = self.clients.transcription.transcribe_video(&local).await?;
            self.store
                .set_video_transcript(record_id, &transcript)
                .await?;
            let _ = tokio::fs::remove_file(&local).await;
            job.transcript = Some(transcript);
        } else {
            info!("Video {} already transcribed, skipping", record_id);
        }
        let transcript = job.transcript.clone().unwrap_or_default();

        if job.title.is_none() || job.hook.is_none() {
            let user_id = self.resolve_user_id(payload, user_name).await?;
            let api_key = self.llm_api_key(&user_id).await?;
            let response = self
                .clients
                .llm
                .complete(
                    &api_key,
                    &self.config.default_model,
                    &copy_prompt(&transcript),
                )
                .await?;
            let copy = parse_video_copy(&response)?;
            self.store
                .set_video_copy(record_id, &copy.title, &copy.description, &copy.hook)
                .await?;
            job.title = Some(copy.title);
            job.description = Some(copy.description);
            job.hook = Some(copy.hook);
        } else {
            info!("Video {} already has copy, skipping", record_id);
        }
        let title = job.title.clone().unwrap_or_default();
        let description = job.description.clone().unwrap_or_default();
        let hook = job.hook.clone().unwrap_or_default();

        if job.image_url.is_none() {
            let user_id = self.resolve_user_id(payload, user_name).await?;
            let api_key = self.llm_api_key(&user_id).await?;
            let prompt = self
                .clients
                .llm
                .complete(
                    &api_key,
                    &self.config.default_model,
                    &image_prompt(&title, &description),
                )
                .await?;
            let policy = PollPolicy::default();
            let job_id = self.clients.image.submit(prompt.trim()).await?;
            poll_until_complete(self.clients.image.as_ref(), &job_id, &policy).await?;
            let upscale_id = self.clients.image.submit_upscale(&job_id).await?;
            let image_url =
                poll_until_complete(self.clients.image.as_ref(), &upscale_id, &policy).await?;
            self.store.set_video_image_url(record_id, &image_url).await?;
            job.image_url = Some(image_url);
        } else {
            info!("Video {} already has an image, skipping", record_id);
        }

        if job.hosted_image_url.is_none() {
            let image_url = job
                .image_url
                .as_deref()
                .ok_or_else(|| anyhow!("Video job {} has no image to host", record_id))?;
            let hosted = self
                .clients
                .image_host
                .host_with_overlay(image_url, &hook)
                .await?;
            self.store
                .set_video_hosted_image_url(record_id, &hosted)
                .await?;
        } else {
            info!("Video {} image already hosted, skipping", record_id);
        }

        self.store
            .set_video_job_status(record_id, VIDEO_STATUS_FOR_REVIEW)
            .await?;
        Ok(TaskOutcome::Completed(format!(
            "video {} ready for review",
            record_id
        )))
    }

    pub(crate) async fn publish_video(&self, payload: &Value) -> Result<TaskOutcome> {
        let record_id = payload_str(payload, "record_id")?;
        let user_id = payload_str(payload, "user_id")?;

        let job = self
            .store
            .get_video_job(record_id)
            .await?
            .ok_or_else(|| fatal(format!("Video job {} not found", record_id)))?;

        let ciphertext = self
            .store
            .get_credential(user_id, super::YOUTUBE_PROVIDER)
            .await?
            .ok_or_else(|| fatal(format!("User {} has not connected YouTube", user_id)))?;
        let refresh_token = self.vault.decrypt(&ciphertext).map_err(|e| {
            fatal(format!(
                "Stored YouTube token for {} cannot be decrypted: {:#}",
                user_id, e
            ))
        })?;

        let title = job.title.as_deref().unwrap_or(&job.file_name);
        let description = job.description.as_deref().unwrap_or_default();
        let video_id = self
            .clients
            .publisher
            .publish(&refresh_token, &job.video_url, title, description)
            .await?;
        info!("Published video {} as {}", record_id, video_id);
        Ok(TaskOutcome::Completed(format!(
            "published video {} as {}",
            record_id, video_id
        )))
    }
}

#[cfg(test)]
mod copy_tests {
    use super::*;

    #[test]
    fn parses_fenced_json_copy() {
        let response = "Here you go:\n```json\n{\"title\": \"T\", \"description\": \"D\", \"hook\": \"H\"}\n```";
        let copy = parse_video_copy(response).unwrap();
        assert_eq!(
            copy,
            VideoCopy {
                title: "T".to_string(),
                description: "D".to_string(),
                hook: "H".to_string(),
            }
        );
    }

    #[test]
    fn parses_raw_json_copy() {
        let response = "{\"title\": \"T\", \"description\": \"D\", \"hook\": \"H\"}";
        assert_eq!(parse_video_copy(response).unwrap().title, "T");
    }

    #[test]
    fn prose_without_json_is_an_error() {
        assert!(parse_video_copy("Sure! The title should be Great Video.").is_err());
    }

    #[test]
    fn json_missing_a_field_is_an_error() {
        assert!(parse_video_copy("{\"title\": \"T\"}").is_err());
    }
}
