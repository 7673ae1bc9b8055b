//! Content pipeline: turns queued tasks into LLM calls, record writes, and
//! external API work. One [PipelineContext] serves as the queue's task runner
//! and dispatches on task kind; every operation re-reads its inputs from the
//! store so a task is resumable from its payload alone.

pub mod template;
mod video;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::core::clients::Clients;
use crate::core::queue::{TaskOutcome, TaskQueue, TaskRunner, fatal};
use crate::core::store::RecordStore;
use crate::core::store::types::{TaskKind, TaskRecord};
use crate::core::vault::CredentialVault;
use template::render_template;

/// Credential table provider keys.
pub const LLM_PROVIDER: &str = "llm";
pub const YOUTUBE_PROVIDER: &str = "youtube";

pub struct PipelineContext {
    pub store: Arc<RecordStore>,
    pub vault: Arc<CredentialVault>,
    pub clients: Arc<Clients>,
    pub config: Arc<Config>,
}

/// Read a required string field out of a task payload. A malformed payload
/// cannot be fixed by retrying.
fn payload_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| fatal(format!("Task payload missing field '{}'", field)))
}

/// Queue one generation task per platform, the i-th delayed by
/// `i * stagger_secs` so bursts of submissions do not land on the LLM at once.
pub async fn enqueue_generation(
    queue: &TaskQueue,
    submission_id: &str,
    platforms: &[String],
    stagger_secs: u64,
) -> Result<Vec<String>> {
    let mut task_ids = Vec::with_capacity(platforms.len());
    for (i, platform) in platforms.iter().enumerate() {
        let task_id = queue
            .enqueue(
                TaskKind::GeneratePost,
                serde_json::json!({
                    "submission_id": submission_id,
                    "platform": platform,
                }),
                Duration::from_secs(i as u64 * stagger_secs),
            )
            .await?;
        task_ids.push(task_id);
    }
    Ok(task_ids)
}

impl PipelineContext {
    /// Resolve and decrypt the user's stored LLM API key. Absence and
    /// undecryptable ciphertext are both terminal for the dependent task.
    pub(crate) async fn llm_api_key(&self, user_id: &str) -> Result<String> {
        let ciphertext = self
            .store
            .get_credential(user_id, LLM_PROVIDER)
            .await?
            .ok_or_else(|| fatal(format!("No stored API key for user {}", user_id)))?;
        self.vault.decrypt(&ciphertext).map_err(|e| {
            fatal(format!(
                "Stored API key for user {} cannot be decrypted: {:#}",
                user_id, e
            ))
        })
    }

    async fn generate_for_platform(
        &self,
        submission_id: &str,
        platform: &str,
    ) -> Result<TaskOutcome> {
        let submission = self
            .store
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| fatal(format!("Submission {} not found", submission_id)))?;
        let Some(user_id) = submission.user_id.as_deref() else {
            return Ok(TaskOutcome::Skipped(format!(
                "submission {} has no owning user",
                submission_id
            )));
        };

        // A user without a template or strategy for this platform has opted
        // out of it. That is configuration, not an error.
        let Some(prompt_template) = self.store.get_platform_prompt(user_id, platform).await?
        else {
            return Ok(TaskOutcome::Skipped(format!(
                "no prompt template for {} on {}",
                user_id, platform
            )));
        };
        let Some(strategy) = self.store.get_platform_strategy(user_id, platform).await? else {
            return Ok(TaskOutcome::Skipped(format!(
                "no strategy for {} on {}",
                user_id, platform
            )));
        };

        let api_key = self.llm_api_key(user_id).await?;
        let values = HashMap::from([
            ("transcript", submission.transcript.as_str()),
            ("writing_style", submission.writing_style.as_str()),
            ("strategy", strategy.as_str()),
            ("platform", platform),
        ]);
        let prompt = render_template(&prompt_template, &values)?;

        let model = submission
            .model_override
            .as_deref()
            .unwrap_or(&self.config.default_model);
        let body = self.clients.llm.complete(&api_key, model, &prompt).await?;
        if body.is_empty() {
            return Err(anyhow::anyhow!(
                "Empty LLM response for {} on {}",
                submission_id,
                platform
            ));
        }

        let output_id = self
            .store
            .create_platform_output(submission_id, Some(user_id), platform, &body)
            .await?;
        info!(
            "Generated {} post {} for submission {}",
            platform, output_id, submission_id
        );
        Ok(TaskOutcome::Completed(format!(
            "{} post {} created",
            platform, output_id
        )))
    }

    async fn split_out_tweets(&self, output_id: &str) -> Result<TaskOutcome> {
        let output = self
            .store
            .get_platform_output(output_id)
            .await?
            .ok_or_else(|| fatal(format!("Platform output {} not found", output_id)))?;

        let tweets = split_tweets(&output.body);
        if tweets.is_empty() {
            return Ok(TaskOutcome::Skipped(format!(
                "output {} contains no tweets",
                output_id
            )));
        }
        for tweet in &tweets {
            self.store
                .create_platform_output(
                    &output.submission_id,
                    output.user_id.as_deref(),
                    "Twitter",
                    tweet,
                )
                .await?;
        }
        Ok(TaskOutcome::Completed(format!(
            "split output {} into {} tweets",
            output_id,
            tweets.len()
        )))
    }
}

/// Split a multi-tweet body on blank lines, stripping any leading "1." or
/// "2)" numbering the model added.
fn split_tweets(body: &str) -> Vec<String> {
    static NUMBERING: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"^\d+[.)]\s*").unwrap());
    body.split("\n\n")
        .map(|block| NUMBERING.replace(block.trim(), "").to_string())
        .filter(|tweet| !tweet.is_empty())
        .collect()
}

#[async_trait]
impl TaskRunner for PipelineContext {
    async fn run(&self, task: &TaskRecord) -> Result<TaskOutcome> {
        match task.kind {
            TaskKind::GeneratePost => {
                let submission_id = payload_str(&task.payload, "submission_id")?;
                let platform = payload_str(&task.payload, "platform")?;
                self.generate_for_platform(submission_id, platform).await
            }
            TaskKind::ProcessVideo => self.process_video(&task.payload).await,
            TaskKind::SplitTweets => {
                let output_id = payload_str(&task.payload, "output_id")?;
                self.split_out_tweets(output_id).await
            }
            TaskKind::PublishVideo => self.publish_video(&task.payload).await,
        }
    }
}
