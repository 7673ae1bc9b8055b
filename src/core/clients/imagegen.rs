//! Asynchronous image generation: submit a prompt, get a job id, poll a
//! status endpoint with exponential backoff until the job reaches a terminal
//! state. The one genuine request/poll/backoff state machine in the system.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::queue::fatal;

#[derive(Debug, Clone, PartialEq)]
pub enum ImageJobState {
    Processing,
    Finished { image_url: String },
    Failed { reason: String },
}

#[async_trait]
pub trait ImageJobApi: Send + Sync {
    /// Submit a prompt; returns the job id to poll.
    async fn submit(&self, prompt: &str) -> Result<String>;
    async fn status(&self, job_id: &str) -> Result<ImageJobState>;
    /// Follow-up upscale job keyed by the originating job id.
    async fn submit_upscale(&self, origin_job_id: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub factor: u32,
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(8),
            factor: 2,
            max_polls: 10,
        }
    }
}

/// Poll until the job finishes or fails, sleeping between polls with the
/// delay multiplied by `factor` each round. A job that reports `failed` is a
/// fatal error (re-polling cannot fix it); running out of polls is a timeout
/// the caller's retry policy may re-attempt from scratch.
pub async fn poll_until_complete(
    api: &dyn ImageJobApi,
    job_id: &str,
    policy: &PollPolicy,
) -> Result<String> {
    let mut delay = policy.initial_delay;
    for _ in 0..policy.max_polls {
        match api.status(job_id).await? {
            ImageJobState::Finished { image_url } => return Ok(image_url),
            ImageJobState::Failed { reason } => {
                return Err(fatal(format!("Image job {} failed: {}", job_id, reason)));
            }
            ImageJobState::Processing => {
                tokio::time::sleep(delay).await;
                delay *= policy.factor;
            }
        }
    }
    Err(anyhow!(
        "Image job {} still processing after {} polls",
        job_id,
        policy.max_polls
    ))
}

// --- HTTP implementation (midjourney-compatible job API) ---

#[derive(Serialize)]
struct ImagineRequest<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
    process_mode: &'a str,
}

#[derive(Serialize)]
struct UpscaleRequest<'a> {
    origin_task_id: &'a str,
    index: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct FetchResponse {
    status: String,
    #[serde(default)]
    task_result: Option<TaskResult>,
}

#[derive(Deserialize, Default)]
struct TaskResult {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

pub struct MidjourneyClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MidjourneyClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    async fn submit_job<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("X-API-KEY", &self.api_key)
            .json(body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Image job submission failed (HTTP {})",
                res.status()
            ));
        }
        let parsed: SubmitResponse = res.json().await?;
        Ok(parsed.task_id)
    }
}

#[async_trait]
impl ImageJobApi for MidjourneyClient {
    async fn submit(&self, prompt: &str) -> Result<String> {
        self.submit_job(
            "/mj/v2/imagine",
            &ImagineRequest {
                prompt,
                aspect_ratio: "16:9",
                process_mode: "fast",
            },
        )
        .await
    }

    async fn status(&self, job_id: &str) -> Result<ImageJobState> {
        let res = self
            .client
            .post(format!("{}/mj/v2/fetch", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "task_id": job_id }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!("Image job fetch failed (HTTP {})", res.status()));
        }
        let parsed: FetchResponse = res.json().await?;
        let result = parsed.task_result.unwrap_or_default();
        match parsed.status.as_str() {
            "finished" => {
                let image_url = result
                    .image_url
                    .ok_or_else(|| anyhow!("Finished image job {} has no image url", job_id))?;
                Ok(ImageJobState::Finished { image_url })
            }
            "failed" => Ok(ImageJobState::Failed {
                reason: result
                    .error_message
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
            _ => Ok(ImageJobState::Processing),
        }
    }

    async fn submit_upscale(&self, origin_job_id: &str) -> Result<String> {
        self.submit_job(
            "/mj/v2/upscale",
            &UpscaleRequest {
                origin_task_id: origin_job_id,
                index: "1",
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue::is_fatal;
    use std::sync::Mutex;

    /// Replays a scripted sequence of states, then repeats the last one.
    struct ScriptedJobApi {
        states: Mutex<Vec<ImageJobState>>,
        polls: Mutex<u32>,
    }

    impl ScriptedJobApi {
        fn new(states: Vec<ImageJobState>) -> Self {
            Self {
                states: Mutex::new(states),
                polls: Mutex::new(0),
            }
        }

        fn poll_count(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ImageJobApi for ScriptedJobApi {
        async fn submit(&self, _prompt: &str) -> Result<String> {
            Ok("job-1".to_string())
        }

        async fn status(&self, _job_id: &str) -> Result<ImageJobState> {
            *self.polls.lock().unwrap() += 1;
            let mut states = self.states.lock().unwrap();
            if states.len() > 1 {
                Ok(states.remove(0))
            } else {
                Ok(states[0].clone())
            }
        }

        async fn submit_upscale(&self, origin: &str) -> Result<String> {
            Ok(format!("upscale-{}", origin))
        }
    }

    fn fast_policy(max_polls: u32) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(1),
            factor: 2,
            max_polls,
        }
    }

    #[tokio::test]
    async fn finished_sequence_returns_final_payload() {
        let api = ScriptedJobApi::new(vec![
            ImageJobState::Processing,
            ImageJobState::Processing,
            ImageJobState::Finished {
                image_url: "https://img.example/x.png".to_string(),
            },
        ]);

        let url = poll_until_complete(&api, "job-1", &fast_policy(10))
            .await
            .unwrap();
        assert_eq!(url, "https://img.example/x.png");
        assert_eq!(api.poll_count(), 3);
    }

    #[tokio::test]
    async fn failed_job_is_fatal() {
        let api = ScriptedJobApi::new(vec![
            ImageJobState::Processing,
            ImageJobState::Failed {
                reason: "content policy".to_string(),
            },
        ]);

        let err = poll_until_complete(&api, "job-1", &fast_policy(10))
            .await
            .unwrap_err();
        assert!(is_fatal(&err));
        assert!(err.to_string().contains("content policy"));
    }

    #[tokio::test]
    async fn never_terminal_times_out_after_max_polls() {
        let api = ScriptedJobApi::new(vec![ImageJobState::Processing]);

        let err = poll_until_complete(&api, "job-1", &fast_policy(4))
            .await
            .unwrap_err();
        assert!(!is_fatal(&err), "timeout is retryable, not fatal");
        assert!(err.to_string().contains("after 4 polls"));
        assert_eq!(api.poll_count(), 4);
    }
}
