//! Pipeline scenario tests: generation fan-out through the real queue with
//! fake clients, and the video stage-checkpoint behavior.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::{PipelineContext, enqueue_generation};
use crate::config::Config;
use crate::core::clients::Clients;
use crate::core::clients::imagegen::{ImageJobApi, ImageJobState};
use crate::core::clients::imagehost::ImageHostApi;
use crate::core::clients::llm::LlmApi;
use crate::core::clients::publish::VideoPublishApi;
use crate::core::clients::scheduler::SchedulerApi;
use crate::core::clients::storage::StorageApi;
use crate::core::clients::transcription::{
    AudioProbe, AudioSplitter, Segment, TranscriptionAdapter, TranscriptionApi,
};
use crate::core::queue::{RateLimit, RetryPolicy, TaskQueue, TaskRunner};
use crate::core::store::RecordStore;
use crate::core::store::types::{SubmissionRecord, TaskStatus, VIDEO_STATUS_FOR_REVIEW};
use crate::core::vault::CredentialVault;

// --- fakes ---

#[derive(Default)]
struct FakeLlm {
    fail_first: AtomicU32,
    calls: AtomicU32,
}

#[async_trait]
impl LlmApi for FakeLlm {
    async fn complete(&self, _api_key: &str, _model: &str, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(anyhow!("LLM returned HTTP 500"));
        }
        if prompt.contains("JSON object") {
            Ok(r#"{"title": "Launch Day", "description": "We shipped.", "hook": "It is live"}"#
                .to_string())
        } else if prompt.contains("text-to-image") {
            Ok("a rocket leaving a laptop screen".to_string())
        } else {
            Ok(format!("generated post ({} chars of prompt)", prompt.len()))
        }
    }
}

#[derive(Default)]
struct FakeImageApi;

#[async_trait]
impl ImageJobApi for FakeImageApi {
    async fn submit(&self, _prompt: &str) -> Result<String> {
        Ok("img-1".to_string())
    }

    async fn status(&self, job_id: &str) -> Result<ImageJobState> {
        Ok(ImageJobState::Finished {
            image_url: format!("https://images.example.com/{}.png", job_id),
        })
    }

    async fn submit_upscale(&self, origin_job_id: &str) -> Result<String> {
        Ok(format!("{}-up", origin_job_id))
    }
}

#[derive(Default)]
struct FakeImageHost;

#[async_trait]
impl ImageHostApi for FakeImageHost {
    async fn host_with_overlay(&self, image_url: &str, _hook_text: &str) -> Result<String> {
        Ok(format!("{}?hosted=1", image_url))
    }
}

#[derive(Default)]
struct FakeStorage {
    uploads: AtomicU32,
}

#[async_trait]
impl StorageApi for FakeStorage {
    async fn upload_video(
        &self,
        _local: &Path,
        file_name: &str,
        folder_path: &str,
    ) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("stored:{}/{}", folder_path, file_name))
    }
}

struct FakeScheduler;

#[async_trait]
impl SchedulerApi for FakeScheduler {
    async fn schedule_post(
        &self,
        _blog_id: &str,
        _user_id: &str,
        _platform: &str,
        _text: &str,
        _media_urls: &[String],
        _publish_at: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn post_to_list(
        &self,
        _blog_id: &str,
        _user_id: &str,
        _list_id: &str,
        _text: &str,
        _picture_urls: &[String],
    ) -> Result<()> {
        Ok(())
    }
}

struct FakePublisher;

#[async_trait]
impl VideoPublishApi for FakePublisher {
    async fn publish(
        &self,
        _refresh_token: &str,
        _video_url: &str,
        _title: &str,
        _description: &str,
    ) -> Result<String> {
        Ok("yt-abc".to_string())
    }
}

struct FakeSplitter;

#[async_trait]
impl AudioSplitter for FakeSplitter {
    async fn probe(&self, _video: &Path) -> Result<AudioProbe> {
        Ok(AudioProbe {
            duration_secs: 10.0,
            silences: vec![],
        })
    }

    async fn extract(&self, video: &Path, _segment: Segment, index: usize) -> Result<PathBuf> {
        Ok(video.with_extension(format!("part{}.wav", index)))
    }
}

#[derive(Default)]
struct FakeTranscriber {
    fail: AtomicBool,
    calls: AtomicU32,
}

#[async_trait]
impl TranscriptionApi for FakeTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("transcription service unavailable"));
        }
        Ok("we shipped the launch today".to_string())
    }
}

// --- harness ---

struct Harness {
    store: Arc<RecordStore>,
    vault: Arc<CredentialVault>,
    context: Arc<PipelineContext>,
    queue: TaskQueue,
    llm: Arc<FakeLlm>,
    storage: Arc<FakeStorage>,
    transcriber: Arc<FakeTranscriber>,
    _scratch: tempfile::TempDir,
}

async fn harness() -> Harness {
    let scratch = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordStore::open_in_memory().unwrap());
    store.initialize().await.unwrap();
    let config = Arc::new(Config::for_tests(scratch.path().to_path_buf()));
    let vault = Arc::new(CredentialVault::new(&config.vault_secret));

    let llm = Arc::new(FakeLlm::default());
    let storage = Arc::new(FakeStorage::default());
    let transcriber = Arc::new(FakeTranscriber::default());
    let clients = Arc::new(Clients {
        http: reqwest::Client::new(),
        llm: llm.clone(),
        image: Arc::new(FakeImageApi),
        image_host: Arc::new(FakeImageHost),
        transcription: Arc::new(TranscriptionAdapter::new(
            Arc::new(FakeSplitter),
            transcriber.clone(),
        )),
        storage: storage.clone(),
        scheduler: Arc::new(FakeScheduler),
        publisher: Arc::new(FakePublisher),
    });

    let context = Arc::new(PipelineContext {
        store: store.clone(),
        vault: vault.clone(),
        clients,
        config,
    });
    let queue = TaskQueue::new(
        store.clone(),
        RetryPolicy {
            max_attempts: 5,
            base_backoff_secs: 0,
        },
        RateLimit { per_minute: 1000 },
    );
    Harness {
        store,
        vault,
        context,
        queue,
        llm,
        storage,
        transcriber,
        _scratch: scratch,
    }
}

impl Harness {
    async fn seed_submission(&self, user_id: &str) -> String {
        let submission = SubmissionRecord {
            id: "sub-1".to_string(),
            user_id: Some(user_id.to_string()),
            transcript: "we shipped the launch today".to_string(),
            writing_style: "direct".to_string(),
            model_override: None,
        };
        self.store.create_submission(&submission).await.unwrap();
        let key = self.vault.encrypt("sk-user-key").unwrap();
        self.store
            .set_credential(user_id, super::LLM_PROVIDER, &key)
            .await
            .unwrap();
        submission.id
    }

    async fn configure_platform(&self, user_id: &str, platform: &str) {
        self.store
            .set_platform_prompt(
                user_id,
                platform,
                "Write a {platform} post from {transcript} in {writing_style}: {strategy}",
            )
            .await
            .unwrap();
        self.store
            .set_platform_strategy(user_id, platform, "be punchy")
            .await
            .unwrap();
    }

    async fn drain(&self) {
        let runner: Arc<dyn TaskRunner> = self.context.clone();
        loop {
            let dispatched = self.queue.tick(&runner).await.unwrap();
            if dispatched == 0 {
                break;
            }
        }
    }
}

fn video_payload() -> serde_json::Value {
    serde_json::json!({
        "record_id": "vid-1",
        "video_url": "https://videos.invalid/raw.mp4",
        "file_name": "raw.mp4",
        "customer_name": "Acme",
        "user_name": "casey",
        "user_id": "user-1",
    })
}

#[tokio::test]
async fn only_configured_platforms_produce_output_rows() {
    let h = harness().await;
    let submission_id = h.seed_submission("user-1").await;
    h.configure_platform("user-1", "Twitter").await;
    // Facebook has no prompt or strategy on purpose.

    let platforms = vec!["Twitter".to_string(), "Facebook".to_string()];
    let task_ids = enqueue_generation(&h.queue, &submission_id, &platforms, 0)
        .await
        .unwrap();
    assert_eq!(task_ids.len(), 2);
    h.drain().await;

    let outputs = h.store.outputs_for_submission(&submission_id).await.unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].platform, "Twitter");

    // The unconfigured platform's task succeeded as a recorded no-op.
    for task_id in &task_ids {
        let task = h.store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Succeeded);
    }
}

#[tokio::test]
async fn transient_llm_failures_retry_to_success() {
    let h = harness().await;
    let submission_id = h.seed_submission("user-1").await;
    h.configure_platform("user-1", "Twitter").await;
    h.llm.fail_first.store(4, Ordering::SeqCst);

    let platforms = vec!["Twitter".to_string()];
    let task_ids = enqueue_generation(&h.queue, &submission_id, &platforms, 0)
        .await
        .unwrap();
    h.drain().await;

    let task = h.store.get_task(&task_ids[0]).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.attempts, 5);
    let outputs = h.store.outputs_for_submission(&submission_id).await.unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(h.llm.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn missing_api_key_fails_without_retry() {
    let h = harness().await;
    let submission = SubmissionRecord {
        id: "sub-1".to_string(),
        user_id: Some("user-2".to_string()),
        transcript: "t".to_string(),
        writing_style: "w".to_string(),
        model_override: None,
    };
    h.store.create_submission(&submission).await.unwrap();
    h.configure_platform("user-2", "Twitter").await;

    let task_ids = enqueue_generation(&h.queue, "sub-1", &["Twitter".to_string()], 0)
        .await
        .unwrap();
    h.drain().await;

    let task = h.store.get_task(&task_ids[0]).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempts, 1);
    assert!(task.last_error.unwrap().contains("No stored API key"));
}

#[tokio::test]
async fn video_pipeline_runs_all_stages_and_rerun_skips_them() {
    let h = harness().await;
    h.seed_submission("user-1").await;
    let scratch_file = h.context.config.scratch_dir.join("raw.mp4");
    tokio::fs::write(&scratch_file, b"fake video bytes")
        .await
        .unwrap();

    let outcome = h.context.process_video(&video_payload()).await.unwrap();
    assert!(matches!(outcome, super::TaskOutcome::Completed(_)));

    let job = h.store.get_video_job("vid-1").await.unwrap().unwrap();
    assert_eq!(job.storage_ref.as_deref(), Some("stored:Acme/casey/raw.mp4"));
    assert_eq!(job.transcript.as_deref(), Some("we shipped the launch today"));
    assert_eq!(job.title.as_deref(), Some("Launch Day"));
    assert_eq!(job.hook.as_deref(), Some("It is live"));
    assert_eq!(
        job.image_url.as_deref(),
        Some("https://images.example.com/img-1-up.png")
    );
    assert_eq!(
        job.hosted_image_url.as_deref(),
        Some("https://images.example.com/img-1-up.png?hosted=1")
    );
    assert_eq!(job.status, VIDEO_STATUS_FOR_REVIEW);

    let uploads_before = h.storage.uploads.load(Ordering::SeqCst);
    let llm_calls_before = h.llm.calls.load(Ordering::SeqCst);
    h.context.process_video(&video_payload()).await.unwrap();
    assert_eq!(h.storage.uploads.load(Ordering::SeqCst), uploads_before);
    assert_eq!(h.llm.calls.load(Ordering::SeqCst), llm_calls_before);
}

#[tokio::test]
async fn failed_stage_resumes_without_redoing_earlier_stages() {
    let h = harness().await;
    h.seed_submission("user-1").await;
    let scratch_file = h.context.config.scratch_dir.join("raw.mp4");
    tokio::fs::write(&scratch_file, b"fake video bytes")
        .await
        .unwrap();
    h.transcriber.fail.store(true, Ordering::SeqCst);

    let err = h.context.process_video(&video_payload()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("unavailable"));

    // Upload checkpointed, everything past the failure untouched.
    let job = h.store.get_video_job("vid-1").await.unwrap().unwrap();
    assert!(job.storage_ref.is_some());
    assert!(job.transcript.is_none());
    assert!(job.title.is_none());
    assert!(job.image_url.is_none());

    h.transcriber.fail.store(false, Ordering::SeqCst);
    h.context.process_video(&video_payload()).await.unwrap();
    assert_eq!(h.storage.uploads.load(Ordering::SeqCst), 1);
    let job = h.store.get_video_job("vid-1").await.unwrap().unwrap();
    assert_eq!(job.status, VIDEO_STATUS_FOR_REVIEW);
}

#[tokio::test]
async fn video_user_is_resolved_by_name_when_payload_has_no_id() {
    let h = harness().await;
    h.seed_submission("user-1").await;
    h.store.upsert_user("user-1", "casey").await.unwrap();
    let scratch_file = h.context.config.scratch_dir.join("raw.mp4");
    tokio::fs::write(&scratch_file, b"fake video bytes")
        .await
        .unwrap();

    let mut payload = video_payload();
    payload.as_object_mut().unwrap().remove("user_id");

    let outcome = h.context.process_video(&payload).await.unwrap();
    assert!(matches!(outcome, super::TaskOutcome::Completed(_)));
    let job = h.store.get_video_job("vid-1").await.unwrap().unwrap();
    assert_eq!(job.title.as_deref(), Some("Launch Day"));
}

#[tokio::test]
async fn video_with_unknown_user_name_fails_fatally() {
    let h = harness().await;
    h.seed_submission("user-1").await;
    let scratch_file = h.context.config.scratch_dir.join("raw.mp4");
    tokio::fs::write(&scratch_file, b"fake video bytes")
        .await
        .unwrap();

    let mut payload = video_payload();
    payload.as_object_mut().unwrap().remove("user_id");
    payload["user_name"] = serde_json::Value::String("nobody".to_string());

    let err = h.context.process_video(&payload).await.unwrap_err();
    assert!(crate::core::queue::is_fatal(&err));
    assert!(format!("{:#}", err).contains("nobody"));
}

#[tokio::test]
async fn split_out_tweets_creates_one_row_per_tweet() {
    let h = harness().await;
    let submission_id = h.seed_submission("user-1").await;
    let body = "1. First tweet here\n\n2. Second tweet here\n\n3) Third tweet here";
    let output_id = h
        .store
        .create_platform_output(&submission_id, Some("user-1"), "Twitter", body)
        .await
        .unwrap();

    let task_id = h
        .queue
        .enqueue(
            crate::core::store::types::TaskKind::SplitTweets,
            serde_json::json!({"output_id": output_id}),
            std::time::Duration::ZERO,
        )
        .await
        .unwrap();
    h.drain().await;

    let task = h.store.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    let outputs = h.store.outputs_for_submission(&submission_id).await.unwrap();
    // Original row plus three split tweets.
    assert_eq!(outputs.len(), 4);
    let bodies: Vec<&str> = outputs.iter().map(|o| o.body.as_str()).collect();
    assert!(bodies.contains(&"First tweet here"));
    assert!(bodies.contains(&"Third tweet here"));
}

#[tokio::test]
async fn publish_video_requires_connected_account() {
    let h = harness().await;
    h.seed_submission("user-1").await;
    h.store
        .create_video_job("vid-1", "https://videos.invalid/raw.mp4", "raw.mp4", "Acme", "casey")
        .await
        .unwrap();

    let payload = serde_json::json!({"record_id": "vid-1", "user_id": "user-1"});
    let err = h.context.publish_video(&payload).await.unwrap_err();
    assert!(crate::core::queue::is_fatal(&err));

    let token = h.vault.encrypt("refresh-token").unwrap();
    h.store
        .set_credential("user-1", super::YOUTUBE_PROVIDER, &token)
        .await
        .unwrap();
    let outcome = h.context.publish_video(&payload).await.unwrap();
    assert_eq!(
        outcome,
        super::TaskOutcome::Completed("published video vid-1 as yt-abc".to_string())
    );
}
