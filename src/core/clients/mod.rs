pub mod imagegen;
pub mod imagehost;
pub mod llm;
pub mod publish;
pub mod scheduler;
pub mod storage;
pub mod transcription;

use crate::config::Config;
use std::sync::Arc;

use imagegen::{ImageJobApi, MidjourneyClient};
use imagehost::{ImageHostApi, OverlayHostClient};
use llm::{AnthropicClient, LlmApi};
use publish::{VideoPublishApi, YouTubeClient};
use scheduler::{MetricoolClient, SchedulerApi};
use storage::{DriveClient, StorageApi};
use transcription::{FfmpegSplitter, TranscriptionAdapter, WhisperClient};

const YOUTUBE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Every outbound integration behind its trait, shared across the worker and
/// the web handlers.
pub struct Clients {
    pub http: reqwest::Client,
    pub llm: Arc<dyn LlmApi>,
    pub image: Arc<dyn ImageJobApi>,
    pub image_host: Arc<dyn ImageHostApi>,
    pub transcription: Arc<TranscriptionAdapter>,
    pub storage: Arc<dyn StorageApi>,
    pub scheduler: Arc<dyn SchedulerApi>,
    pub publisher: Arc<dyn VideoPublishApi>,
}

impl Clients {
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            llm: Arc::new(AnthropicClient::new(config.llm_base_url.clone())),
            image: Arc::new(MidjourneyClient::new(
                config.image_api.base_url.clone(),
                config.image_api.api_key.clone(),
            )),
            image_host: Arc::new(OverlayHostClient::new(
                config.image_host.base_url.clone(),
                config.image_host.api_key.clone(),
            )),
            transcription: Arc::new(TranscriptionAdapter::new(
                Arc::new(FfmpegSplitter::new(config.scratch_dir.clone())),
                Arc::new(WhisperClient::new(
                    config.transcription.base_url.clone(),
                    config.transcription.api_key.clone(),
                )),
            )),
            storage: Arc::new(DriveClient::new(
                config.storage.base_url.clone(),
                config.storage.api_key.clone(),
                config.storage.root_folder_id.clone(),
            )),
            scheduler: Arc::new(MetricoolClient::new(
                config.scheduler.base_url.clone(),
                config.scheduler.api_key.clone(),
            )),
            publisher: Arc::new(YouTubeClient::new(
                config.oauth.token_url.clone(),
                YOUTUBE_UPLOAD_URL.to_string(),
                config.oauth.client_id.clone(),
                config.oauth.client_secret.clone(),
            )),
        }
    }
}
