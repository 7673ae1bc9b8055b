//! Typed records for the tabular backing store. Translation to and from the
//! untyped row representation happens in the store impls only.

use serde::{Deserialize, Serialize};

/// A content request: transcript plus writing style, owned by a user.
/// Created externally and never mutated by the orchestrator.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub transcript: String,
    pub writing_style: String,
    pub model_override: Option<String>,
}

/// One generated post, created exactly once per successful generation task.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformOutputRecord {
    pub id: String,
    pub submission_id: String,
    pub user_id: Option<String>,
    pub platform: String,
    pub body: String,
    pub status: String,
}

pub const OUTPUT_STATUS_FOR_APPROVAL: &str = "For Approval";

/// Transient working record for the video pipeline. Each stage persists its
/// own fields as a checkpoint; a crash mid-pipeline leaves inspectable
/// partial progress.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJobRecord {
    pub record_id: String,
    pub video_url: String,
    pub file_name: String,
    pub customer_name: String,
    pub user_name: String,
    pub storage_ref: Option<String>,
    pub transcript: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub hook: Option<String>,
    pub image_url: Option<String>,
    pub hosted_image_url: Option<String>,
    pub status: String,
}

pub const VIDEO_STATUS_PROCESSING: &str = "processing";
pub const VIDEO_STATUS_FOR_REVIEW: &str = "for_review";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GeneratePost,
    ProcessVideo,
    SplitTweets,
    PublishVideo,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::GeneratePost => "generate_post",
            TaskKind::ProcessVideo => "process_video",
            TaskKind::SplitTweets => "split_tweets",
            TaskKind::PublishVideo => "publish_video",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "generate_post" => Some(TaskKind::GeneratePost),
            "process_video" => Some(TaskKind::ProcessVideo),
            "split_tweets" => Some(TaskKind::SplitTweets),
            "publish_video" => Some(TaskKind::PublishVideo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(TaskStatus::Queued),
            "running" => Some(TaskStatus::Running),
            "succeeded" => Some(TaskStatus::Succeeded),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// One asynchronously scheduled unit of orchestrator work, persisted so it is
/// resumable from its payload alone.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub task_id: String,
    pub kind: TaskKind,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub attempts: u32,
    /// Unix epoch seconds before which the task must not run.
    pub run_at: i64,
    pub summary: Option<String>,
    pub last_error: Option<String>,
}
