use axum::{Json, extract::State};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::super::AppState;
use super::{ApiResponse, bad_request, ok, required_field_aliased, server_error};
use crate::core::pipeline::enqueue_generation;
use crate::core::store::types::TaskKind;

enum RequestedSubmission {
    Explicit(String),
    Invalid,
    Absent,
}

/// The trigger's submission id arrives either as a plain string or wrapped
/// as `{"submission_id": {"submissionId": "..."}}`, depending on which
/// automation fires the webhook.
fn requested_submission(payload: &Value) -> RequestedSubmission {
    let Some(value) = payload
        .get("submission_id")
        .or_else(|| payload.get("submissionId"))
    else {
        return RequestedSubmission::Absent;
    };
    let id = value
        .as_str()
        .or_else(|| value.get("submissionId").and_then(Value::as_str))
        .filter(|s| !s.is_empty());
    match id {
        Some(id) => RequestedSubmission::Explicit(id.to_string()),
        None => RequestedSubmission::Invalid,
    }
}

/// Queue one generation task per requested platform. The response returns as
/// soon as the tasks are persisted; generation happens in the worker.
pub async fn generate_content(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    // An explicit submission id wins; with none named at all, fall back to
    // the newest submission, matching how manual triggers are used in
    // practice. A present-but-malformed id is the caller's bug.
    let submission_id = match requested_submission(&payload) {
        RequestedSubmission::Explicit(id) => id,
        RequestedSubmission::Invalid => return bad_request("Invalid submission id"),
        RequestedSubmission::Absent => match state.store.latest_submission().await {
            Ok(Some(submission)) => submission.id,
            Ok(None) => return bad_request("No submission to generate for"),
            Err(e) => return server_error(format!("Failed to look up submission: {:#}", e)),
        },
    };

    // Callers may narrow the platform list; default is every configured one.
    let platforms: Vec<String> = match payload.get("platforms").and_then(|v| v.as_array()) {
        Some(values) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        None => state.config.platforms.clone(),
    };
    if platforms.is_empty() {
        return bad_request("No platforms to generate for");
    }

    match enqueue_generation(
        &state.queue,
        &submission_id,
        &platforms,
        state.config.stagger_secs,
    )
    .await
    {
        Ok(task_ids) => {
            info!(
                "Queued {} generation tasks for submission {}",
                task_ids.len(),
                submission_id
            );
            ok(serde_json::json!({ "success": true, "task_ids": task_ids }))
        }
        Err(e) => server_error(format!("Failed to queue generation: {:#}", e)),
    }
}

pub async fn split_out_tweets(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    let output_id = match required_field_aliased(&payload, &["output_id", "twitter_record_id"]) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match state
        .queue
        .enqueue(
            TaskKind::SplitTweets,
            serde_json::json!({ "output_id": output_id }),
            Duration::ZERO,
        )
        .await
    {
        Ok(task_id) => ok(serde_json::json!({ "success": true, "task_id": task_id })),
        Err(e) => server_error(format!("Failed to queue tweet split: {:#}", e)),
    }
}
