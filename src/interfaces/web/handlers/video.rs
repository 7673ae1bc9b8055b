use axum::{Json, extract::State};
use std::time::Duration;

use super::super::AppState;
use super::{ApiResponse, ok, required_field, required_field_aliased, server_error};
use crate::core::store::types::TaskKind;

/// Queue the full video pipeline for one source video. Re-posting the same
/// record resumes from its persisted checkpoints.
pub async fn process_video(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    let (record_id, video_url, file_name, customer_name, user_name) = match (
        required_field(&payload, "record_id"),
        required_field(&payload, "video_url"),
        required_field_aliased(&payload, &["file_name", "filename"]),
        required_field(&payload, "customer_name"),
        required_field(&payload, "user_name"),
    ) {
        (Ok(r), Ok(v), Ok(f), Ok(c), Ok(un)) => (r, v, f, c, un),
        (Err(resp), ..) => return resp,
        (_, Err(resp), ..) => return resp,
        (_, _, Err(resp), ..) => return resp,
        (_, _, _, Err(resp), _) => return resp,
        (_, _, _, _, Err(resp)) => return resp,
    };

    // Re-key under canonical names so the task payload is uniform. A user id
    // is optional here; the pipeline resolves one from user_name when absent.
    let mut task_payload = serde_json::json!({
        "record_id": record_id,
        "video_url": video_url,
        "file_name": file_name,
        "customer_name": customer_name,
        "user_name": user_name,
    });
    if let Some(user_id) = payload
        .get("user_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    {
        task_payload["user_id"] = serde_json::Value::String(user_id.to_string());
    }
    match state
        .queue
        .enqueue(TaskKind::ProcessVideo, task_payload, Duration::ZERO)
        .await
    {
        Ok(task_id) => ok(serde_json::json!({ "success": true, "task_id": task_id })),
        Err(e) => server_error(format!("Failed to queue video processing: {:#}", e)),
    }
}

pub async fn upload_to_youtube(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    let (record_id, user_id) = match (
        required_field_aliased(&payload, &["record_id", "video_record_id"]),
        required_field_aliased(&payload, &["user_id", "user_record_id"]),
    ) {
        (Ok(r), Ok(u)) => (r, u),
        (Err(resp), _) => return resp,
        (_, Err(resp)) => return resp,
    };

    match state
        .queue
        .enqueue(
            TaskKind::PublishVideo,
            serde_json::json!({ "record_id": record_id, "user_id": user_id }),
            Duration::ZERO,
        )
        .await
    {
        Ok(task_id) => ok(serde_json::json!({ "success": true, "task_id": task_id })),
        Err(e) => server_error(format!("Failed to queue video publish: {:#}", e)),
    }
}
