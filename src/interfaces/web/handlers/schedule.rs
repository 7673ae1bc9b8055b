use axum::{Json, extract::State};

use super::super::AppState;
use super::{ApiResponse, bad_request, ok, required_field};

/// Pull an optional string-array field, accepting legacy spellings.
fn string_list(payload: &serde_json::Value, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .find_map(|name| payload.get(name).and_then(|v| v.as_array()))
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Scheduling is synchronous: the scheduler either accepts the post or the
/// caller gets the rejection back as a 400. An explicit `publish_at` puts
/// the post on the calendar; without one it lands on the named list.
pub async fn schedule_post(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    let (platform, blog_id, user_id, list_id, text) = match (
        required_field(&payload, "platform"),
        required_field(&payload, "blog_id"),
        required_field(&payload, "user_id"),
        required_field(&payload, "list_id"),
        required_field(&payload, "text"),
    ) {
        (Ok(p), Ok(b), Ok(u), Ok(l), Ok(t)) => (p, b, u, l, t),
        (Err(resp), ..) => return resp,
        (_, Err(resp), ..) => return resp,
        (_, _, Err(resp), ..) => return resp,
        (_, _, _, Err(resp), _) => return resp,
        (_, _, _, _, Err(resp)) => return resp,
    };
    let media_urls = string_list(&payload, &["media_urls", "pictures"]);

    let sent = match payload
        .get("publish_at")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    {
        Some(publish_at) => {
            state
                .clients
                .scheduler
                .schedule_post(blog_id, user_id, platform, text, &media_urls, publish_at)
                .await
        }
        None => {
            state
                .clients
                .scheduler
                .post_to_list(blog_id, user_id, list_id, text, &media_urls)
                .await
        }
    };
    match sent {
        Ok(()) => ok(serde_json::json!({ "success": true })),
        Err(e) => bad_request(format!("{:#}", e)),
    }
}

pub async fn post_to_list(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    let (blog_id, user_id, list_id, text) = match (
        required_field(&payload, "blog_id"),
        required_field(&payload, "user_id"),
        required_field(&payload, "list_id"),
        required_field(&payload, "text"),
    ) {
        (Ok(b), Ok(u), Ok(l), Ok(t)) => (b, u, l, t),
        (Err(resp), ..) => return resp,
        (_, Err(resp), ..) => return resp,
        (_, _, Err(resp), _) => return resp,
        (_, _, _, Err(resp)) => return resp,
    };
    let pictures = string_list(&payload, &["media_urls", "pictures"]);

    match state
        .clients
        .scheduler
        .post_to_list(blog_id, user_id, list_id, text, &pictures)
        .await
    {
        Ok(()) => ok(serde_json::json!({ "success": true })),
        Err(e) => bad_request(format!("{:#}", e)),
    }
}
