use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use std::collections::HashMap;
use tracing::info;

use super::super::AppState;
use super::{ApiResponse, bad_request, ok, server_error};
use crate::core::oauth;
use crate::core::pipeline::YOUTUBE_PROVIDER;

/// Start the consent flow: mint a state token bound to the user and send the
/// browser to the provider's consent page.
pub async fn authorize(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(user_id) = params
        .get("user_record_id")
        .or_else(|| params.get("user_id"))
        .filter(|v| !v.is_empty())
    else {
        return bad_request("Missing required field 'user_record_id'").into_response();
    };

    let oauth_state = oauth::generate_state();
    if let Err(e) = state.store.put_oauth_state(&oauth_state, user_id).await {
        return server_error(format!("Failed to persist OAuth state: {:#}", e)).into_response();
    }
    let auth_url = oauth::build_auth_url(&state.config.oauth, &oauth_state);
    Redirect::temporary(&auth_url).into_response()
}

/// Consent callback. The state token is single-use; an unknown or replayed
/// state is rejected outright.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResponse {
    let (Some(oauth_state), Some(code)) = (
        params.get("state").filter(|v| !v.is_empty()),
        params.get("code").filter(|v| !v.is_empty()),
    ) else {
        return bad_request("Missing 'state' or 'code'");
    };

    let user_id = match state.store.take_oauth_state(oauth_state).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return bad_request("Unknown or expired OAuth state"),
        Err(e) => return server_error(format!("Failed to check OAuth state: {:#}", e)),
    };

    let refresh_token = match oauth::exchange_code(&state.config.oauth, code).await {
        Ok(token) => token,
        Err(e) => return bad_request(format!("{:#}", e)),
    };

    let ciphertext = match state.vault.encrypt(&refresh_token) {
        Ok(ct) => ct,
        Err(e) => return server_error(format!("Encryption failed: {:#}", e)),
    };
    if let Err(e) = state
        .store
        .set_credential(&user_id, YOUTUBE_PROVIDER, &ciphertext)
        .await
    {
        return server_error(format!("Failed to store credential: {:#}", e));
    }
    info!("Connected YouTube account for user {}", user_id);
    ok(serde_json::json!({ "success": true, "message": "YouTube account connected" }))
}
