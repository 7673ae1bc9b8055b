use axum::{Json, extract::State};

use super::super::AppState;
use super::{ApiResponse, ok, required_field, required_field_aliased, server_error};
use crate::core::pipeline::LLM_PROVIDER;

/// Encrypt an API key through the vault and store the ciphertext against the
/// user. The plaintext is never persisted or echoed back.
pub async fn encrypt_key(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResponse {
    let (user_id, api_key) = match (
        required_field(&payload, "user_id"),
        required_field_aliased(&payload, &["api_key", "apiKey"]),
    ) {
        (Ok(u), Ok(k)) => (u, k),
        (Err(resp), _) => return resp,
        (_, Err(resp)) => return resp,
    };
    let provider = payload
        .get("provider")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(LLM_PROVIDER);

    let ciphertext = match state.vault.encrypt(api_key) {
        Ok(ct) => ct,
        Err(e) => return server_error(format!("Encryption failed: {:#}", e)),
    };
    match state
        .store
        .set_credential(user_id, provider, &ciphertext)
        .await
    {
        Ok(()) => ok(serde_json::json!({ "success": true })),
        Err(e) => server_error(format!("Failed to store credential: {:#}", e)),
    }
}
