use anyhow::{Result, anyhow};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;

use crate::config::OAuthSettings;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct TokenResponse {
    refresh_token: Option<String>,
    access_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn build_auth_url(settings: &OAuthSettings, state: &str) -> String {
    let scopes = settings.scopes.join(" ");

    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&access_type=offline&prompt=consent",
        settings.auth_url,
        urlencoding::encode(&settings.client_id),
        urlencoding::encode(&settings.redirect_uri),
        urlencoding::encode(&scopes),
        state
    )
}

/// Trade an authorization code for a refresh token. Offline access is
/// requested up front, so a missing refresh_token is an error.
pub async fn exchange_code(settings: &OAuthSettings, code: &str) -> Result<String> {
    let client = reqwest::Client::new();

    let params = [
        ("code", code.to_string()),
        ("client_id", settings.client_id.clone()),
        ("client_secret", settings.client_secret.clone()),
        ("redirect_uri", settings.redirect_uri.clone()),
        ("grant_type", "authorization_code".to_string()),
    ];

    let response = client
        .post(&settings.token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response body: {}", e))?;

    if !status.is_success() {
        return Err(anyhow!("Token exchange failed (HTTP {}): {}", status, body));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| anyhow!("Failed to parse token response: {}", e))?;

    if let Some(error) = token.error {
        let desc = token.error_description.unwrap_or_default();
        return Err(anyhow!("OAuth error: {} - {}", error, desc));
    }

    token
        .refresh_token
        .ok_or_else(|| anyhow!("No refresh_token in response. Response was: {}", body))
}
