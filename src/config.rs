use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_PLATFORMS: &str =
    "LinkedIn Articles,Twitter,Facebook,Instagram,YouTube,Pinterest,Blogs";

/// Base URL + API key pair for one external service.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub base_url: String,
    pub api_key: String,
    /// Folder id under which per-customer upload paths are created.
    pub root_folder_id: String,
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Process configuration, sourced from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub scratch_dir: PathBuf,
    /// Process-wide secret keying the credential vault. Rotating it
    /// invalidates every stored ciphertext.
    pub vault_secret: String,
    pub default_model: String,
    pub platforms: Vec<String>,
    /// Seconds between staggered per-platform generation tasks.
    pub stagger_secs: u64,
    pub llm_base_url: String,
    pub transcription: ServiceEndpoint,
    pub image_api: ServiceEndpoint,
    pub image_host: ServiceEndpoint,
    pub scheduler: ServiceEndpoint,
    pub storage: StorageSettings,
    pub oauth: OAuthSettings,
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("Missing required env var {}", name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let platforms = optional("PLATFORMS", DEFAULT_PLATFORMS)
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            bind_addr: optional("POSTFORGE_BIND", "127.0.0.1:8080"),
            database_path: PathBuf::from(optional("POSTFORGE_DB", "postforge.db")),
            scratch_dir: PathBuf::from(optional("POSTFORGE_SCRATCH", "tmp")),
            vault_secret: required("ENCRYPTION_KEY")?,
            default_model: optional("LLM_MODEL", "claude-3-5-sonnet-latest"),
            platforms,
            stagger_secs: optional("GENERATION_STAGGER_SECS", "10")
                .parse()
                .context("GENERATION_STAGGER_SECS must be an integer")?,
            llm_base_url: optional("LLM_BASE_URL", "https://api.anthropic.com"),
            transcription: ServiceEndpoint {
                base_url: optional("TRANSCRIPTION_BASE_URL", "https://api.openai.com"),
                api_key: required("TRANSCRIPTION_API_KEY")?,
            },
            image_api: ServiceEndpoint {
                base_url: optional("IMAGE_API_BASE_URL", "https://api.midjourneyapi.xyz"),
                api_key: required("IMAGE_API_KEY")?,
            },
            image_host: ServiceEndpoint {
                base_url: required("IMAGE_HOST_BASE_URL")?,
                api_key: required("IMAGE_HOST_API_KEY")?,
            },
            scheduler: ServiceEndpoint {
                base_url: optional("SCHEDULER_BASE_URL", "https://app.metricool.com/api"),
                api_key: required("SCHEDULER_USER_TOKEN")?,
            },
            storage: StorageSettings {
                base_url: required("STORAGE_BASE_URL")?,
                api_key: required("STORAGE_API_KEY")?,
                root_folder_id: required("STORAGE_ROOT_FOLDER_ID")?,
            },
            oauth: OAuthSettings {
                client_id: required("OAUTH_CLIENT_ID")?,
                client_secret: required("OAUTH_CLIENT_SECRET")?,
                auth_url: optional(
                    "OAUTH_AUTH_URL",
                    "https://accounts.google.com/o/oauth2/v2/auth",
                ),
                token_url: optional("OAUTH_TOKEN_URL", "https://oauth2.googleapis.com/token"),
                redirect_uri: required("OAUTH_REDIRECT_URI")?,
                scopes: vec!["https://www.googleapis.com/auth/youtube.upload".to_string()],
            },
        })
    }
}

#[cfg(test)]
impl Config {
    /// Offline configuration for tests. Every endpoint points at a .invalid
    /// host so an accidental network call fails fast.
    pub(crate) fn for_tests(scratch_dir: PathBuf) -> Self {
        let endpoint = |name: &str| ServiceEndpoint {
            base_url: format!("https://{}.invalid", name),
            api_key: "test-key".to_string(),
        };
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            database_path: PathBuf::from(":memory:"),
            scratch_dir,
            vault_secret: "pipeline-test-secret".to_string(),
            default_model: "test-model".to_string(),
            platforms: vec!["Twitter".to_string(), "Facebook".to_string()],
            stagger_secs: 0,
            llm_base_url: "https://llm.invalid".to_string(),
            transcription: endpoint("transcription"),
            image_api: endpoint("images"),
            image_host: endpoint("imagehost"),
            scheduler: endpoint("scheduler"),
            storage: StorageSettings {
                base_url: "https://storage.invalid".to_string(),
                api_key: "test-key".to_string(),
                root_folder_id: "root".to_string(),
            },
            oauth: OAuthSettings {
                client_id: "cid".to_string(),
                client_secret: "cs".to_string(),
                auth_url: "https://oauth.invalid/auth".to_string(),
                token_url: "https://oauth.invalid/token".to_string(),
                redirect_uri: "https://app.invalid/cb".to_string(),
                scopes: vec!["upload".to_string()],
            },
        }
    }
}
