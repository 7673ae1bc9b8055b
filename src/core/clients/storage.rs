use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::multipart;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Fetch the source video into local scratch storage. Non-success responses
/// are a resource failure the caller surfaces without retry.
pub async fn download_to_scratch(
    client: &Client,
    url: &str,
    scratch_dir: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    let res = client.get(url).send().await?;
    if !res.status().is_success() {
        return Err(anyhow!(
            "Failed to download video from {} (HTTP {})",
            url,
            res.status()
        ));
    }
    let bytes = res.bytes().await?;

    tokio::fs::create_dir_all(scratch_dir).await?;
    let path = scratch_dir.join(file_name);
    tokio::fs::write(&path, &bytes).await?;
    Ok(path)
}

#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Upload a local video under `folder_path` (slash-separated, created as
    /// needed, with a dated leaf folder appended). Returns the storage
    /// reference of the uploaded file.
    async fn upload_video(&self, local: &Path, file_name: &str, folder_path: &str)
    -> Result<String>;
}

// --- Drive-style HTTP implementation ---

#[derive(Deserialize)]
struct FileList {
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    id: String,
}

pub struct DriveClient {
    client: Client,
    base_url: String,
    api_key: String,
    root_folder_id: String,
}

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

impl DriveClient {
    pub fn new(base_url: String, api_key: String, root_folder_id: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            root_folder_id,
        }
    }

    async fn find_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>> {
        let query = format!(
            "name='{}' and parents='{}' and mimeType='{}'",
            name, parent_id, FOLDER_MIME
        );
        let res = self
            .client
            .get(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!("Folder lookup failed (HTTP {})", res.status()));
        }
        let list: FileList = res.json().await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn ensure_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        if let Some(id) = self.find_folder(parent_id, name).await? {
            return Ok(id);
        }
        let res = self
            .client
            .post(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [parent_id],
            }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!("Folder creation failed (HTTP {})", res.status()));
        }
        let created: FileRef = res.json().await?;
        Ok(created.id)
    }
}

#[async_trait]
impl StorageApi for DriveClient {
    async fn upload_video(
        &self,
        local: &Path,
        file_name: &str,
        folder_path: &str,
    ) -> Result<String> {
        let mut parent_id = self.root_folder_id.clone();
        for segment in folder_path.split('/').filter(|s| !s.is_empty()) {
            parent_id = self.ensure_folder(&parent_id, segment).await?;
        }
        let dated = Utc::now().format("%Y_%m_%d").to_string();
        parent_id = self.ensure_folder(&parent_id, &dated).await?;

        let metadata = serde_json::json!({
            "name": file_name,
            "parents": [parent_id],
        });
        let mime = mime_guess::from_path(local).first_or_octet_stream();
        let bytes = tokio::fs::read(local).await?;
        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part(
                "file",
                multipart::Part::bytes(bytes)
                    .file_name(file_name.to_string())
                    .mime_str(mime.as_ref())?,
            );

        let res = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .multipart(form)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!("Video upload failed (HTTP {})", res.status()));
        }
        let uploaded: FileRef = res.json().await?;
        Ok(uploaded.id)
    }
}
