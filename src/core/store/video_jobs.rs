//! Video job checkpoints. Each pipeline stage owns a disjoint set of columns
//! and writes them exactly once, so concurrent stage re-runs cannot clobber
//! each other's progress.

use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::RecordStore;
use super::types::{VIDEO_STATUS_PROCESSING, VideoJobRecord};

impl RecordStore {
    /// Create the working record for a video job, or leave an existing one
    /// untouched so a re-run keeps its checkpoints.
    pub async fn create_video_job(
        &self,
        record_id: &str,
        video_url: &str,
        file_name: &str,
        customer_name: &str,
        user_name: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR IGNORE INTO video_jobs
               (record_id, video_url, file_name, customer_name, user_name, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record_id,
                video_url,
                file_name,
                customer_name,
                user_name,
                VIDEO_STATUS_PROCESSING
            ],
        )?;
        Ok(())
    }

    pub async fn get_video_job(&self, record_id: &str) -> Result<Option<VideoJobRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT record_id, video_url, file_name, customer_name, user_name,
                    storage_ref, transcript, title, description, hook,
                    image_url, hosted_image_url, status
             FROM video_jobs WHERE record_id = ?1",
        )?;
        let record = stmt
            .query_row(params![record_id], |row| {
                Ok(VideoJobRecord {
                    record_id: row.get(0)?,
                    video_url: row.get(1)?,
                    file_name: row.get(2)?,
                    customer_name: row.get(3)?,
                    user_name: row.get(4)?,
                    storage_ref: row.get(5)?,
                    transcript: row.get(6)?,
                    title: row.get(7)?,
                    description: row.get(8)?,
                    hook: row.get(9)?,
                    image_url: row.get(10)?,
                    hosted_image_url: row.get(11)?,
                    status: row.get(12)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    pub async fn set_video_storage_ref(&self, record_id: &str, storage_ref: &str) -> Result<()> {
        self.update_video_field(record_id, "storage_ref", storage_ref)
            .await
    }

    pub async fn set_video_transcript(&self, record_id: &str, transcript: &str) -> Result<()> {
        self.update_video_field(record_id, "transcript", transcript)
            .await
    }

    pub async fn set_video_copy(
        &self,
        record_id: &str,
        title: &str,
        description: &str,
        hook: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE video_jobs
             SET title = ?2, description = ?3, hook = ?4, updated_at = CURRENT_TIMESTAMP
             WHERE record_id = ?1",
            params![record_id, title, description, hook],
        )?;
        Ok(())
    }

    pub async fn set_video_image_url(&self, record_id: &str, image_url: &str) -> Result<()> {
        self.update_video_field(record_id, "image_url", image_url)
            .await
    }

    pub async fn set_video_hosted_image_url(&self, record_id: &str, url: &str) -> Result<()> {
        self.update_video_field(record_id, "hosted_image_url", url)
            .await
    }

    pub async fn set_video_job_status(&self, record_id: &str, status: &str) -> Result<()> {
        self.update_video_field(record_id, "status", status).await
    }

    async fn update_video_field(&self, record_id: &str, column: &str, value: &str) -> Result<()> {
        // Column names come from the fixed set above, never from input.
        let sql = format!(
            "UPDATE video_jobs SET {} = ?2, updated_at = CURRENT_TIMESTAMP WHERE record_id = ?1",
            column
        );
        let db = self.db.lock().await;
        db.execute(&sql, params![record_id, value])?;
        Ok(())
    }
}
