mod credentials;
mod outputs;
mod submissions;
mod tasks;
pub mod types;
mod users;
mod video_jobs;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Single source of truth for all durable state. The orchestrator itself
/// holds nothing in memory that is not recoverable from here.
pub struct RecordStore {
    db: Arc<Mutex<Connection>>,
}

impl RecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path.as_ref())?;
        let store = Self {
            db: Arc::new(Mutex::new(db)),
        };
        info!("Record store opened at {}", path.as_ref().display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub async fn initialize(&self) -> Result<()> {
        let db = self.db.lock().await;

        db.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                transcript TEXT NOT NULL DEFAULT '',
                writing_style TEXT NOT NULL DEFAULT '',
                model_override TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS platform_prompts (
                user_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                prompt TEXT NOT NULL,
                PRIMARY KEY (user_id, platform)
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS platform_strategies (
                user_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                text TEXT NOT NULL,
                PRIMARY KEY (user_id, platform)
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS credentials (
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                ciphertext TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, provider)
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS platform_outputs (
                id TEXT PRIMARY KEY,
                submission_id TEXT NOT NULL,
                user_id TEXT,
                platform TEXT NOT NULL,
                body TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS video_jobs (
                record_id TEXT PRIMARY KEY,
                video_url TEXT NOT NULL,
                file_name TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                user_name TEXT NOT NULL,
                storage_ref TEXT,
                transcript TEXT,
                title TEXT,
                description TEXT,
                hook TEXT,
                image_url TEXT,
                hosted_image_url TEXT,
                status TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                run_at INTEGER NOT NULL,
                summary TEXT,
                last_error TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_status_run_at ON tasks(status, run_at)",
            [],
        )?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_outputs_submission ON platform_outputs(submission_id)",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS oauth_states (
                state TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(())
    }
}
