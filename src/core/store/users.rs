use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::RecordStore;

impl RecordStore {
    /// User rows are provisioned outside the orchestrator; this write path
    /// exists for seeding and tests.
    #[allow(dead_code)]
    pub async fn upsert_user(&self, id: &str, name: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO users (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![id, name],
        )?;
        Ok(())
    }

    /// Resolve a user's record id from their display name. Video triggers
    /// carry the name; the id is only known to the record store.
    pub async fn find_user_by_name(&self, name: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let id = db
            .query_row(
                "SELECT id FROM users WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}
