use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::RecordStore;
use super::types::{OUTPUT_STATUS_FOR_APPROVAL, PlatformOutputRecord};

impl RecordStore {
    /// Persist one generated post under the exact platform name it was
    /// generated for. Returns the new row id.
    pub async fn create_platform_output(
        &self,
        submission_id: &str,
        user_id: Option<&str>,
        platform: &str,
        body: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO platform_outputs (id, submission_id, user_id, platform, body, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                submission_id,
                user_id,
                platform,
                body,
                OUTPUT_STATUS_FOR_APPROVAL
            ],
        )?;
        Ok(id)
    }

    pub async fn get_platform_output(&self, id: &str) -> Result<Option<PlatformOutputRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, submission_id, user_id, platform, body, status
             FROM platform_outputs WHERE id = ?1",
        )?;
        let record = stmt
            .query_row(params![id], |row| {
                Ok(PlatformOutputRecord {
                    id: row.get(0)?,
                    submission_id: row.get(1)?,
                    user_id: row.get(2)?,
                    platform: row.get(3)?,
                    body: row.get(4)?,
                    status: row.get(5)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    pub async fn outputs_for_submission(
        &self,
        submission_id: &str,
    ) -> Result<Vec<PlatformOutputRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, submission_id, user_id, platform, body, status
             FROM platform_outputs WHERE submission_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![submission_id], |row| {
            Ok(PlatformOutputRecord {
                id: row.get(0)?,
                submission_id: row.get(1)?,
                user_id: row.get(2)?,
                platform: row.get(3)?,
                body: row.get(4)?,
                status: row.get(5)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_rows_keep_exact_platform_name_and_approval_status() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();

        let id = store
            .create_platform_output("sub1", Some("u1"), "LinkedIn Articles", "post body")
            .await
            .unwrap();

        let row = store.get_platform_output(&id).await.unwrap().unwrap();
        assert_eq!(row.platform, "LinkedIn Articles");
        assert_eq!(row.status, OUTPUT_STATUS_FOR_APPROVAL);
        assert_eq!(row.user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn outputs_for_submission_are_scoped() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();

        store
            .create_platform_output("sub1", None, "Twitter", "a")
            .await
            .unwrap();
        store
            .create_platform_output("sub2", None, "Twitter", "b")
            .await
            .unwrap();

        let rows = store.outputs_for_submission("sub1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, "a");
    }
}
