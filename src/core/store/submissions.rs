use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::RecordStore;
use super::types::SubmissionRecord;

/// Aliased platform names map to a canonical name for template lookup only;
/// output rows keep the platform name exactly as submitted.
pub fn normalize_platform_alias(platform: &str) -> &str {
    match platform {
        "LinkedIn Articles" => "LinkedIn",
        "YouTube Shorts" => "YouTube",
        other => other,
    }
}

impl RecordStore {
    pub async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, transcript, writing_style, model_override
             FROM submissions WHERE id = ?1",
        )?;
        let record = stmt
            .query_row(params![id], |row| {
                Ok(SubmissionRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    transcript: row.get(2)?,
                    writing_style: row.get(3)?,
                    model_override: row.get(4)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    /// Most recently created submission, if any. Triggers that name no
    /// submission operate on the newest one.
    pub async fn latest_submission(&self) -> Result<Option<SubmissionRecord>> {
        let db = self.db.lock().await;
        let record = db
            .query_row(
                "SELECT id, user_id, transcript, writing_style, model_override
                 FROM submissions ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok(SubmissionRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        transcript: row.get(2)?,
                        writing_style: row.get(3)?,
                        model_override: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Submissions are created by user action outside the orchestrator; this
    /// write path exists for seeding and tests.
    #[allow(dead_code)]
    pub async fn create_submission(&self, record: &SubmissionRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO submissions (id, user_id, transcript, writing_style, model_override)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.user_id,
                record.transcript,
                record.writing_style,
                record.model_override
            ],
        )?;
        Ok(())
    }

    pub async fn get_platform_prompt(
        &self,
        user_id: &str,
        platform: &str,
    ) -> Result<Option<String>> {
        let platform = normalize_platform_alias(platform);
        let db = self.db.lock().await;
        let prompt = db
            .query_row(
                "SELECT prompt FROM platform_prompts WHERE user_id = ?1 AND platform = ?2",
                params![user_id, platform],
                |row| row.get(0),
            )
            .optional()?;
        Ok(prompt)
    }

    pub async fn get_platform_strategy(
        &self,
        user_id: &str,
        platform: &str,
    ) -> Result<Option<String>> {
        let platform = normalize_platform_alias(platform);
        let db = self.db.lock().await;
        let text = db
            .query_row(
                "SELECT text FROM platform_strategies WHERE user_id = ?1 AND platform = ?2",
                params![user_id, platform],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text)
    }

    #[allow(dead_code)]
    pub async fn set_platform_prompt(
        &self,
        user_id: &str,
        platform: &str,
        prompt: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO platform_prompts (user_id, platform, prompt)
             VALUES (?1, ?2, ?3)",
            params![user_id, platform, prompt],
        )?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn set_platform_strategy(
        &self,
        user_id: &str,
        platform: &str,
        text: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO platform_strategies (user_id, platform, text)
             VALUES (?1, ?2, ?3)",
            params![user_id, platform, text],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkedin_articles_aliases_to_linkedin() {
        assert_eq!(normalize_platform_alias("LinkedIn Articles"), "LinkedIn");
    }

    #[test]
    fn unaliased_platforms_pass_through() {
        assert_eq!(normalize_platform_alias("Twitter"), "Twitter");
        assert_eq!(normalize_platform_alias("Blogs"), "Blogs");
    }

    #[tokio::test]
    async fn prompt_lookup_uses_alias_but_storage_is_canonical() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();
        store
            .set_platform_prompt("u1", "LinkedIn", "Write an article about {transcript}")
            .await
            .unwrap();

        let via_alias = store
            .get_platform_prompt("u1", "LinkedIn Articles")
            .await
            .unwrap();
        assert!(via_alias.is_some());
    }

    #[tokio::test]
    async fn missing_submission_returns_none() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();
        assert!(store.get_submission("ghost").await.unwrap().is_none());
    }
}
