use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::RecordStore;

impl RecordStore {
    /// Stored value must always be ciphertext produced by the vault.
    pub async fn set_credential(
        &self,
        user_id: &str,
        provider: &str,
        ciphertext: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO credentials (user_id, provider, ciphertext) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, provider) DO UPDATE SET ciphertext=excluded.ciphertext",
            params![user_id, provider, ciphertext],
        )?;
        Ok(())
    }

    pub async fn get_credential(&self, user_id: &str, provider: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let ciphertext = db
            .query_row(
                "SELECT ciphertext FROM credentials WHERE user_id = ?1 AND provider = ?2",
                params![user_id, provider],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ciphertext)
    }

    pub async fn put_oauth_state(&self, state: &str, user_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO oauth_states (state, user_id) VALUES (?1, ?2)",
            params![state, user_id],
        )?;
        Ok(())
    }

    /// Consume a pending OAuth state, returning the user it was issued for.
    /// A state can be taken once; replays find nothing.
    pub async fn take_oauth_state(&self, state: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let user_id: Option<String> = db
            .query_row(
                "SELECT user_id FROM oauth_states WHERE state = ?1",
                params![state],
                |row| row.get(0),
            )
            .optional()?;
        if user_id.is_some() {
            db.execute("DELETE FROM oauth_states WHERE state = ?1", params![state])?;
        }
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn credential_upsert_overwrites() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();

        store.set_credential("u1", "anthropic", "old").await.unwrap();
        store.set_credential("u1", "anthropic", "new").await.unwrap();
        assert_eq!(
            store.get_credential("u1", "anthropic").await.unwrap(),
            Some("new".to_string())
        );
    }

    #[tokio::test]
    async fn oauth_state_is_single_use() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();

        store.put_oauth_state("abc123", "u1").await.unwrap();
        assert_eq!(
            store.take_oauth_state("abc123").await.unwrap(),
            Some("u1".to_string())
        );
        assert_eq!(store.take_oauth_state("abc123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_state_yields_none() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.take_oauth_state("nope").await.unwrap(), None);
    }
}
