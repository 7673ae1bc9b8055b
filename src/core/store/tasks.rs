use anyhow::{Result, anyhow};
use rusqlite::{OptionalExtension, Row, params};

use super::RecordStore;
use super::types::{TaskKind, TaskRecord, TaskStatus};

const TASK_COLUMNS: &str = "task_id, kind, payload, status, attempts, run_at, summary, last_error";

/// Row image before kind/status/payload decoding.
struct RawTask {
    task_id: String,
    kind: String,
    payload: String,
    status: String,
    attempts: u32,
    run_at: i64,
    summary: Option<String>,
    last_error: Option<String>,
}

fn raw_task_from_row(row: &Row<'_>) -> rusqlite::Result<RawTask> {
    Ok(RawTask {
        task_id: row.get(0)?,
        kind: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        run_at: row.get(5)?,
        summary: row.get(6)?,
        last_error: row.get(7)?,
    })
}

fn decode_task(raw: RawTask) -> Result<TaskRecord> {
    Ok(TaskRecord {
        kind: TaskKind::from_str(&raw.kind)
            .ok_or_else(|| anyhow!("Unknown task kind: {}", raw.kind))?,
        status: TaskStatus::from_str(&raw.status)
            .ok_or_else(|| anyhow!("Unknown task status: {}", raw.status))?,
        payload: serde_json::from_str(&raw.payload)?,
        task_id: raw.task_id,
        attempts: raw.attempts,
        run_at: raw.run_at,
        summary: raw.summary,
        last_error: raw.last_error,
    })
}

impl RecordStore {
    pub async fn insert_task(
        &self,
        task_id: &str,
        kind: TaskKind,
        payload: &serde_json::Value,
        run_at: i64,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO tasks (task_id, kind, payload, status, attempts, run_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                task_id,
                kind.as_str(),
                payload.to_string(),
                TaskStatus::Queued.as_str(),
                run_at
            ],
        )?;
        Ok(())
    }

    /// Queued tasks whose run_at has passed, oldest first.
    pub async fn due_tasks(&self, now: i64, limit: usize) -> Result<Vec<TaskRecord>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM tasks WHERE status = ?1 AND run_at <= ?2 ORDER BY run_at LIMIT ?3",
            TASK_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(
            params![TaskStatus::Queued.as_str(), now, limit as i64],
            raw_task_from_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(decode_task(row?)?);
        }
        Ok(results)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let db = self.db.lock().await;
        let sql = format!("SELECT {} FROM tasks WHERE task_id = ?1", TASK_COLUMNS);
        let mut stmt = db.prepare(&sql)?;
        let raw = stmt
            .query_row(params![task_id], raw_task_from_row)
            .optional()?;
        raw.map(decode_task).transpose()
    }

    /// Claim a task for execution: mark it running and count the attempt.
    pub async fn mark_task_running(&self, task_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks
             SET status = ?2, attempts = attempts + 1, updated_at = CURRENT_TIMESTAMP
             WHERE task_id = ?1",
            params![task_id, TaskStatus::Running.as_str()],
        )?;
        Ok(())
    }

    pub async fn finish_task(
        &self,
        task_id: &str,
        status: TaskStatus,
        summary: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks
             SET status = ?2, summary = ?3, last_error = ?4, updated_at = CURRENT_TIMESTAMP
             WHERE task_id = ?1",
            params![task_id, status.as_str(), summary, last_error],
        )?;
        Ok(())
    }

    /// Return every claimed-but-unsettled task to the queue. A process that
    /// dies between claim and settle leaves rows running, and nothing else
    /// ever selects those. The interrupted claim keeps its attempt count.
    pub async fn requeue_running_tasks(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE tasks
             SET status = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE status = ?2",
            params![TaskStatus::Queued.as_str(), TaskStatus::Running.as_str()],
        )?;
        Ok(changed)
    }

    /// Put a failed attempt back in the queue with a new run_at.
    pub async fn reschedule_task(&self, task_id: &str, run_at: i64, last_error: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE tasks
             SET status = ?2, run_at = ?3, last_error = ?4, updated_at = CURRENT_TIMESTAMP
             WHERE task_id = ?1",
            params![task_id, TaskStatus::Queued.as_str(), run_at, last_error],
        )?;
        Ok(())
    }
}
