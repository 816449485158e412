//! SQLite-backed session store.
//!
//! Two flat, append-mostly tables: one row per verification session, one row
//! per challenge round. A session row is inserted at `stage_reached = 0`
//! when the connection starts and updated in place as stages complete, so
//! history queries always see a row even for sessions that never finish.

use chrono::Utc;
use dpp_domain::{ChallengeRoundRow, SessionRow, Timings};
use dpp_ports::{SessionStore, SessionStoreError};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tracing::{debug, instrument};

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` (e.g. `sqlite://dpp.db` or `sqlite::memory:`)
    /// and run the schema migration.
    pub async fn connect(database_url: &str) -> Result<Self, SessionStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| SessionStoreError::ConnectionError {
                message: e.to_string(),
            })?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                stage_reached INTEGER NOT NULL,
                timestamp REAL NOT NULL,
                timings TEXT NOT NULL,
                passed INTEGER NOT NULL,
                reject_reason TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS challenge_rounds (
                session_id INTEGER NOT NULL,
                round_num INTEGER NOT NULL,
                challenge_text TEXT NOT NULL,
                response_text TEXT NOT NULL,
                correct INTEGER NOT NULL,
                response_time_s REAL NOT NULL,
                PRIMARY KEY (session_id, round_num)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_agent_id ON sessions(agent_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| SessionStoreError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self, timings), fields(agent_id = %agent_id))]
    async fn insert_session(
        &self,
        agent_id: &str,
        stage_reached: u8,
        timestamp: f64,
        timings: &Timings,
        passed: bool,
        reject_reason: Option<&str>,
    ) -> Result<i64, SessionStoreError> {
        let timings_json =
            serde_json::to_string(timings).map_err(|e| SessionStoreError::SerializationError {
                message: e.to_string(),
            })?;

        let result = sqlx::query(
            r#"
            INSERT INTO sessions (agent_id, stage_reached, timestamp, timings, passed, reject_reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(agent_id)
        .bind(stage_reached as i64)
        .bind(timestamp)
        .bind(timings_json)
        .bind(passed)
        .bind(reject_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        let id = result.last_insert_rowid();
        debug!(session_id = id, "session row inserted");
        Ok(id)
    }

    #[instrument(skip(self, timings), fields(session_id = id))]
    async fn update_session(
        &self,
        id: i64,
        stage_reached: u8,
        timings: &Timings,
        passed: bool,
        reject_reason: Option<&str>,
    ) -> Result<(), SessionStoreError> {
        let timings_json =
            serde_json::to_string(timings).map_err(|e| SessionStoreError::SerializationError {
                message: e.to_string(),
            })?;

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET stage_reached = ?1, timings = ?2, passed = ?3, reject_reason = ?4
            WHERE id = ?5
            "#,
        )
        .bind(stage_reached as i64)
        .bind(timings_json)
        .bind(passed)
        .bind(reject_reason)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        if result.rows_affected() == 0 {
            return Err(SessionStoreError::NotFound { id });
        }
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = session_id, round_num = round_num))]
    async fn insert_challenge_round(
        &self,
        session_id: i64,
        round_num: u32,
        challenge_text: &str,
        response_text: &str,
        correct: bool,
        response_time_s: f64,
    ) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            INSERT INTO challenge_rounds
                (session_id, round_num, challenge_text, response_text, correct, response_time_s)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(session_id)
        .bind(round_num as i64)
        .bind(challenge_text)
        .bind(response_text)
        .bind(correct)
        .bind(response_time_s)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::ConnectionError {
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn fetch_sessions_by_agent(
        &self,
        agent_id: &str,
    ) -> Result<Vec<SessionRow>, SessionStoreError> {
        let rows = sqlx::query(
            "SELECT id, agent_id, stage_reached, timestamp, timings, passed, reject_reason \
             FROM sessions WHERE agent_id = ?1 ORDER BY timestamp ASC",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        rows.into_iter().map(row_to_session).collect()
    }

    async fn fetch_challenge_history(
        &self,
        session_id: i64,
    ) -> Result<Vec<ChallengeRoundRow>, SessionStoreError> {
        let rows = sqlx::query(
            "SELECT session_id, round_num, challenge_text, response_text, correct, response_time_s \
             FROM challenge_rounds WHERE session_id = ?1 ORDER BY round_num ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        Ok(rows
            .into_iter()
            .map(|row| ChallengeRoundRow {
                session_id: row.get::<i64, _>("session_id"),
                round_num: row.get::<i64, _>("round_num") as u32,
                challenge_text: row.get("challenge_text"),
                response_text: row.get("response_text"),
                correct: row.get("correct"),
                response_time_s: row.get("response_time_s"),
            })
            .collect())
    }
}

fn row_to_session(row: sqlx::sqlite::SqliteRow) -> Result<SessionRow, SessionStoreError> {
    let timings_text: String = row.get("timings");
    let timings: Timings =
        serde_json::from_str(&timings_text).map_err(|e| SessionStoreError::SerializationError {
            message: e.to_string(),
        })?;
    Ok(SessionRow {
        id: row.get("id"),
        agent_id: row.get("agent_id"),
        stage_reached: row.get::<i64, _>("stage_reached") as u8,
        timestamp: row.get("timestamp"),
        timings,
        passed: row.get("passed"),
        reject_reason: row.get("reject_reason"),
    })
}

/// Current wall-clock time as a Unix timestamp in seconds, matching the
/// `timestamp` column's unit.
pub fn unix_timestamp_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    async fn test_store() -> SqliteSessionStore {
        SqliteSessionStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn inserts_and_fetches_a_session() {
        let store = test_store().await;
        let id = store
            .insert_session("agent-1", 0, unix_timestamp_now(), &Timings::new(), false, None)
            .await
            .unwrap();
        assert!(id > 0);

        let sessions = store.fetch_sessions_by_agent("agent-1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].stage_reached, 0);
    }

    #[tokio::test]
    async fn update_session_persists_final_verdict() {
        let store = test_store().await;
        let id = store
            .insert_session("agent-2", 0, unix_timestamp_now(), &Timings::new(), false, Some("in_progress"))
            .await
            .unwrap();

        let mut timings = BTreeMap::new();
        timings.insert("stage1".to_string(), serde_json::json!(0.42));
        store
            .update_session(id, 4, &timings, true, None)
            .await
            .unwrap();

        let sessions = store.fetch_sessions_by_agent("agent-2").await.unwrap();
        assert!(sessions[0].passed);
        assert_eq!(sessions[0].stage_reached, 4);
        assert!(sessions[0].reject_reason.is_none());
    }

    #[tokio::test]
    async fn update_unknown_session_returns_not_found() {
        let store = test_store().await;
        let err = store
            .update_session(999, 1, &Timings::new(), false, Some("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionStoreError::NotFound { id: 999 }));
    }

    #[tokio::test]
    async fn migrates_and_persists_against_an_on_disk_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("dpp-test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let store = SqliteSessionStore::connect(&url).await.unwrap();
        let id = store
            .insert_session("agent-disk", 1, unix_timestamp_now(), &Timings::new(), false, None)
            .await
            .unwrap();
        drop(store);

        // Reconnecting to the same file must see the row the first
        // connection wrote and re-run the migration without error.
        let reopened = SqliteSessionStore::connect(&url).await.unwrap();
        let sessions = reopened.fetch_sessions_by_agent("agent-disk").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
    }

    #[tokio::test]
    async fn challenge_history_is_ordered_by_round() {
        let store = test_store().await;
        let id = store
            .insert_session("agent-3", 2, unix_timestamp_now(), &Timings::new(), false, None)
            .await
            .unwrap();
        store
            .insert_challenge_round(id, 2, "q2", "B", true, 1.1)
            .await
            .unwrap();
        store
            .insert_challenge_round(id, 1, "q1", "A", true, 0.9)
            .await
            .unwrap();

        let history = store.fetch_challenge_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].round_num, 1);
        assert_eq!(history[1].round_num, 2);
    }
}
