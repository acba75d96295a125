//! libSQL backend — async `Store` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::store::migrations;
use crate::store::traits::Store;

/// libSQL store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl Store for LibSqlStore {
    async fn init_schema(&self) -> Result<(), StorageError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM settings WHERE key = ?1", params![key])
            .await
            .map_err(|e| StorageError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| StorageError::Codec(format!("get_setting({key}): {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now],
            )
            .await
            .map_err(|e| StorageError::Query(format!("set_setting: {e}")))?;

        debug!(key, value, "Setting saved");
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<bool, StorageError> {
        let count = self
            .conn()
            .execute("DELETE FROM settings WHERE key = ?1", params![key])
            .await
            .map_err(|e| StorageError::Query(format!("delete_setting: {e}")))?;
        Ok(count > 0)
    }

    // ── Responses ───────────────────────────────────────────────────

    async fn put_responses(
        &self,
        question_id: &str,
        option_ids: &[String],
    ) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(option_ids)
            .map_err(|e| StorageError::Codec(format!("put_responses({question_id}): {e}")))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO responses (question_id, option_ids, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (question_id) DO UPDATE SET option_ids = ?2, updated_at = ?3",
                params![question_id, encoded, now],
            )
            .await
            .map_err(|e| StorageError::Query(format!("put_responses: {e}")))?;

        debug!(question_id, options = option_ids.len(), "Responses saved");
        Ok(())
    }

    async fn get_all_responses(&self) -> Result<HashMap<String, Vec<String>>, StorageError> {
        let mut rows = self
            .conn()
            .query("SELECT question_id, option_ids FROM responses", ())
            .await
            .map_err(|e| StorageError::Query(format!("get_all_responses: {e}")))?;

        let mut results = HashMap::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(StorageError::Query(format!("get_all_responses: {e}"))),
            };

            let question_id: String = match row.get(0) {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "Skipping response row with unreadable question_id");
                    continue;
                }
            };
            let decoded = row
                .get::<String>(1)
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    serde_json::from_str::<Vec<String>>(&raw).map_err(|e| e.to_string())
                });
            match decoded {
                Ok(option_ids) => {
                    results.insert(question_id, option_ids);
                }
                Err(e) => {
                    warn!(question_id = %question_id, error = %e, "Skipping undecodable response row");
                }
            }
        }

        Ok(results)
    }

    async fn clear_responses(&self) -> Result<(), StorageError> {
        let count = self
            .conn()
            .execute("DELETE FROM responses", ())
            .await
            .map_err(|e| StorageError::Query(format!("clear_responses: {e}")))?;
        info!(rows = count, "Questionnaire responses cleared");
        Ok(())
    }
}
