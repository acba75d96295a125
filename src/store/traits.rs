//! `Store` trait — single async interface for all persistence.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StorageError;

/// Backend-agnostic store covering settings and questionnaire responses.
///
/// Every write is durable once the returned future resolves; a subsequent
/// read (in this process or after a restart) observes it.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), StorageError>;

    // ── Settings ────────────────────────────────────────────────────

    /// Read a setting value.
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace a setting value.
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a setting. Returns whether a row was removed.
    async fn delete_setting(&self, key: &str) -> Result<bool, StorageError>;

    // ── Responses ───────────────────────────────────────────────────

    /// Replace the full ordered option list for one question.
    async fn put_responses(
        &self,
        question_id: &str,
        option_ids: &[String],
    ) -> Result<(), StorageError>;

    /// Load every stored question → ordered option ids mapping.
    async fn get_all_responses(&self) -> Result<HashMap<String, Vec<String>>, StorageError>;

    /// Delete all stored responses.
    async fn clear_responses(&self) -> Result<(), StorageError>;
}
