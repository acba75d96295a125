//! Store doubles for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{LibSqlStore, Store};
use crate::error::StorageError;

/// Store whose every operation fails.
pub(crate) struct FailingStore;

fn unavailable(operation: &str) -> StorageError {
    StorageError::Query(format!("{operation}: disk unavailable"))
}

#[async_trait]
impl Store for FailingStore {
    async fn init_schema(&self) -> Result<(), StorageError> {
        Err(unavailable("init_schema"))
    }

    async fn get_setting(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(unavailable("get_setting"))
    }

    async fn set_setting(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(unavailable("set_setting"))
    }

    async fn delete_setting(&self, _key: &str) -> Result<bool, StorageError> {
        Err(unavailable("delete_setting"))
    }

    async fn put_responses(
        &self,
        _question_id: &str,
        _option_ids: &[String],
    ) -> Result<(), StorageError> {
        Err(unavailable("put_responses"))
    }

    async fn get_all_responses(&self) -> Result<HashMap<String, Vec<String>>, StorageError> {
        Err(unavailable("get_all_responses"))
    }

    async fn clear_responses(&self) -> Result<(), StorageError> {
        Err(unavailable("clear_responses"))
    }
}

/// In-memory store whose `put_responses` waits for a permit on `gate`.
pub(crate) struct GatedStore {
    inner: LibSqlStore,
    pub gate: Arc<Semaphore>,
    /// Writes that have reached the gate.
    pub waiting: AtomicUsize,
}

impl GatedStore {
    pub async fn new() -> Self {
        Self {
            inner: LibSqlStore::new_memory().await.unwrap(),
            gate: Arc::new(Semaphore::new(0)),
            waiting: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Store for GatedStore {
    async fn init_schema(&self) -> Result<(), StorageError> {
        self.inner.init_schema().await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_setting(key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set_setting(key, value).await
    }

    async fn delete_setting(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.delete_setting(key).await
    }

    async fn put_responses(
        &self,
        question_id: &str,
        option_ids: &[String],
    ) -> Result<(), StorageError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.inner.put_responses(question_id, option_ids).await
    }

    async fn get_all_responses(&self) -> Result<HashMap<String, Vec<String>>, StorageError> {
        self.inner.get_all_responses().await
    }

    async fn clear_responses(&self) -> Result<(), StorageError> {
        self.inner.clear_responses().await
    }
}
