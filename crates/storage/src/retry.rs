//! Bounded retry for transient document-store errors.
//!
//! Only [`StorageError::Transient`] is retried; anything else
//! surfaces immediately. After the budget is spent the last transient
//! error surfaces to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::docstore::DocumentStore;
use crate::error::StorageError;

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Wraps a [`DocumentStore`] with a small fixed retry budget.
pub struct RetryingStore<S> {
    inner: S,
    attempts: u32,
}

impl<S: DocumentStore> RetryingStore<S> {
    pub fn new(inner: S, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
        }
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Err(StorageError::Transient(reason)) if attempt < self.attempts => {
                    warn!(op, attempt, %reason, "transient storage error, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for RetryingStore<S> {
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        self.run("get", move || self.inner.get(path)).await
    }

    async fn set(&self, path: &str, doc: Value) -> Result<(), StorageError> {
        let doc = &doc;
        self.run("set", move || self.inner.set(path, doc.clone()))
            .await
    }

    async fn merge(&self, path: &str, patch: Value) -> Result<(), StorageError> {
        let patch = &patch;
        self.run("merge", move || self.inner.merge(path, patch.clone()))
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.run("delete", move || self.inner.delete(path)).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StorageError> {
        self.run("list", move || self.inner.list(collection)).await
    }

    async fn scan_group(
        &self,
        collection_id: &str,
        filters: &[(&str, Value)],
    ) -> Result<Vec<(String, Value)>, StorageError> {
        self.run("scan_group", move || {
            self.inner.scan_group(collection_id, filters)
        })
        .await
    }
}
