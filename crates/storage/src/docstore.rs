//! Document store trait and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::StorageError;

/// Abstract document store with per-tenant sub-collections.
///
/// Paths are slash-separated, alternating collection and document
/// segments (`users/u1/pipeline_runs/r1`). Merge updates replace only
/// the top-level fields present in the patch, matching the Firestore
/// merge contract the rest of the system assumes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError>;

    /// Full write, replacing any existing document.
    async fn set(&self, path: &str, doc: Value) -> Result<(), StorageError>;

    /// Merge-write: top-level fields in `patch` overwrite, everything
    /// else is preserved. Creates the document when absent.
    async fn merge(&self, path: &str, patch: Value) -> Result<(), StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// List all documents directly under a collection path, as
    /// `(doc_id, document)` pairs ordered by doc id.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StorageError>;

    /// Collection-group scan: every document in any collection named
    /// `collection_id`, filtered by top-level field equality. Used in
    /// exactly one place (pending-input lookup by provider + status).
    async fn scan_group(
        &self,
        collection_id: &str,
        filters: &[(&str, Value)],
    ) -> Result<Vec<(String, Value)>, StorageError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        (**self).get(path).await
    }
    async fn set(&self, path: &str, doc: Value) -> Result<(), StorageError> {
        (**self).set(path, doc).await
    }
    async fn merge(&self, path: &str, patch: Value) -> Result<(), StorageError> {
        (**self).merge(path, patch).await
    }
    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        (**self).delete(path).await
    }
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StorageError> {
        (**self).list(collection).await
    }
    async fn scan_group(
        &self,
        collection_id: &str,
        filters: &[(&str, Value)],
    ) -> Result<Vec<(String, Value)>, StorageError> {
        (**self).scan_group(collection_id, filters).await
    }
}

fn validate_doc_path(path: &str) -> Result<(), StorageError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// In-memory document store for tests and local development.
///
/// A single async mutex over the tree gives per-document linearizable
/// writes, which is all the reconciler needs.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents (test helper).
    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.lock().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        validate_doc_path(path)?;
        Ok(self.docs.lock().await.get(path).cloned())
    }

    async fn set(&self, path: &str, doc: Value) -> Result<(), StorageError> {
        validate_doc_path(path)?;
        self.docs.lock().await.insert(path.to_string(), doc);
        Ok(())
    }

    async fn merge(&self, path: &str, patch: Value) -> Result<(), StorageError> {
        validate_doc_path(path)?;
        let patch_obj = patch
            .as_object()
            .ok_or_else(|| StorageError::Serialize("merge patch must be an object".into()))?;

        let mut docs = self.docs.lock().await;
        let entry = docs
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        let obj = entry
            .as_object_mut()
            .ok_or_else(|| StorageError::Serialize(format!("document {path} is not an object")))?;
        for (k, v) in patch_obj {
            obj.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        validate_doc_path(path)?;
        self.docs.lock().await.remove(path);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let prefix = format!("{}/", collection.trim_end_matches('/'));
        let docs = self.docs.lock().await;
        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, doc)| {
                let rest = &path[prefix.len()..];
                // Direct children only, not nested subcollections.
                if rest.contains('/') {
                    None
                } else {
                    Some((rest.to_string(), doc.clone()))
                }
            })
            .collect())
    }

    async fn scan_group(
        &self,
        collection_id: &str,
        filters: &[(&str, Value)],
    ) -> Result<Vec<(String, Value)>, StorageError> {
        let docs = self.docs.lock().await;
        Ok(docs
            .iter()
            .filter(|(path, _)| {
                let segments: Vec<&str> = path.split('/').collect();
                segments.len() >= 2 && segments[segments.len() - 2] == collection_id
            })
            .filter(|(_, doc)| {
                filters
                    .iter()
                    .all(|(field, want)| doc.get(*field) == Some(want))
            })
            .map(|(path, doc)| (path.clone(), doc.clone()))
            .collect())
    }
}
