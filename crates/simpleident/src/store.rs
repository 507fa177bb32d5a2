//! Generic record store with JSON file persistence.
//!
//! One `RecordStore` per entity kind. Each store owns a map of identifier to
//! record behind a single tokio `RwLock`:
//! - reads take the read lock and hand out clones, never references
//! - `add`/`update`/`update_first`/`retain` take the write lock and rewrite the
//!   whole document before releasing it
//!
//! A write that cannot be persisted is rolled back in memory, so the in-memory
//! map and the file never disagree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Bounds every stored record satisfies.
///
/// `Clone` provides copy-on-read; serde provides the persisted mirror.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Record for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Thread-safe, optionally file-backed store of records keyed by `Uuid`.
pub struct RecordStore<T> {
    records: Arc<RwLock<HashMap<Uuid, T>>>,
    path: Option<Arc<PathBuf>>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self { records: Arc::clone(&self.records), path: self.path.clone() }
    }
}

impl<T: Record> RecordStore<T> {
    /// Create a store that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self { records: Arc::new(RwLock::new(HashMap::new())), path: None }
    }

    /// Open a store persisted at `path`, loading the existing document if any.
    ///
    /// A missing file yields an empty store; the parent directory is created.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), count = records.len(), "Opened record store");

        Ok(Self { records: Arc::new(RwLock::new(records)), path: Some(Arc::new(path)) })
    }

    /// Location of the persisted document, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    /// Copy of every record, in no particular order.
    pub async fn list(&self) -> Vec<T> {
        self.records.read().await.values().cloned().collect()
    }

    /// Copy of the record stored under `id`.
    pub async fn get(&self, id: Uuid) -> StoreResult<T> {
        self.records.read().await.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    /// Copy of the first record matching `predicate` (arbitrary order).
    pub async fn find<P>(&self, predicate: P) -> StoreResult<T>
    where
        P: Fn(&T) -> bool,
    {
        self.records
            .read()
            .await
            .values()
            .find(|r| predicate(r))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Insert a new record and persist.
    pub async fn add(&self, id: Uuid, record: T) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(StoreError::AlreadyExists);
        }

        records.insert(id, record);

        if let Err(e) = self.persist(&records).await {
            records.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    /// Replace the record stored under `id` and persist.
    pub async fn update(&self, id: Uuid, record: T) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let Some(slot) = records.get_mut(&id) else {
            return Err(StoreError::NotFound);
        };

        let previous = std::mem::replace(slot, record);

        if let Err(e) = self.persist(&records).await {
            records.insert(id, previous);
            return Err(e);
        }
        Ok(())
    }

    /// Atomically find the first record matching `predicate` and modify it.
    ///
    /// `apply` works on a copy. If it returns `Err`, the store is untouched and
    /// the error is returned as-is. If it returns `Ok`, the copy replaces the
    /// stored record and the collection is persisted before the lock is released.
    pub async fn update_first<P, F, R, E>(&self, predicate: P, apply: F) -> Result<R, E>
    where
        P: Fn(&T) -> bool,
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut records = self.records.write().await;

        let Some((id, current)) =
            records.iter().find(|(_, r)| predicate(r)).map(|(id, r)| (*id, r.clone()))
        else {
            return Err(StoreError::NotFound.into());
        };

        let mut updated = current.clone();
        let result = apply(&mut updated)?;

        records.insert(id, updated);

        if let Err(e) = self.persist(&records).await {
            records.insert(id, current);
            return Err(e.into());
        }
        Ok(result)
    }

    /// Remove every record for which `keep` returns false. Returns the number removed.
    pub async fn retain<P>(&self, keep: P) -> StoreResult<usize>
    where
        P: Fn(&T) -> bool,
    {
        let mut records = self.records.write().await;

        let removed: Vec<(Uuid, T)> = records
            .iter()
            .filter(|(_, r)| !keep(r))
            .map(|(id, r)| (*id, r.clone()))
            .collect();
        if removed.is_empty() {
            return Ok(0);
        }

        for (id, _) in &removed {
            records.remove(id);
        }

        if let Err(e) = self.persist(&records).await {
            records.extend(removed);
            return Err(e);
        }
        Ok(removed.len())
    }

    /// Rewrite the whole document. Called with the write lock held.
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// target, so a failed write leaves the previous document intact.
    async fn persist(&self, records: &HashMap<Uuid, T>) -> StoreResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(records)?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::trace!(path = %path.display(), count = records.len(), "Persisted record store");
        Ok(())
    }
}

impl<T> std::fmt::Debug for RecordStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Note {
        title: String,
        tags: Vec<String>,
    }

    fn note(title: &str) -> Note {
        Note { title: title.into(), tags: vec![] }
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = RecordStore::in_memory();
        let id = Uuid::now_v7();
        store.add(id, note("first")).await.unwrap();

        assert_eq!(store.get(id).await.unwrap(), note("first"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_duplicate_id() {
        let store = RecordStore::in_memory();
        let id = Uuid::now_v7();
        store.add(id, note("first")).await.unwrap();

        let err = store.add(id, note("second")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
        assert_eq!(store.get(id).await.unwrap().title, "first");
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store: RecordStore<Note> = RecordStore::in_memory();
        assert!(matches!(store.get(Uuid::now_v7()).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_missing() {
        let store = RecordStore::in_memory();
        let err = store.update(Uuid::now_v7(), note("x")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_reads_are_copies() {
        let store = RecordStore::in_memory();
        let id = Uuid::now_v7();
        store.add(id, note("first")).await.unwrap();

        let mut copy = store.get(id).await.unwrap();
        copy.tags.push("mutated".into());
        copy.title = "changed".into();

        assert_eq!(store.get(id).await.unwrap(), note("first"));

        store.update(id, copy.clone()).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), copy);
    }

    #[tokio::test]
    async fn test_find() {
        let store = RecordStore::in_memory();
        store.add(Uuid::now_v7(), note("a")).await.unwrap();
        store.add(Uuid::now_v7(), note("b")).await.unwrap();

        assert_eq!(store.find(|n| n.title == "b").await.unwrap().title, "b");
        assert!(matches!(store.find(|n| n.title == "c").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_first_rejection_leaves_record() {
        let store = RecordStore::in_memory();
        let id = Uuid::now_v7();
        store.add(id, note("a")).await.unwrap();

        let result: Result<(), StoreError> = store
            .update_first(
                |n| n.title == "a",
                |n| {
                    n.title = "never stored".into();
                    Err(StoreError::AlreadyExists)
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists)));
        assert_eq!(store.get(id).await.unwrap().title, "a");

        let title: Result<String, StoreError> = store
            .update_first(
                |n| n.title == "a",
                |n| {
                    n.tags.push("seen".into());
                    Ok(n.title.clone())
                },
            )
            .await;
        assert_eq!(title.unwrap(), "a");
        assert_eq!(store.get(id).await.unwrap().tags, vec!["seen".to_string()]);
    }

    #[tokio::test]
    async fn test_retain() {
        let store = RecordStore::in_memory();
        store.add(Uuid::now_v7(), note("keep")).await.unwrap();
        store.add(Uuid::now_v7(), note("drop")).await.unwrap();
        store.add(Uuid::now_v7(), note("drop")).await.unwrap();

        assert_eq!(store.retain(|n| n.title == "keep").await.unwrap(), 2);
        assert_eq!(store.list().await, vec![note("keep")]);
        assert_eq!(store.retain(|_| true).await.unwrap(), 0);
    }
}
