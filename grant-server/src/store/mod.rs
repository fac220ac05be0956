//! Directory-style persistence.
//!
//! Entries are JSON documents addressed by DN and tagged with an object class. The
//! engine only relies on the operations of [`DirectoryBackend`]; [`EntryManager`]
//! layers typed access on top of it.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

pub mod dn;
pub mod filter;
pub mod memory;

pub use filter::Filter;
pub use memory::MemoryDirectory;

/// Errors raised by the directory
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entry already exists: {0}")]
    AlreadyExists(String),
    #[error("No such entry: {0}")]
    NoSuchEntry(String),
    #[error("Invalid DN: {0}")]
    InvalidDn(String),
    #[error("Failed to map entry: {0}")]
    Mapping(#[from] serde_json::Error),
    #[error("Directory backend error: {0}")]
    Backend(String),
}

/// Untyped directory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub dn: String,
    pub object_class: String,
    pub attributes: serde_json::Value,
}

/// Storage engine behind the [`EntryManager`].
///
/// Searches are subtree searches rooted at `base_dn` and return entries in a stable
/// order, so that paging with `start` is repeatable.
#[async_trait]
pub trait DirectoryBackend: Send + Sync + Debug {
    async fn get(&self, dn: &str) -> Result<Option<RawEntry>, StoreError>;

    async fn search(
        &self,
        base_dn: &str,
        object_class: &str,
        filter: &Filter,
        start: usize,
        limit: Option<usize>,
    ) -> Result<Vec<RawEntry>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the DN is taken
    async fn add(&self, entry: RawEntry) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NoSuchEntry`] if the DN is unknown
    async fn modify(&self, entry: RawEntry) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NoSuchEntry`] if the DN is unknown
    async fn delete(&self, dn: &str) -> Result<(), StoreError>;

    /// Deletes `dn` and everything underneath it, returning the number of entries removed
    async fn delete_subtree(&self, dn: &str) -> Result<usize, StoreError>;
}

/// A typed directory entry
pub trait Entry: Serialize + DeserializeOwned + Send + Sync {
    const OBJECT_CLASS: &'static str;

    fn dn(&self) -> &str;
}

/// Organizational unit grouping other entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleBranch {
    pub dn: String,
    pub ou: String,
}

impl SimpleBranch {
    pub fn new(ou: &str, dn: String) -> Self {
        Self {
            dn,
            ou: ou.to_string(),
        }
    }
}

impl Entry for SimpleBranch {
    const OBJECT_CLASS: &'static str = "organizationalUnit";

    fn dn(&self) -> &str {
        &self.dn
    }
}

/// Outcome of a batched sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// Typed access to a [`DirectoryBackend`]
#[derive(Clone, Debug)]
pub struct EntryManager {
    backend: Arc<dyn DirectoryBackend>,
}

impl EntryManager {
    pub fn new(backend: Arc<dyn DirectoryBackend>) -> Self {
        Self { backend }
    }

    fn to_raw<E: Entry>(entry: &E) -> Result<RawEntry, StoreError> {
        Ok(RawEntry {
            dn: entry.dn().to_string(),
            object_class: E::OBJECT_CLASS.to_string(),
            attributes: serde_json::to_value(entry)?,
        })
    }

    fn from_raw<E: Entry>(raw: RawEntry) -> Result<E, StoreError> {
        Ok(serde_json::from_value(raw.attributes)?)
    }

    /// Entry at `dn`, if it exists and has the object class of `E`
    pub async fn find<E: Entry>(&self, dn: &str) -> Result<Option<E>, StoreError> {
        match self.backend.get(dn).await? {
            Some(raw) if raw.object_class == E::OBJECT_CLASS => Ok(Some(Self::from_raw(raw)?)),
            _ => Ok(None),
        }
    }

    /// All entries of type `E` under `base_dn` matching `filter`
    pub async fn find_entries<E: Entry>(
        &self,
        base_dn: &str,
        filter: &Filter,
    ) -> Result<Vec<E>, StoreError> {
        self.find_entries_page(base_dn, filter, 0, None).await
    }

    pub async fn find_entries_page<E: Entry>(
        &self,
        base_dn: &str,
        filter: &Filter,
        start: usize,
        limit: Option<usize>,
    ) -> Result<Vec<E>, StoreError> {
        self.backend
            .search(base_dn, E::OBJECT_CLASS, filter, start, limit)
            .await?
            .into_iter()
            .map(Self::from_raw)
            .collect()
    }

    /// Creates a new entry
    pub async fn persist<E: Entry>(&self, entry: &E) -> Result<(), StoreError> {
        self.backend.add(Self::to_raw(entry)?).await
    }

    /// Replaces an existing entry
    pub async fn merge<E: Entry>(&self, entry: &E) -> Result<(), StoreError> {
        self.backend.modify(Self::to_raw(entry)?).await
    }

    pub async fn remove<E: Entry>(&self, entry: &E) -> Result<(), StoreError> {
        self.backend.delete(entry.dn()).await
    }

    pub async fn remove_by_dn(&self, dn: &str) -> Result<(), StoreError> {
        self.backend.delete(dn).await
    }

    /// Removes `dn` together with all entries below it
    pub async fn remove_recursively(&self, dn: &str) -> Result<usize, StoreError> {
        self.backend.delete_subtree(dn).await
    }

    /// True if an entry of type `E` exists at `dn`
    pub async fn contains<E: Entry>(&self, dn: &str) -> Result<bool, StoreError> {
        Ok(matches!(
            self.backend.get(dn).await?,
            Some(raw) if raw.object_class == E::OBJECT_CLASS
        ))
    }

    /// Creates the organizational unit `ou` at `dn` unless it already exists
    pub async fn ensure_branch(&self, ou: &str, dn: &str) -> Result<(), StoreError> {
        if self.contains::<SimpleBranch>(dn).await? {
            return Ok(());
        }
        match self.persist(&SimpleBranch::new(ou, dn.to_string())).await {
            // lost a race against another writer
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            other => other,
        }
    }

    /// Feeds every entry matching `filter` to `action` in batches of `batch_size`.
    ///
    /// `action` is expected to remove the entry. A failing entry is logged and
    /// skipped; it stays in place and later batches start past it.
    pub async fn sweep<E, F, Fut, Er>(
        &self,
        base_dn: &str,
        filter: &Filter,
        batch_size: usize,
        mut action: F,
    ) -> Result<SweepReport, StoreError>
    where
        E: Entry,
        F: FnMut(E) -> Fut,
        Fut: Future<Output = Result<(), Er>>,
        Er: Display,
    {
        let batch_size = batch_size.max(1);
        let mut report = SweepReport::default();
        loop {
            let batch: Vec<E> = self
                .find_entries_page(base_dn, filter, report.failed, Some(batch_size))
                .await?;
            let fetched = batch.len();
            for entry in batch {
                let dn = entry.dn().to_string();
                match action(entry).await {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        log::error!("Failed to remove entry {}: {}", dn, e);
                        report.failed += 1;
                    }
                }
            }
            if fetched < batch_size {
                break;
            }
        }
        Ok(report)
    }

    /// Removes every entry of type `E` matching `filter`
    pub async fn remove_matching<E: Entry>(
        &self,
        base_dn: &str,
        filter: &Filter,
        batch_size: usize,
    ) -> Result<SweepReport, StoreError> {
        self.sweep(base_dn, filter, batch_size, move |entry: E| async move {
            self.remove(&entry).await
        })
        .await
    }

    /// Removes every entry of `object_class` matching `filter` without mapping it to a type
    pub async fn remove_matching_class(
        &self,
        base_dn: &str,
        object_class: &str,
        filter: &Filter,
        batch_size: usize,
    ) -> Result<SweepReport, StoreError> {
        let batch_size = batch_size.max(1);
        let mut report = SweepReport::default();
        loop {
            let batch = self
                .backend
                .search(base_dn, object_class, filter, report.failed, Some(batch_size))
                .await?;
            let fetched = batch.len();
            for raw in batch {
                match self.backend.delete(&raw.dn).await {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        log::error!("Failed to remove entry {}: {}", raw.dn, e);
                        report.failed += 1;
                    }
                }
            }
            if fetched < batch_size {
                break;
            }
        }
        Ok(report)
    }
}
