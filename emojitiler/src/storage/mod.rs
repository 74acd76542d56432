//! Pack storage collaborator.
//!
//! The bot platform keeps one storage row per remote pack, tracked 1:1
//! by pack link. The persistent engine itself is outside this crate; the
//! trait here is the seam the pipeline writes through, and the in-memory
//! implementation backs tests and the CLI.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;

use crate::platform::UserId;

/// One tracked pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRecord {
    /// Remote pack link; unique per row.
    pub link: String,
    /// Pack title.
    pub title: String,
    /// Owning user.
    pub owner: UserId,
    /// Last known member count.
    pub member_count: usize,
    /// Set when the remote pack was deleted.
    pub deleted: bool,
}

/// Errors from pack storage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// No row exists for the given link.
    #[error("no pack record for link {link}")]
    NotFound { link: String },

    /// A row already exists for the given link.
    #[error("pack record for link {link} already exists")]
    AlreadyExists { link: String },
}

/// Storage operations the pipeline consumes.
pub trait PackStorage: Send + Sync {
    /// Creates the row for a newly created pack.
    fn create_pack(
        &self,
        record: PackRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Looks up a row by pack link.
    fn get_by_link(
        &self,
        link: &str,
    ) -> impl Future<Output = Result<PackRecord, StorageError>> + Send;

    /// Updates the cached member count after a mutation.
    fn update_member_count(
        &self,
        link: &str,
        member_count: usize,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Marks a pack as deleted remotely.
    fn mark_deleted(&self, link: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// In-memory pack storage for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryPackStorage {
    records: Mutex<HashMap<String, PackRecord>>,
}

impl InMemoryPackStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PackStorage for InMemoryPackStorage {
    async fn create_pack(&self, record: PackRecord) -> Result<(), StorageError> {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        if records.contains_key(&record.link) {
            return Err(StorageError::AlreadyExists {
                link: record.link.clone(),
            });
        }
        records.insert(record.link.clone(), record);
        Ok(())
    }

    async fn get_by_link(&self, link: &str) -> Result<PackRecord, StorageError> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(link)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                link: link.to_string(),
            })
    }

    async fn update_member_count(
        &self,
        link: &str,
        member_count: usize,
    ) -> Result<(), StorageError> {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let record = records.get_mut(link).ok_or_else(|| StorageError::NotFound {
            link: link.to_string(),
        })?;
        record.member_count = member_count;
        Ok(())
    }

    async fn mark_deleted(&self, link: &str) -> Result<(), StorageError> {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let record = records.get_mut(link).ok_or_else(|| StorageError::NotFound {
            link: link.to_string(),
        })?;
        record.deleted = true;
        Ok(())
    }
}
