//! Storage seams consumed by the engine.
//!
//! Structured records and blob payloads live behind separate traits so each
//! tier can fail, and be bounded, independently.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{BlobState, Monitor, ResultFilter, ResultPage, ResultRecord};

/// Read access to monitor definitions
#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn find_monitor(&self, account: &str, monitor_id: &str)
    -> Result<Option<Monitor>, StorageError>;

    /// Every active monitor across all accounts
    async fn active_monitors(&self) -> Result<Vec<Monitor>, StorageError>;
}

/// Structured tier: queryable result records
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn insert_result(&self, account: &str, record: &ResultRecord) -> Result<(), StorageError>;

    async fn set_blob_state(
        &self,
        account: &str,
        result_id: &str,
        state: BlobState,
    ) -> Result<(), StorageError>;

    async fn find_result(
        &self,
        account: &str,
        result_id: &str,
    ) -> Result<Option<ResultRecord>, StorageError>;

    async fn query_results(
        &self,
        account: &str,
        filter: &ResultFilter,
    ) -> Result<ResultPage, StorageError>;
}

/// Blob tier: opaque payloads addressed by path
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// `None` when nothing is stored at `path`
    async fn get_object(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deleting a missing object is not an error
    async fn delete_object(&self, path: &str) -> Result<(), StorageError>;
}
