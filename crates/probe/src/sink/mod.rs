//! Result sink.
//!
//! A result is persisted in two tiers: the structured record goes to the
//! [`ResultStore`] and the response body and headers go to the
//! [`ObjectStore`]. The structured write is authoritative. A blob failure
//! leaves the record in place, marks it [`BlobState::Unavailable`] and is
//! reported back to the caller without failing the store.

mod paths;

pub use paths::{BlobKind, content_path};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageTier};
use crate::store::{ObjectStore, ResultStore};
use crate::types::{BlobState, MonitorResult, ResultRecord, Tuple};

#[derive(Debug, Clone, Copy)]
pub struct SinkOptions {
    pub structured_timeout: Duration,
    pub blob_timeout: Duration,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self { structured_timeout: Duration::from_secs(5), blob_timeout: Duration::from_secs(10) }
    }
}

/// Outcome of a successful store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub result_id: String,
    pub blobs: BlobState,
    /// Blob tier failure, when the payload could not be written
    pub blob_error: Option<String>,
}

#[derive(Clone)]
pub struct ResultSink {
    results: Arc<dyn ResultStore>,
    objects: Arc<dyn ObjectStore>,
    options: SinkOptions,
}

impl ResultSink {
    pub fn new(
        results: Arc<dyn ResultStore>,
        objects: Arc<dyn ObjectStore>,
        options: SinkOptions,
    ) -> Self {
        Self { results, objects, options }
    }

    /// Persist a result under `account`.
    ///
    /// Fails only when the structured tier fails; nothing is written to the
    /// blob tier in that case.
    pub async fn store(
        &self,
        account: &str,
        result: MonitorResult,
    ) -> Result<StoredResult, StorageError> {
        let (mut record, body, headers) = result.split();
        record.account_id = account.to_string();
        record.blobs = BlobState::Pending;

        self.structured(self.results.insert_result(account, &record)).await?;

        let (blobs, blob_error) = match self.write_blobs(&record, body, &headers).await {
            Ok(()) => (BlobState::Stored, None),
            Err(error) => {
                warn!(
                    result_id = %record.id,
                    monitor_id = %record.monitor_id,
                    "Result payload not stored: {error}"
                );
                (BlobState::Unavailable, Some(error.to_string()))
            }
        };

        self.structured(self.results.set_blob_state(account, &record.id, blobs)).await?;

        debug!(result_id = %record.id, blobs = blobs.as_str(), "Result stored");
        Ok(StoredResult { result_id: record.id, blobs, blob_error })
    }

    /// Read a result back with its body and headers.
    ///
    /// A result whose payload is missing or unreadable comes back with an
    /// empty body and no headers.
    pub async fn load(&self, account: &str, result_id: &str) -> Result<MonitorResult, StorageError> {
        let mut record = self
            .structured(self.results.find_result(account, result_id))
            .await?
            .ok_or_else(|| StorageError::NotFound(result_id.to_string()))?;

        if record.blobs != BlobState::Stored {
            return Ok(MonitorResult::from_parts(record, Vec::new(), Vec::new()));
        }

        match self.read_blobs(&record).await {
            Ok((body, headers)) => Ok(MonitorResult::from_parts(record, body, headers)),
            Err(error) => {
                warn!(result_id, "Result payload not readable: {error}");
                record.blobs = BlobState::Unavailable;
                Ok(MonitorResult::from_parts(record, Vec::new(), Vec::new()))
            }
        }
    }

    /// Remove the payloads of results belonging to a deleted monitor.
    ///
    /// Returns the number of objects that could not be removed.
    pub async fn purge(&self, account: &str, monitor_id: &str, result_ids: &[String]) -> usize {
        let mut failed = 0;
        for result_id in result_ids {
            for kind in BlobKind::ALL {
                let path = content_path(account, monitor_id, result_id, kind);
                if let Err(error) = self.blob(self.objects.delete_object(&path)).await {
                    warn!(%path, "Failed to remove result payload: {error}");
                    failed += 1;
                }
            }
        }
        info!(monitor_id, results = result_ids.len(), failed, "Purged result payloads");
        failed
    }

    async fn write_blobs(
        &self,
        record: &ResultRecord,
        body: Vec<u8>,
        headers: &[Tuple],
    ) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec(headers)?;
        let path = |kind| content_path(&record.account_id, &record.monitor_id, &record.id, kind);

        self.blob(self.objects.put_object(&path(BlobKind::Body), body)).await?;
        self.blob(self.objects.put_object(&path(BlobKind::Headers), encoded)).await
    }

    async fn read_blobs(&self, record: &ResultRecord) -> Result<(Vec<u8>, Vec<Tuple>), StorageError> {
        let path = |kind| content_path(&record.account_id, &record.monitor_id, &record.id, kind);

        let body = self.blob(self.objects.get_object(&path(BlobKind::Body))).await?;
        let headers = match self.blob(self.objects.get_object(&path(BlobKind::Headers))).await? {
            Some(raw) => serde_json::from_slice(&raw)?,
            None => Vec::new(),
        };
        Ok((body.unwrap_or_default(), headers))
    }

    async fn structured<T>(
        &self,
        operation: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        bounded(StorageTier::Structured, self.options.structured_timeout, operation).await
    }

    async fn blob<T>(
        &self,
        operation: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        bounded(StorageTier::Blob, self.options.blob_timeout, operation).await
    }
}

async fn bounded<T>(
    tier: StorageTier,
    limit: Duration,
    operation: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, StorageError> {
    tokio::time::timeout(limit, operation)
        .await
        .unwrap_or(Err(StorageError::Timeout { tier, millis: limit.as_millis() as u64 }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::types::{ExecutionMode, PhaseTimings, ResultFilter, ResultPage};

    #[derive(Default)]
    struct MemoryResults {
        records: Mutex<HashMap<(String, String), ResultRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl ResultStore for MemoryResults {
        async fn insert_result(&self, account: &str, record: &ResultRecord) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::structured("database is locked"));
            }
            let key = (account.to_string(), record.id.clone());
            self.records.lock().unwrap().insert(key, record.clone());
            Ok(())
        }

        async fn set_blob_state(
            &self,
            account: &str,
            result_id: &str,
            state: BlobState,
        ) -> Result<(), StorageError> {
            let key = (account.to_string(), result_id.to_string());
            let mut records = self.records.lock().unwrap();
            let record = records.get_mut(&key).ok_or_else(|| StorageError::NotFound(result_id.into()))?;
            record.blobs = state;
            Ok(())
        }

        async fn find_result(
            &self,
            account: &str,
            result_id: &str,
        ) -> Result<Option<ResultRecord>, StorageError> {
            let key = (account.to_string(), result_id.to_string());
            Ok(self.records.lock().unwrap().get(&key).cloned())
        }

        async fn query_results(
            &self,
            _account: &str,
            _filter: &ResultFilter,
        ) -> Result<ResultPage, StorageError> {
            Ok(ResultPage::default())
        }
    }

    #[derive(Default)]
    struct MemoryObjects {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail: bool,
        stall: bool,
    }

    #[async_trait]
    impl ObjectStore for MemoryObjects {
        async fn put_object(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail {
                return Err(StorageError::blob("bucket unreachable"));
            }
            self.objects.lock().unwrap().insert(path.to_string(), data);
            Ok(())
        }

        async fn get_object(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(self.objects.lock().unwrap().get(path).cloned())
        }

        async fn delete_object(&self, path: &str) -> Result<(), StorageError> {
            self.objects.lock().unwrap().remove(path);
            Ok(())
        }
    }

    fn result(id: &str, body: &[u8], headers: Vec<Tuple>) -> MonitorResult {
        MonitorResult {
            id: id.into(),
            monitor_id: "mon".into(),
            account_id: "acc".into(),
            mode: ExecutionMode::Scheduled,
            created_at: Utc::now(),
            url: "http://example.com/".into(),
            method: "GET".into(),
            protocol: "HTTP/1.1".into(),
            ip: "127.0.0.1".into(),
            location: "local".into(),
            code: Some(200),
            err: String::new(),
            timings: PhaseTimings { total: 12.5, ..Default::default() },
            assert_results: Vec::new(),
            body: body.to_vec(),
            headers,
            blobs: BlobState::Pending,
        }
    }

    fn sink(results: Arc<MemoryResults>, objects: Arc<MemoryObjects>) -> ResultSink {
        let options = SinkOptions {
            structured_timeout: Duration::from_millis(200),
            blob_timeout: Duration::from_millis(200),
        };
        ResultSink::new(results, objects, options)
    }

    #[tokio::test]
    async fn test_store_then_load_round_trip() {
        let results = Arc::new(MemoryResults::default());
        let objects = Arc::new(MemoryObjects::default());
        let sink = sink(results, objects.clone());

        let original = result("r1", b"{\"ok\":true}", vec![("content-type".into(), "application/json".into())]);
        let stored = sink.store("acc", original.clone()).await.unwrap();
        assert_eq!(stored.blobs, BlobState::Stored);
        assert!(stored.blob_error.is_none());
        assert!(objects.objects.lock().unwrap().contains_key("acc/mon/r1/body"));

        let loaded = sink.load("acc", "r1").await.unwrap();
        assert_eq!(loaded.body, original.body);
        assert_eq!(loaded.headers, original.headers);
        assert_eq!(loaded.timings, original.timings);
        assert_eq!(loaded.blobs, BlobState::Stored);
    }

    #[tokio::test]
    async fn test_empty_body_and_headers_round_trip() {
        let sink = sink(Arc::default(), Arc::default());
        sink.store("acc", result("r2", b"", Vec::new())).await.unwrap();

        let loaded = sink.load("acc", "r2").await.unwrap();
        assert!(loaded.body.is_empty());
        assert!(loaded.headers.is_empty());
    }

    #[tokio::test]
    async fn test_large_binary_body_round_trip() {
        let objects = Arc::new(MemoryObjects::default());
        let sink = sink(Arc::default(), objects.clone());
        let body: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 256) as u8).collect();
        assert!(String::from_utf8(body.clone()).is_err());

        let stored = sink.store("acc", result("r9", &body, Vec::new())).await.unwrap();
        assert_eq!(stored.blobs, BlobState::Stored);
        assert_eq!(objects.objects.lock().unwrap()["acc/mon/r9/body"].len(), body.len());

        let loaded = sink.load("acc", "r9").await.unwrap();
        assert_eq!(loaded.body.len(), body.len());
        assert!(loaded.body == body);
        assert!(loaded.headers.is_empty());
        assert_eq!(loaded.blobs, BlobState::Stored);
    }

    #[tokio::test]
    async fn test_blob_failure_keeps_structured_record() {
        let results = Arc::new(MemoryResults::default());
        let objects = Arc::new(MemoryObjects { fail: true, ..Default::default() });
        let sink = sink(results.clone(), objects);

        let stored = sink.store("acc", result("r3", b"payload", Vec::new())).await.unwrap();
        assert_eq!(stored.blobs, BlobState::Unavailable);
        assert!(stored.blob_error.unwrap().contains("blob store failed"));

        let loaded = sink.load("acc", "r3").await.unwrap();
        assert_eq!(loaded.code, Some(200));
        assert_eq!(loaded.blobs, BlobState::Unavailable);
        assert!(loaded.body.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_blob_store_is_bounded() {
        let objects = Arc::new(MemoryObjects { stall: true, ..Default::default() });
        let sink = sink(Arc::default(), objects);

        let stored = sink.store("acc", result("r4", b"x", Vec::new())).await.unwrap();
        assert_eq!(stored.blobs, BlobState::Unavailable);
        assert!(stored.blob_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_structured_failure_writes_no_blobs() {
        let results = Arc::new(MemoryResults { fail: true, ..Default::default() });
        let objects = Arc::new(MemoryObjects::default());
        let sink = sink(results, objects.clone());

        let error = sink.store("acc", result("r5", b"x", Vec::new())).await.unwrap_err();
        assert_eq!(error.tier(), Some(StorageTier::Structured));
        assert!(objects.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_is_account_scoped() {
        let sink = sink(Arc::default(), Arc::default());
        sink.store("acc", result("r6", b"secret", Vec::new())).await.unwrap();

        let error = sink.load("other", "r6").await.unwrap_err();
        assert!(matches!(error, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_purge_removes_payloads() {
        let objects = Arc::new(MemoryObjects::default());
        let sink = sink(Arc::default(), objects.clone());
        sink.store("acc", result("r7", b"a", Vec::new())).await.unwrap();
        sink.store("acc", result("r8", b"b", Vec::new())).await.unwrap();

        let failed = sink.purge("acc", "mon", &["r7".to_string(), "r8".to_string()]).await;
        assert_eq!(failed, 0);
        assert!(objects.objects.lock().unwrap().is_empty());
    }
}
