//! Account scoped monitor management on top of the repository and the
//! result sink.

pub mod stats;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use probe::request::validate_monitor;
use probe::types::Tuple;
use probe::{
    ActivityLogEntry, ConfigError, ExecutionMode, Executor, Monitor, MonitorResult, MonitorStatus,
    MonitorStore, ResultFilter, ResultPage, ResultSink, ResultStore, StorageError, StoredResult,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{HealthStatus, MonitorList, PeriodStats, StatSummary};
use crate::database::{Repository, TupleColumn};

/// Number of recent results shown in a stat summary
const LAST_RESULTS: u32 = 12;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StorageError> for ServiceError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(what) => ServiceError::NotFound(what),
            StorageError::Conflict(what) => ServiceError::Conflict(what),
            other => ServiceError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Clone)]
pub struct MonitorService {
    repo: Arc<Repository>,
    sink: ResultSink,
    executor: Executor,
}

impl MonitorService {
    pub fn new(repo: Arc<Repository>, sink: ResultSink, executor: Executor) -> Self {
        Self { repo, sink, executor }
    }

    /// Store a new monitor under `account` with a fresh id
    pub async fn create(&self, account: &str, mut monitor: Monitor) -> Result<Monitor> {
        validate_monitor(&monitor)?;

        let now = Utc::now();
        monitor.id = Uuid::new_v4().to_string();
        monitor.account_id = account.to_string();
        monitor.created_at = now;
        monitor.updated_at = now;

        self.repo.create_monitor(&monitor).await.map_err(|error| match error {
            StorageError::Conflict(_) => {
                ServiceError::Conflict(format!("monitor named `{}` already exists", monitor.name))
            }
            other => other.into(),
        })?;

        info!(account, monitor_id = %monitor.id, name = %monitor.name, "Monitor created");
        Ok(monitor)
    }

    pub async fn update(&self, account: &str, mut monitor: Monitor) -> Result<Monitor> {
        validate_monitor(&monitor)?;
        monitor.account_id = account.to_string();
        monitor.updated_at = Utc::now();

        let updated = self
            .repo
            .update_monitor(account, &monitor)
            .await?
            .ok_or_else(|| ServiceError::NotFound(monitor.id.clone()))?;

        info!(account, monitor_id = %updated.id, status = %updated.status, "Monitor updated");
        Ok(updated)
    }

    /// Switch between active and paused
    pub async fn set_status(
        &self,
        account: &str,
        monitor_id: &str,
        status: MonitorStatus,
    ) -> Result<Monitor> {
        let mut monitor = self.find(account, monitor_id).await?;
        monitor.status = status;
        self.update(account, monitor).await
    }

    /// Remove a monitor, its results and their stored payloads
    pub async fn delete(&self, account: &str, monitor_id: &str) -> Result<Monitor> {
        let deleted = self
            .repo
            .delete_monitor(account, monitor_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(monitor_id.to_string()))?;

        self.sink.purge(account, monitor_id, &deleted.result_ids).await;

        info!(account, monitor_id, results = deleted.result_ids.len(), "Monitor deleted");
        Ok(deleted.monitor)
    }

    pub async fn find(&self, account: &str, monitor_id: &str) -> Result<Monitor> {
        self.repo
            .find_monitor(account, monitor_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(monitor_id.to_string()))
    }

    pub async fn list(&self, account: &str) -> Result<MonitorList> {
        Ok(self.repo.list_monitors(account).await?)
    }

    pub async fn set_env(&self, account: &str, monitor_id: &str, env: &[Tuple]) -> Result<()> {
        self.set_tuples(account, monitor_id, TupleColumn::Env, env).await
    }

    pub async fn set_variables(
        &self,
        account: &str,
        monitor_id: &str,
        variables: &[Tuple],
    ) -> Result<()> {
        self.set_tuples(account, monitor_id, TupleColumn::Variables, variables).await
    }

    async fn set_tuples(
        &self,
        account: &str,
        monitor_id: &str,
        column: TupleColumn,
        tuples: &[Tuple],
    ) -> Result<()> {
        if self.repo.set_tuples(account, monitor_id, column, tuples).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(monitor_id.to_string()))
        }
    }

    /// A single result with its body and headers
    pub async fn find_result(&self, account: &str, result_id: &str) -> Result<MonitorResult> {
        Ok(self.sink.load(account, result_id).await?)
    }

    pub async fn query_results(&self, account: &str, filter: &ResultFilter) -> Result<ResultPage> {
        Ok(self.repo.query_results(account, filter).await?)
    }

    /// Run a monitor immediately and store its result
    pub async fn run_now(
        &self,
        account: &str,
        monitor_id: &str,
    ) -> Result<(MonitorResult, StoredResult)> {
        let monitor = self.find(account, monitor_id).await?;
        let result = self.executor.execute(&monitor, ExecutionMode::OnDemand).await?;
        let stored = self.sink.store(account, result.clone()).await?;
        Ok((result, stored))
    }

    /// Latency percentiles for the last day and week, plus recent results
    pub async fn stat_summary(&self, account: &str, monitor_id: &str) -> Result<StatSummary> {
        let now = Utc::now();
        let monitor = self.repo.find_monitor(account, monitor_id).await?;

        let week = self.window(account, monitor_id, now - Duration::days(7), now, &[]).await?;
        let day = self.window(account, monitor_id, now - Duration::days(1), now, &[]).await?;
        let last_results = self.repo.latest_results(account, monitor_id, LAST_RESULTS).await?;

        let status = match (&monitor, last_results.first()) {
            (None, _) => HealthStatus::Unknown,
            (Some(monitor), _) if monitor.status == MonitorStatus::Paused => HealthStatus::Paused,
            (Some(_), Some(latest)) if latest.err.is_empty() => HealthStatus::Up,
            (Some(_), Some(_)) => HealthStatus::Down,
            (Some(_), None) => HealthStatus::Unknown,
        };

        Ok(StatSummary { monitor_id: monitor_id.to_string(), status, week, day, last_results })
    }

    pub async fn all_stat_summaries(&self, account: &str) -> Result<Vec<StatSummary>> {
        let monitors = self.repo.list_monitors(account).await?;
        let summaries =
            monitors.items.iter().map(|monitor| self.stat_summary(account, &monitor.id));
        futures::future::try_join_all(summaries).await
    }

    pub async fn stats_by_period(
        &self,
        account: &str,
        monitor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        locations: &[String],
    ) -> Result<PeriodStats> {
        self.window(account, monitor_id, start, end, locations).await
    }

    pub async fn activity(
        &self,
        account: &str,
        monitor_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>> {
        Ok(self.repo.list_activity(account, monitor_id, limit).await?)
    }

    async fn window(
        &self,
        account: &str,
        monitor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        locations: &[String],
    ) -> Result<PeriodStats> {
        let samples = self.repo.result_samples(account, monitor_id, start, end, locations).await?;
        Ok(stats::period_stats(&samples))
    }
}
