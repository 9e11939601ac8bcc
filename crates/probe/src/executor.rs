use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assertions::{self, ResponseView};
use crate::error::{ConfigError, TransportError};
use crate::request::{self, DEFAULT_USER_AGENT, validation};
use crate::timing::{DEFAULT_MAX_BODY_BYTES, PhaseRecorder, Transport};
use crate::types::{BlobState, ExecutionMode, Monitor, MonitorResult};

/// Default bound on a single request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Execution settings shared by every run of an executor
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Name of the location results are recorded from
    pub location: String,
    /// Used when the monitor does not carry its own timeout
    pub timeout: Duration,
    pub user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            location: "local".to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Monitor executor - runs one monitor and produces its result.
///
/// Holds no per-execution state, so one instance serves any number of
/// concurrent executions.
#[derive(Debug, Clone)]
pub struct Executor {
    transport: Transport,
    options: ExecutorOptions,
}

impl Executor {
    pub fn new(transport: Transport, options: ExecutorOptions) -> Self {
        let transport = transport.with_max_body_bytes(options.max_body_bytes);
        Self { transport, options }
    }

    /// Executor over the system resolver and native TLS roots
    pub fn system(options: ExecutorOptions) -> Result<Self, rustls::Error> {
        Ok(Self::new(Transport::system()?, options))
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Execute a monitor under a freshly generated result id
    pub async fn execute(
        &self,
        monitor: &Monitor,
        mode: ExecutionMode,
    ) -> Result<MonitorResult, ConfigError> {
        self.execute_with_id(monitor, mode, mode.generate_result_id()).await
    }

    /// Execute a monitor under a caller supplied result id
    pub async fn execute_with_id(
        &self,
        monitor: &Monitor,
        mode: ExecutionMode,
        result_id: String,
    ) -> Result<MonitorResult, ConfigError> {
        self.execute_cancellable(monitor, mode, result_id, &CancellationToken::new()).await
    }

    /// Execute a monitor, giving up early when `cancel` fires.
    ///
    /// Only a malformed monitor is an error. Network failures, timeouts and
    /// cancellation all come back as a result with `err` set and no code.
    pub async fn execute_cancellable(
        &self,
        monitor: &Monitor,
        mode: ExecutionMode,
        result_id: String,
        cancel: &CancellationToken,
    ) -> Result<MonitorResult, ConfigError> {
        if let Some(timeout_ms) = monitor.timeout_ms {
            validation::validate_timeout(timeout_ms)?;
        }
        let request = request::prepare(monitor, &self.options.user_agent)?;
        let timeout = monitor.timeout_ms.map(Duration::from_millis).unwrap_or(self.options.timeout);

        debug!(monitor_id = %monitor.id, %result_id, url = %request.display_url, "Executing monitor");

        let recorder = PhaseRecorder::start();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            sent = tokio::time::timeout(timeout, self.transport.send(&request, &recorder)) => {
                sent.unwrap_or(Err(TransportError::Timeout))
            }
        };
        let timings = recorder.finish();

        let mut result = MonitorResult {
            id: result_id,
            monitor_id: monitor.id.clone(),
            account_id: monitor.account_id.clone(),
            mode,
            created_at: Utc::now(),
            url: request.display_url.clone(),
            method: request.method.to_string(),
            protocol: String::new(),
            ip: recorder.remote().map(|addr| addr.ip().to_string()).unwrap_or_default(),
            location: self.options.location.clone(),
            code: None,
            err: String::new(),
            timings,
            assert_results: Vec::new(),
            body: Vec::new(),
            headers: Vec::new(),
            blobs: BlobState::Pending,
        };

        match outcome {
            Ok(response) => {
                let view = ResponseView {
                    code: Some(response.code),
                    headers: &response.headers,
                    body: &response.body,
                    timings: &timings,
                };
                result.assert_results = assertions::evaluate(&monitor.assertions, &view);
                result.err = assertions::summary(&result.assert_results).unwrap_or_default();

                if response.truncated {
                    debug!(result_id = %result.id, "Response body truncated at {} bytes", response.body.len());
                }

                result.code = Some(response.code);
                result.protocol = response.protocol;
                result.ip = response.ip;
                result.headers = response.headers;
                result.body = response.body;

                info!(
                    monitor_id = %result.monitor_id,
                    result_id = %result.id,
                    code = response.code,
                    total_ms = timings.total,
                    err = %result.err,
                    "Monitor executed"
                );
            }
            Err(error) => {
                warn!(
                    monitor_id = %result.monitor_id,
                    result_id = %result.id,
                    kind = error.kind(),
                    "Monitor request failed: {error}"
                );
                result.assert_results = assertions::unanswered(&monitor.assertions);
                result.err = error.to_string();
            }
        }

        Ok(result)
    }
}
