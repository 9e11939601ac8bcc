//! HTTP monitor execution engine.
//!
//! Runs a monitor definition as a single instrumented HTTP request, checks
//! the response against the monitor's assertions and persists the result
//! across a structured store and an object store.

pub mod assertions;
pub mod error;
pub mod executor;
pub mod request;
pub mod sink;
pub mod store;
pub mod timing;
pub mod types;
pub mod variables;

pub use assertions::{Assertion, AssertionKind, AssertionOp, AssertionResult};
pub use error::{ConfigError, StorageError, StorageTier, TransportError};
pub use executor::{Executor, ExecutorOptions};
pub use sink::{ResultSink, SinkOptions, StoredResult};
pub use store::{MonitorStore, ObjectStore, ResultStore};
pub use timing::{PhaseRecorder, Transport};
pub use types::{
    ActivityKind, ActivityLogEntry, BlobState, ExecutionMode, Monitor, MonitorResult,
    MonitorStatus, PhaseTimings, ResultFilter, ResultPage, ResultRecord, ResultRow, ResultView,
};
