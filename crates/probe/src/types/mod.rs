//! Core data types shared by the executor, the sink and the stores.

pub mod activity;
pub mod monitor;
pub mod query;
pub mod result;

pub use activity::{ActivityKind, ActivityLogEntry};
pub use monitor::{ExecutionMode, Monitor, MonitorStatus, Tuple};
pub use query::{OutcomeFilter, ResultFilter, ResultPage, ResultRow, ResultSummary, ResultView};
pub use result::{BlobState, MonitorResult, PhaseTimings, ResultRecord};
