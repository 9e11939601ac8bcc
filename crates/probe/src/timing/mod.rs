//! Timing instrumentation.
//!
//! [`Transport`] performs one request phase by phase and marks every
//! boundary on a [`PhaseRecorder`], which turns the marks into
//! non-overlapping [`PhaseTimings`](crate::types::PhaseTimings).

mod io;
pub mod recorder;
pub mod resolver;
pub mod transport;

pub use recorder::{Mark, PhaseRecorder};
pub use resolver::{Resolver, StaticResolver, SystemResolver};
pub use transport::{DEFAULT_MAX_BODY_BYTES, ObservedResponse, Transport, default_tls_config};
