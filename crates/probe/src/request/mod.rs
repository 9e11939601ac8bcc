//! Turning a monitor definition into a concrete HTTP request.

mod build;
pub mod validation;

pub use build::{DEFAULT_USER_AGENT, PreparedRequest, build_request};
pub use validation::{validate_monitor, validate_resolved};

use crate::error::ConfigError;
use crate::types::Monitor;
use crate::variables;

/// Resolve variables, validate and build the request for a monitor
pub fn prepare(monitor: &Monitor, user_agent: &str) -> Result<PreparedRequest, ConfigError> {
    let resolved = variables::resolve_monitor(monitor);
    let url = validate_resolved(&resolved)?;
    build_request(&resolved, url, user_agent)
}
