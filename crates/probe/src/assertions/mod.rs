//! Declarative response checks.
//!
//! Evaluation is pure and total: every assertion yields exactly one
//! [`AssertionResult`], in input order, whatever the response looks like.
//! A failed check is data, never an error.

mod evaluate;

pub use evaluate::{MISSING, NO_RESPONSE, ResponseView, evaluate, summary, unanswered};

use serde::{Deserialize, Serialize};

/// What part of the response an assertion looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionKind {
    /// HTTP status code
    #[serde(alias = "status")]
    Code,
    /// Header named by `property`
    Header,
    /// Response body as text
    Body,
    /// Phase duration in milliseconds; `property` names the phase, `total` by default
    ResponseTime,
}

/// Comparison applied between the observed value and `value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionOp {
    #[serde(alias = "eq")]
    Equals,
    #[serde(alias = "ne")]
    NotEquals,
    #[serde(alias = "gt")]
    GreaterThan,
    #[serde(alias = "lt")]
    LessThan,
    /// Inclusive numeric range written as `low-high` or `low..high`
    Between,
    Contains,
    NotContains,
    /// Regular expression match
    Matches,
    Exists,
    NotExists,
}

/// One declarative check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    #[serde(rename = "type")]
    pub kind: AssertionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    pub op: AssertionOp,

    #[serde(default, deserialize_with = "value_as_string")]
    pub value: String,
}

impl Assertion {
    pub fn new(kind: AssertionKind, op: AssertionOp, value: impl Into<String>) -> Self {
        Self { kind, property: None, op, value: value.into() }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn status(op: AssertionOp, value: impl ToString) -> Self {
        Self::new(AssertionKind::Code, op, value.to_string())
    }

    pub fn header(name: impl Into<String>, op: AssertionOp, value: impl Into<String>) -> Self {
        Self::new(AssertionKind::Header, op, value).with_property(name)
    }

    pub fn body(op: AssertionOp, value: impl Into<String>) -> Self {
        Self::new(AssertionKind::Body, op, value)
    }

    pub fn response_time(op: AssertionOp, millis: impl ToString) -> Self {
        Self::new(AssertionKind::ResponseTime, op, millis.to_string())
    }
}

/// Outcome of one assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub assertion: Assertion,
    pub actual: String,
    pub pass: bool,
}

/// Monitors written by hand often carry `"value": 200`; accept numbers too.
fn value_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_json_shape() {
        let assertion: Assertion =
            serde_json::from_str(r#"{"type": "code", "op": "equals", "value": 200}"#).unwrap();
        assert_eq!(assertion, Assertion::status(AssertionOp::Equals, 200));

        let short: Assertion =
            serde_json::from_str(r#"{"type": "status", "op": "eq", "value": 200}"#).unwrap();
        assert_eq!(short, assertion);

        let header: Assertion = serde_json::from_str(
            r#"{"type": "header", "property": "content-type", "op": "contains", "value": "json"}"#,
        )
        .unwrap();
        assert_eq!(header.property.as_deref(), Some("content-type"));

        let json = serde_json::to_value(Assertion::response_time(AssertionOp::LessThan, 500)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "responseTime", "op": "lessThan", "value": "500"}));
    }
}
