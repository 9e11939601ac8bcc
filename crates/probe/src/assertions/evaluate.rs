use regex::Regex;

use super::{Assertion, AssertionKind, AssertionOp, AssertionResult};
use crate::types::{PhaseTimings, Tuple};

/// Actual value recorded when the response lacks what the assertion targets
pub const MISSING: &str = "<missing>";

/// Actual value recorded for every assertion of a run that got no response
pub const NO_RESPONSE: &str = "<no response>";

const BODY_PREVIEW_CHARS: usize = 256;

/// The parts of a completed response assertions can look at
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    pub code: Option<u16>,
    pub headers: &'a [Tuple],
    pub body: &'a [u8],
    pub timings: &'a PhaseTimings,
}

enum Outcome {
    Pass,
    Fail,
    /// The comparison itself could not be made; the reason replaces the actual value
    Invalid(String),
}

impl From<bool> for Outcome {
    fn from(pass: bool) -> Self {
        if pass { Outcome::Pass } else { Outcome::Fail }
    }
}

/// Evaluate every assertion against the response, preserving order
pub fn evaluate(assertions: &[Assertion], response: &ResponseView<'_>) -> Vec<AssertionResult> {
    assertions.iter().map(|assertion| evaluate_one(assertion, response)).collect()
}

/// Results for a run that never got a response: every assertion fails
pub fn unanswered(assertions: &[Assertion]) -> Vec<AssertionResult> {
    assertions
        .iter()
        .map(|assertion| AssertionResult {
            assertion: assertion.clone(),
            actual: NO_RESPONSE.to_string(),
            pass: false,
        })
        .collect()
}

/// Error summary for a result, `None` when every assertion passed
pub fn summary(results: &[AssertionResult]) -> Option<String> {
    let failed = results.iter().filter(|result| !result.pass).count();
    (failed > 0).then(|| format!("assertion failed: {failed} of {} checks failed", results.len()))
}

fn evaluate_one(assertion: &Assertion, response: &ResponseView<'_>) -> AssertionResult {
    let (actual, outcome) = match observe(assertion, response) {
        Observed::Value { actual, numeric } => {
            let outcome = compare(assertion.op, &actual, numeric, &assertion.value);
            (actual, outcome)
        }
        Observed::Missing => {
            (MISSING.to_string(), Outcome::from(assertion.op == AssertionOp::NotExists))
        }
        Observed::Invalid(reason) => (String::new(), Outcome::Invalid(reason)),
    };

    let (actual, pass) = match outcome {
        Outcome::Pass => (preview(actual), true),
        Outcome::Fail => (preview(actual), false),
        Outcome::Invalid(reason) => (reason, false),
    };

    AssertionResult { assertion: assertion.clone(), actual, pass }
}

enum Observed {
    Value { actual: String, numeric: Option<f64> },
    Missing,
    Invalid(String),
}

fn observe(assertion: &Assertion, response: &ResponseView<'_>) -> Observed {
    match assertion.kind {
        AssertionKind::Code => match response.code {
            Some(code) => Observed::Value { actual: code.to_string(), numeric: Some(code.into()) },
            None => Observed::Missing,
        },
        AssertionKind::Header => {
            let Some(name) = assertion.property.as_deref().map(str::trim).filter(|n| !n.is_empty())
            else {
                return Observed::Invalid("<missing header name>".to_string());
            };

            let values: Vec<&str> = response
                .headers
                .iter()
                .filter(|(header, _)| header.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
                .collect();

            if values.is_empty() {
                Observed::Missing
            } else {
                let actual = values.join(", ");
                let numeric = actual.trim().parse().ok();
                Observed::Value { actual, numeric }
            }
        }
        AssertionKind::Body => {
            // An empty body is still a body
            let text = String::from_utf8_lossy(response.body).into_owned();
            let numeric = text.trim().parse().ok();
            Observed::Value { actual: text, numeric }
        }
        AssertionKind::ResponseTime => {
            let phase = assertion.property.as_deref().unwrap_or("total");
            match response.timings.get(phase) {
                Some(millis) => {
                    Observed::Value { actual: format!("{millis:.3}"), numeric: Some(millis) }
                }
                None => Observed::Invalid(format!("<unknown phase: {phase}>")),
            }
        }
    }
}

/// Bodies can be large; only the head of the actual value is recorded
fn preview(actual: String) -> String {
    if actual.chars().count() <= BODY_PREVIEW_CHARS {
        return actual;
    }
    let mut short: String = actual.chars().take(BODY_PREVIEW_CHARS).collect();
    short.push('…');
    short
}

fn compare(op: AssertionOp, actual: &str, numeric: Option<f64>, expected: &str) -> Outcome {
    let expected_trimmed = expected.trim();
    let expected_number = expected_trimmed.parse::<f64>().ok();

    match op {
        AssertionOp::Equals => match (numeric, expected_number) {
            (Some(a), Some(e)) => Outcome::from(a == e),
            _ => Outcome::from(actual == expected),
        },
        AssertionOp::NotEquals => match (numeric, expected_number) {
            (Some(a), Some(e)) => Outcome::from(a != e),
            _ => Outcome::from(actual != expected),
        },
        AssertionOp::GreaterThan | AssertionOp::LessThan => {
            let Some(a) = numeric else {
                return Outcome::Invalid(format!("not a number: {actual}"));
            };
            let Some(e) = expected_number else {
                return Outcome::Invalid(format!("invalid expected number: {expected}"));
            };
            Outcome::from(if op == AssertionOp::GreaterThan { a > e } else { a < e })
        }
        AssertionOp::Between => {
            let Some(a) = numeric else {
                return Outcome::Invalid(format!("not a number: {actual}"));
            };
            match parse_range(expected_trimmed) {
                Some((low, high)) => Outcome::from(low <= a && a <= high),
                None => Outcome::Invalid(format!("invalid range: {expected}")),
            }
        }
        AssertionOp::Contains => Outcome::from(actual.contains(expected)),
        AssertionOp::NotContains => Outcome::from(!actual.contains(expected)),
        AssertionOp::Matches => match Regex::new(expected) {
            Ok(pattern) => Outcome::from(pattern.is_match(actual)),
            Err(e) => Outcome::Invalid(format!("invalid pattern: {e}")),
        },
        AssertionOp::Exists => Outcome::Pass,
        AssertionOp::NotExists => Outcome::Fail,
    }
}

/// `200-299` or `200..299`, inclusive
fn parse_range(range: &str) -> Option<(f64, f64)> {
    let (low, high) = range.split_once("..").or_else(|| range.split_once('-'))?;
    let low = low.trim().parse::<f64>().ok()?;
    let high = high.trim_start_matches('=').trim().parse::<f64>().ok()?;
    (low <= high).then_some((low, high))
}
