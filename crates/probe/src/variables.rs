//! `{{name}}` placeholder substitution.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::{Monitor, Tuple};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Merge monitor variables with environment overrides; env entries win.
pub fn merge(variables: &[Tuple], env: &[Tuple]) -> HashMap<String, String> {
    variables
        .iter()
        .chain(env.iter())
        .map(|(name, value)| (name.trim().to_string(), value.clone()))
        .collect()
}

/// Replace every known placeholder in `text`; unknown ones stay literal.
pub fn substitute(text: &str, vars: &HashMap<String, String>) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }

    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn substitute_tuples(tuples: &[Tuple], vars: &HashMap<String, String>) -> Vec<Tuple> {
    tuples
        .iter()
        .map(|(name, value)| (substitute(name, vars), substitute(value, vars)))
        .collect()
}

/// Request fields of a monitor after variable resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<Tuple>,
    pub query_params: Vec<Tuple>,
    pub body: Option<String>,
}

/// Resolve all placeholders in url, headers, query params and body.
pub fn resolve_monitor(monitor: &Monitor) -> ResolvedRequest {
    let vars = merge(&monitor.variables, &monitor.env);

    ResolvedRequest {
        method: monitor.method.trim().to_uppercase(),
        url: substitute(monitor.url.trim(), &vars),
        headers: substitute_tuples(&monitor.headers, &vars),
        query_params: substitute_tuples(&monitor.query_params, &vars),
        body: monitor.body.as_deref().map(|body| substitute(body, &vars)),
    }
}
