//! Result query filters and projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::ResultRecord;
use crate::error::ConfigError;

/// Closed set of result projections a caller may ask for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultView {
    /// id, monitor, completion time, total time, location, err
    #[default]
    Summary,
    /// every structured field
    Detail,
}

impl std::str::FromStr for ResultView {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(ResultView::Summary),
            "detail" => Ok(ResultView::Detail),
            _ => Err(ConfigError::UnknownView(s.to_string())),
        }
    }
}

/// Filter on the up/down outcome of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeFilter {
    Ok,
    Err,
}

/// Query over stored results; always scoped by the account passed alongside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFilter {
    pub monitor_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub outcome: Option<OutcomeFilter>,
    pub locations: Vec<String>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub view: ResultView,
    pub with_totals: bool,
}

impl Default for ResultFilter {
    fn default() -> Self {
        Self {
            monitor_id: None,
            start: None,
            end: None,
            outcome: None,
            locations: Vec::new(),
            limit: Some(100),
            offset: 0,
            view: ResultView::Summary,
            with_totals: false,
        }
    }
}

impl ResultFilter {
    pub fn for_monitor(monitor_id: impl Into<String>) -> Self {
        Self { monitor_id: Some(monitor_id.into()), ..Default::default() }
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn view(mut self, view: ResultView) -> Self {
        self.view = view;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Row of the summary projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub id: String,
    pub monitor_id: String,
    pub created_at: DateTime<Utc>,
    pub total_time: f64,
    pub location: String,
    pub err: String,
}

impl From<&ResultRecord> for ResultSummary {
    fn from(record: &ResultRecord) -> Self {
        Self {
            id: record.id.clone(),
            monitor_id: record.monitor_id.clone(),
            created_at: record.created_at,
            total_time: record.timings.total,
            location: record.location.clone(),
            err: record.err.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultRow {
    Summary(ResultSummary),
    Detail(Box<ResultRecord>),
}

impl ResultRow {
    pub fn err(&self) -> &str {
        match self {
            ResultRow::Summary(summary) => &summary.err,
            ResultRow::Detail(record) => &record.err,
        }
    }

    pub fn total_time(&self) -> f64 {
        match self {
            ResultRow::Summary(summary) => summary.total_time,
            ResultRow::Detail(record) => record.timings.total,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ResultRow::Summary(summary) => summary.created_at,
            ResultRow::Detail(record) => record.created_at,
        }
    }
}

/// Page of results, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    pub items: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_item_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_allow_list() {
        assert_eq!("summary".parse::<ResultView>().unwrap(), ResultView::Summary);
        assert_eq!(" Detail ".parse::<ResultView>().unwrap(), ResultView::Detail);
        assert!(matches!(
            "id; DROP TABLE monitor_results".parse::<ResultView>(),
            Err(ConfigError::UnknownView(_))
        ));
    }
}
