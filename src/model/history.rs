//! Past report snapshots and externally accepted failures.
//!
//! Both are loaded once when a store is built and never change afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Label, Link, Status, TestError};
use crate::error::{Result, StoreError};

/// Compact record of one test result from a past report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTestResult {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
}

/// One past report's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDataPoint {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    /// Epoch millis of the report build.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_test_case_ids: Vec<String>,
    /// History id → result.
    #[serde(default)]
    pub test_results: BTreeMap<String, HistoryTestResult>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl HistoryDataPoint {
    /// Build time as a UTC timestamp, if the millis are representable.
    #[must_use]
    pub fn built_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// A failure marked as pre-known/accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownTestFailure {
    pub history_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
}

impl KnownTestFailure {
    #[must_use]
    pub fn new(history_id: impl Into<String>) -> Self {
        Self {
            history_id: history_id.into(),
            issues: Vec::new(),
            comment: None,
            error: None,
        }
    }
}

/// Parse history JSONL: one [`HistoryDataPoint`] per line.
///
/// Blank lines are skipped. Order is preserved as read; the store sorts.
///
/// # Errors
///
/// Returns `JsonlParse` with the 1-based line number of the first line that
/// is not a valid data point.
pub fn parse_history_jsonl(contents: &str) -> Result<Vec<HistoryDataPoint>> {
    let mut points = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let point: HistoryDataPoint =
            serde_json::from_str(trimmed).map_err(|e| StoreError::JsonlParse {
                line: index + 1,
                reason: e.to_string(),
            })?;
        points.push(point);
    }
    Ok(points)
}

/// Parse a JSON array of known failures.
///
/// # Errors
///
/// Returns an error if the input is not a JSON array of known failures.
pub fn parse_known_failures_json(contents: &str) -> Result<Vec<KnownTestFailure>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_jsonl_skips_blank_lines() {
        let input = concat!(
            r#"{"uuid":"a","timestamp":10,"testResults":{}}"#,
            "\n\n",
            r#"{"uuid":"b","timestamp":20,"testResults":{"h1":{"id":"x","name":"t","status":"failed"}}}"#,
            "\n"
        );
        let points = parse_history_jsonl(input).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].test_results["h1"].status, Status::Failed);
    }

    #[test]
    fn history_jsonl_reports_line_number() {
        let input = concat!(r#"{"uuid":"a","timestamp":10}"#, "\n", "not json\n");
        let err = parse_history_jsonl(input).unwrap_err();
        match err {
            StoreError::JsonlParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn known_failures_parse() {
        let known = parse_known_failures_json(r#"[{"historyId":"X"},{"historyId":"Y"}]"#).unwrap();
        assert_eq!(known.len(), 2);
        assert_eq!(known[0].history_id, "X");
        assert!(parse_known_failures_json("  ").unwrap().is_empty());
    }

    #[test]
    fn built_at_converts_millis() {
        let point = HistoryDataPoint {
            uuid: "a".to_string(),
            name: String::new(),
            timestamp: 1_700_000_000_000,
            known_test_case_ids: vec![],
            test_results: BTreeMap::new(),
            metrics: BTreeMap::new(),
            url: None,
        };
        assert_eq!(point.built_at().unwrap().timestamp(), 1_700_000_000);
    }
}
