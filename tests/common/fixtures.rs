#![allow(dead_code)]

use allure_store::model::{
    HistoryDataPoint, HistoryTestResult, RawFixtureResult, RawLabel, RawParameter, RawStep,
    RawTestAttachment, RawTestResult, RawTestStepResult, ReaderContext, Status,
};
use std::collections::BTreeMap;

/// Base time for fixtures: 2025-01-01 00:00:00 UTC in millis.
pub const BASE_TIME: i64 = 1_735_689_600_000;

pub fn context() -> ReaderContext {
    ReaderContext::new("fixtures")
}

pub fn raw_result(uuid: &str) -> RawTestResult {
    RawTestResult {
        uuid: Some(uuid.to_string()),
        name: Some(format!("test {uuid}")),
        full_name: Some(format!("suite.test_{uuid}")),
        status: Some("passed".to_string()),
        ..RawTestResult::default()
    }
}

pub struct RawResultBuilder {
    raw: RawTestResult,
}

impl RawResultBuilder {
    pub fn new(uuid: &str) -> Self {
        Self {
            raw: raw_result(uuid),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.raw.name = Some(name.to_string());
        self
    }

    pub fn with_full_name(mut self, full_name: &str) -> Self {
        self.raw.full_name = Some(full_name.to_string());
        self
    }

    pub fn with_history_id(mut self, history_id: &str) -> Self {
        self.raw.history_id = Some(history_id.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.raw.status = Some(status.to_string());
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.raw.message = Some(message.to_string());
        self
    }

    pub fn with_start(mut self, start: i64) -> Self {
        self.raw.start = Some(start);
        self
    }

    pub fn with_timing(mut self, start: i64, stop: i64) -> Self {
        self.raw.start = Some(start);
        self.raw.stop = Some(stop);
        self
    }

    pub fn with_label(mut self, name: &str, value: &str) -> Self {
        self.raw.labels.push(RawLabel::new(name, value));
        self
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.raw.parameters.push(RawParameter {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
            ..RawParameter::default()
        });
        self
    }

    pub fn with_attachment(mut self, file_name: &str, content_type: Option<&str>) -> Self {
        self.raw.steps.push(RawStep::Attachment(RawTestAttachment {
            name: Some(file_name.to_string()),
            original_file_name: file_name.to_string(),
            content_type: content_type.map(ToString::to_string),
        }));
        self
    }

    pub fn with_step_attachment(mut self, step_name: &str, file_name: &str) -> Self {
        self.raw.steps.push(RawStep::Step(RawTestStepResult {
            name: Some(step_name.to_string()),
            status: Some("passed".to_string()),
            steps: vec![RawStep::Attachment(RawTestAttachment::new(file_name))],
            ..RawTestStepResult::default()
        }));
        self
    }

    pub fn build(self) -> RawTestResult {
        self.raw
    }
}

pub fn raw_fixture(uuid: &str, fixture_type: &str, wraps: &[&str]) -> RawFixtureResult {
    RawFixtureResult {
        uuid: Some(uuid.to_string()),
        fixture_type: Some(fixture_type.to_string()),
        test_result_ids: wraps.iter().map(ToString::to_string).collect(),
        name: Some(format!("{fixture_type} {uuid}")),
        status: Some("passed".to_string()),
        ..RawFixtureResult::default()
    }
}

pub fn history_entry(id: &str, status: Status) -> HistoryTestResult {
    HistoryTestResult {
        id: id.to_string(),
        name: format!("test {id}"),
        full_name: None,
        environment: None,
        status,
        error: None,
        start: None,
        stop: None,
        duration: None,
        labels: Vec::new(),
        url: None,
        history_id: None,
    }
}

pub fn history_point(uuid: &str, timestamp: i64, entries: &[(&str, HistoryTestResult)]) -> HistoryDataPoint {
    HistoryDataPoint {
        uuid: uuid.to_string(),
        name: format!("run {uuid}"),
        timestamp,
        known_test_case_ids: Vec::new(),
        test_results: entries
            .iter()
            .map(|(history_id, entry)| ((*history_id).to_string(), entry.clone()))
            .collect::<BTreeMap<_, _>>(),
        metrics: BTreeMap::new(),
        url: None,
    }
}
