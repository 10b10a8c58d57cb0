//! Store contracts and the in-memory implementation.
//!
//! Two traits split the store's surface:
//! - [`ResultsVisitor`]: the write side readers call during ingestion.
//! - [`AllureStore`]: the read side report generators query afterwards.
//!
//! Every read method is total. Unknown ids yield `None` or an empty
//! collection, so rendering code can query without existence checks.

pub mod events;
mod memory;

pub use events::{EventBus, EventLog, StoreEvent, Subscriber};
pub use memory::{DefaultAllureStore, HistoryKey};

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    AttachmentLink, HistoryDataPoint, HistoryTestResult, KnownTestFailure, RawFixtureResult,
    RawMetadata, RawTestResult, ReaderContext, ResultFile, TestCase, TestEnvGroup,
    TestFixtureResult, TestResult,
};
use crate::stats::Statistic;

/// Which attachment links `all_attachments` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentFilter {
    /// Include links whose file never arrived.
    pub include_missed: bool,
    /// Include files no step references.
    pub include_unused: bool,
}

/// Which test results list queries return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultFilter {
    /// Include results superseded by a retry.
    pub include_hidden: bool,
}

impl ResultFilter {
    #[must_use]
    pub const fn with_hidden() -> Self {
        Self {
            include_hidden: true,
        }
    }
}

/// Ingestion contract. Call order is up to the caller.
pub trait ResultsVisitor {
    /// Ingest one test result.
    ///
    /// # Errors
    ///
    /// Fails if the raw record is malformed or an environment matcher
    /// errors. Nothing is stored in either case.
    fn visit_test_result(&mut self, raw: &RawTestResult, context: &ReaderContext) -> Result<()>;

    /// Ingest one fixture.
    ///
    /// # Errors
    ///
    /// Fails if the raw record is malformed.
    fn visit_test_fixture_result(
        &mut self,
        raw: &RawFixtureResult,
        context: &ReaderContext,
    ) -> Result<()>;

    /// Ingest attachment bytes.
    ///
    /// # Errors
    ///
    /// The in-memory store never fails here; I/O-backed stores may.
    fn visit_attachment_file(
        &mut self,
        file: Arc<dyn ResultFile>,
        context: &ReaderContext,
    ) -> Result<()>;

    /// Shallow-merge reader metadata; later values win.
    fn visit_metadata(&mut self, record: RawMetadata);
}

/// Query contract.
pub trait AllureStore {
    fn all_test_cases(&self) -> Vec<&TestCase>;
    fn all_attachments(&self, filter: AttachmentFilter) -> Vec<&AttachmentLink>;
    fn all_metadata(&self) -> &RawMetadata;
    fn all_fixtures(&self) -> Vec<&TestFixtureResult>;
    /// Newest first.
    fn all_history_data_points(&self) -> &[HistoryDataPoint];
    fn all_known_issues(&self) -> &[KnownTestFailure];
    fn all_test_results(&self, filter: ResultFilter) -> Vec<&TestResult>;

    fn test_case_by_id(&self, tc_id: &str) -> Option<&TestCase>;
    fn test_result_by_id(&self, tr_id: &str) -> Option<&TestResult>;
    fn attachment_by_id(&self, attachment_id: &str) -> Option<&AttachmentLink>;
    fn attachment_content_by_id(&self, attachment_id: &str) -> Option<Arc<dyn ResultFile>>;
    fn metadata_value(&self, key: &str) -> Option<&serde_json::Value>;

    /// Metadata entry deserialized as `T`; `None` on a miss or a shape
    /// mismatch.
    fn metadata_by_key<T: DeserializeOwned>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        self.metadata_value(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    fn test_results_by_tc_id(&self, tc_id: &str) -> Vec<&TestResult>;
    fn attachments_by_tr_id(&self, tr_id: &str) -> Vec<&AttachmentLink>;
    fn fixtures_by_tr_id(&self, tr_id: &str) -> Vec<&TestFixtureResult>;

    /// Hidden results sharing the result's history id, newest first,
    /// results without `start` last.
    fn retries_by_tr_id(&self, tr_id: &str) -> Vec<&TestResult>;

    /// The result's entries in past reports, newest first.
    fn history_by_tr_id(&self, tr_id: &str) -> Vec<HistoryTestResult>;

    /// Non-hidden failed or broken results.
    fn failed_test_results(&self) -> Vec<&TestResult>;

    /// Failed results whose history id is not a known failure.
    fn unknown_failed_test_results(&self) -> Vec<&TestResult>;

    /// Label value → results. Results without the label go under `"_"`.
    fn test_results_by_label(&self, label_name: &str) -> BTreeMap<String, Vec<&TestResult>>;

    /// Histogram of non-hidden results passing `filter`.
    fn tests_statistic(&self, filter: Option<&dyn Fn(&TestResult) -> bool>) -> Statistic;

    fn all_environments(&self) -> Vec<String>;
    fn test_results_by_environment(&self, environment: &str, filter: ResultFilter)
    -> Vec<&TestResult>;
    fn all_test_env_groups(&self) -> Vec<TestEnvGroup>;
    fn all_variables(&self) -> BTreeMap<String, String>;
    fn env_variables(&self, environment: &str) -> BTreeMap<String, String>;
}
