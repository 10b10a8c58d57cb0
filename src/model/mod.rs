//! Core data types for `allure_store`.
//!
//! This module defines the canonical state model the store holds:
//! - `TestResult` - One execution of one test case
//! - `TestCase` - Deduplicated identity of "the same test"
//! - `TestFixtureResult` - A setup/teardown execution
//! - `AttachmentLink` - A typed reference to attachment bytes
//! - `TestStep` - Recursive step/attachment nodes
//!
//! Raw reader-facing records live in [`raw`], history inputs in
//! [`history`], and the attachment byte handle in [`file`].

pub mod file;
pub mod history;
pub mod raw;

pub use file::{BufferResultFile, ResultFile};
pub use history::{HistoryDataPoint, HistoryTestResult, KnownTestFailure};
pub use raw::{
    RawFixtureResult, RawLabel, RawLink, RawMetadata, RawParameter, RawStep, RawTestAttachment,
    RawTestResult, RawTestStepResult, ReaderContext, raw_test_result_schema,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment every result lands in when no matcher claims it.
pub const DEFAULT_ENVIRONMENT: &str = "default";

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Test execution status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Broken,
    Skipped,
    #[default]
    Unknown,
}

impl Status {
    /// All statuses, in histogram display order.
    pub const ALL: [Self; 5] = [
        Self::Failed,
        Self::Broken,
        Self::Passed,
        Self::Skipped,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Broken => "broken",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }

    /// Failed or broken.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Broken)
    }

    /// Rank used to pick the worst status of a group (higher is worse).
    ///
    /// failed > broken > unknown > skipped > passed
    #[must_use]
    pub const fn severity(&self) -> u8 {
        match self {
            Self::Failed => 4,
            Self::Broken => 3,
            Self::Unknown => 2,
            Self::Skipped => 1,
            Self::Passed => 0,
        }
    }

    /// The worst status among `statuses`, or `None` for an empty input.
    #[must_use]
    pub fn worst<I: IntoIterator<Item = Self>>(statuses: I) -> Option<Self> {
        statuses.into_iter().max_by_key(Self::severity)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::error::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "broken" => Ok(Self::Broken),
            "skipped" => Ok(Self::Skipped),
            "unknown" => Ok(Self::Unknown),
            other => Err(crate::error::StoreError::InvalidStatus {
                status: other.to_string(),
            }),
        }
    }
}

/// Setup or teardown fixture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureType {
    Before,
    After,
}

impl FixtureType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl fmt::Display for FixtureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FixtureType {
    type Err = crate::error::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "before" | "setup" => Ok(Self::Before),
            "after" | "teardown" => Ok(Self::After),
            other => Err(crate::error::StoreError::InvalidFixtureType {
                fixture_type: other.to_string(),
            }),
        }
    }
}

/// A name/value label. Values may be absent; duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Label {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Collect every value the labels carry for `name`, in label order.
#[must_use]
pub fn label_values<'a>(labels: &'a [Label], name: &str) -> Vec<&'a str> {
    labels
        .iter()
        .filter(|label| label.name == name)
        .filter_map(|label| label.value.as_deref())
        .collect()
}

/// A test parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub excluded: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub masked: bool,
}

/// External link (issue tracker, TMS, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

/// Failure details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl TestError {
    /// `None` when neither message nor trace is present.
    #[must_use]
    pub fn from_parts(message: Option<String>, trace: Option<String>) -> Option<Self> {
        if message.is_none() && trace.is_none() {
            None
        } else {
            Some(Self { message, trace })
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub reader_id: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Handle to an [`AttachmentLink`] owned by the store.
///
/// Steps hold the handle, never a copy of the link, so updates made to the
/// link after the step was created are observed on every lookup.
pub type AttachmentId = String;

/// A named, typed reference to attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentLink {
    /// `md5(original_file_name)`.
    pub id: AttachmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub original_file_name: String,
    /// Extension including the leading dot, empty when unknown.
    #[serde(default)]
    pub ext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    /// Referenced by at least one step.
    pub used: bool,
    /// Referenced by a step but the bytes never arrived.
    pub missed: bool,
}

/// A regular step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultTestStep {
    pub name: String,
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
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<TestStep>,
}

/// A step node pointing at an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub link_id: AttachmentId,
}

/// Recursive step tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TestStep {
    Step(DefaultTestStep),
    Attachment(AttachmentStep),
}

impl TestStep {
    /// Visit every attachment handle in this subtree, depth first.
    pub fn for_each_attachment<'a>(&'a self, f: &mut impl FnMut(&'a AttachmentId)) {
        match self {
            Self::Attachment(step) => f(&step.link_id),
            Self::Step(step) => {
                for child in &step.steps {
                    child.for_each_attachment(f);
                }
            }
        }
    }
}

/// Deduplicated identity of a test across executions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// One execution of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case: Option<TestCase>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flaky: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub muted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub known: bool,
    /// Superseded by a newer retry; excluded from default views.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<TestStep>,
    pub source_metadata: SourceMetadata,
}

impl TestResult {
    /// Values this result carries for label `name`.
    #[must_use]
    pub fn label_values(&self, name: &str) -> Vec<&str> {
        label_values(&self.labels, name)
    }

    /// True if any label is named `name`, with or without a value.
    #[must_use]
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }

    /// Every attachment handle referenced from the step tree, deduplicated,
    /// in first-reference order.
    #[must_use]
    pub fn attachment_ids(&self) -> Vec<AttachmentId> {
        collect_attachment_ids(&self.steps)
    }
}

/// A setup/teardown execution wrapping one or more test results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFixtureResult {
    pub id: String,
    #[serde(rename = "type")]
    pub fixture_type: FixtureType,
    pub name: String,
    pub test_result_ids: Vec<String>,
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
    pub steps: Vec<TestStep>,
    pub source_metadata: SourceMetadata,
}

impl TestFixtureResult {
    /// Every attachment handle referenced from the step tree, deduplicated.
    #[must_use]
    pub fn attachment_ids(&self) -> Vec<AttachmentId> {
        collect_attachment_ids(&self.steps)
    }
}

fn collect_attachment_ids(steps: &[TestStep]) -> Vec<AttachmentId> {
    let mut ids: Vec<AttachmentId> = Vec::new();
    for step in steps {
        step.for_each_attachment(&mut |id| {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        });
    }
    ids
}

/// Outcome of grouping every execution of a test case by environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnvGroup {
    /// Test case id.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Worst status across every result of the test case.
    pub status: Status,
    /// Environment name → id of the result routed there.
    pub test_results_by_env: std::collections::BTreeMap<String, String>,
}
