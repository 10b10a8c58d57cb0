//! Raw record → canonical state conversion.
//!
//! Conversion is where attachment links are created and resolved, test
//! cases are deduplicated, and history ids are derived. It mutates only the
//! pieces of store state handed to it through [`ConversionState`].
//!
//! Attachment link rules when a step references `originalFileName`:
//! - No link yet: create one with `missed = true, used = true`. Content
//!   type comes from the step, else the file name extension. `ext` comes
//!   from the file name, else the declared content type.
//! - Link exists: `used = true`, a declared content type wins, `ext` is
//!   filled only if empty, `name` is taken from the step when given.

use std::collections::HashMap;
use tracing::{trace, warn};

use crate::error::{Result, StoreError};
use crate::model::{
    AttachmentId, AttachmentLink, AttachmentStep, DEFAULT_ENVIRONMENT, DefaultTestStep,
    FixtureType, Label, Link, Parameter, RawFixtureResult, RawLabel, RawLink, RawParameter,
    RawStep, RawTestAttachment, RawTestResult, RawTestStepResult, ReaderContext, SourceMetadata,
    Status, TestCase, TestError, TestFixtureResult, TestResult, TestStep,
};
use crate::util::hash::{attachment_id, compute_history_id, test_case_id};
use crate::util::id::IdGenerator;
use crate::util::mime::{content_type_for_extension, extension_for_content_type, extension_of};
use crate::validation::{RawFixtureValidator, RawResultValidator};

/// Name given to results whose reader reported neither name nor full name.
pub const UNKNOWN_TEST_NAME: &str = "Unknown test";

/// Name given to steps and fixtures without one.
pub const UNNAMED_STEP: &str = "Unnamed step";

/// Store state the conversion layer reads and writes.
pub struct ConversionState<'s> {
    pub attachments: &'s mut HashMap<AttachmentId, AttachmentLink>,
    pub test_cases: &'s mut HashMap<String, TestCase>,
    pub ids: &'s mut IdGenerator,
    /// Is this primary id already taken?
    pub id_taken: &'s dyn Fn(&str) -> bool,
}

/// Convert one raw test result.
///
/// The returned result has `environment = "default"`; the store resolves
/// the real environment after applying default labels.
///
/// # Errors
///
/// Returns a validation error if the raw record is malformed.
pub fn test_result_raw_to_state(
    state: &mut ConversionState<'_>,
    raw: &RawTestResult,
    context: &ReaderContext,
) -> Result<TestResult> {
    RawResultValidator::validate(raw).map_err(StoreError::from_validation_errors)?;

    let full_name = non_blank(raw.full_name.as_deref());
    let name = non_blank(raw.name.as_deref())
        .or_else(|| full_name.clone())
        .unwrap_or_else(|| UNKNOWN_TEST_NAME.to_string());
    let parameters = convert_parameters(&raw.parameters);

    let test_case = test_case_id(raw.test_id.as_deref(), full_name.as_deref())
        .map(|id| upsert_test_case(state.test_cases, id, &name, full_name.as_deref()));
    let history_id = non_blank(raw.history_id.as_deref()).or_else(|| {
        test_case
            .as_ref()
            .map(|tc| compute_history_id(&tc.id, &parameters))
    });

    let id = match non_blank(raw.uuid.as_deref()) {
        Some(id) => id,
        None => state
            .ids
            .next_result_id(&context.reader_id, &name, raw.start, state.id_taken),
    };

    let steps = convert_steps(state.attachments, &raw.steps);

    trace!(
        id = %id,
        history_id = ?history_id,
        reader = %context.reader_id,
        "Converted raw test result"
    );

    Ok(TestResult {
        id,
        name,
        full_name,
        history_id,
        test_case,
        status: parse_status(raw.status.as_deref()),
        error: TestError::from_parts(raw.message.clone(), raw.trace.clone()),
        start: raw.start,
        stop: raw.stop,
        duration: duration_of(raw.start, raw.stop, raw.duration),
        description: raw.description.clone(),
        description_html: raw.description_html.clone(),
        flaky: raw.flaky.unwrap_or(false),
        muted: raw.muted.unwrap_or(false),
        known: raw.known.unwrap_or(false),
        hidden: false,
        environment: DEFAULT_ENVIRONMENT.to_string(),
        labels: convert_labels(&raw.labels),
        parameters,
        links: convert_links(&raw.links),
        steps,
        source_metadata: source_metadata(context),
    })
}

/// Convert one raw fixture.
///
/// # Errors
///
/// Returns a validation error if the raw record is malformed, or
/// `InvalidFixtureType` if the type is neither before nor after.
pub fn test_fixture_result_raw_to_state(
    state: &mut ConversionState<'_>,
    raw: &RawFixtureResult,
    context: &ReaderContext,
) -> Result<TestFixtureResult> {
    RawFixtureValidator::validate(raw).map_err(StoreError::from_validation_errors)?;

    let fixture_type: FixtureType = raw.fixture_type.as_deref().unwrap_or_default().parse()?;
    let name = non_blank(raw.name.as_deref()).unwrap_or_else(|| UNNAMED_STEP.to_string());
    let id = match non_blank(raw.uuid.as_deref()) {
        Some(id) => id,
        None => state
            .ids
            .next_fixture_id(&context.reader_id, &name, raw.start, state.id_taken),
    };

    Ok(TestFixtureResult {
        id,
        fixture_type,
        name,
        test_result_ids: raw.test_result_ids.clone(),
        status: parse_status(raw.status.as_deref()),
        error: TestError::from_parts(raw.message.clone(), raw.trace.clone()),
        start: raw.start,
        stop: raw.stop,
        duration: duration_of(raw.start, raw.stop, raw.duration),
        steps: convert_steps(state.attachments, &raw.steps),
        source_metadata: source_metadata(context),
    })
}

/// Lenient status parsing: unrecognized values become `Unknown`.
#[must_use]
pub fn parse_status(status: Option<&str>) -> Status {
    match status {
        None => Status::Unknown,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(status = value, "Unrecognized status, using unknown");
            Status::Unknown
        }),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn duration_of(start: Option<i64>, stop: Option<i64>, duration: Option<i64>) -> Option<i64> {
    duration.or_else(|| match (start, stop) {
        (Some(start), Some(stop)) => stop.checked_sub(start),
        _ => None,
    })
}

fn source_metadata(context: &ReaderContext) -> SourceMetadata {
    SourceMetadata {
        reader_id: context.reader_id.clone(),
        metadata: context.metadata.clone().unwrap_or_default(),
    }
}

fn upsert_test_case(
    test_cases: &mut HashMap<String, TestCase>,
    id: String,
    name: &str,
    full_name: Option<&str>,
) -> TestCase {
    let entry = test_cases.entry(id).or_insert_with_key(|id| TestCase {
        id: id.clone(),
        name: name.to_string(),
        full_name: None,
    });
    if entry.full_name.is_none() {
        entry.full_name = full_name.map(ToString::to_string);
    }
    entry.clone()
}

fn convert_parameters(raw: &[RawParameter]) -> Vec<Parameter> {
    raw.iter()
        .map(|p| Parameter {
            name: p.name.clone().unwrap_or_default(),
            value: p.value.clone().unwrap_or_default(),
            hidden: p.hidden.unwrap_or(false),
            excluded: p.excluded.unwrap_or(false),
            masked: p.masked.unwrap_or(false),
        })
        .collect()
}

/// Raw labels as model labels; a missing name becomes empty.
pub fn convert_labels(raw: &[RawLabel]) -> Vec<Label> {
    raw.iter()
        .map(|l| Label {
            name: l.name.clone().unwrap_or_default(),
            value: l.value.clone(),
        })
        .collect()
}

fn convert_links(raw: &[RawLink]) -> Vec<Link> {
    raw.iter()
        .filter_map(|l| {
            let url = non_blank(l.url.as_deref())?;
            Some(Link {
                url,
                name: l.name.clone(),
                link_type: l.link_type.clone(),
            })
        })
        .collect()
}

fn convert_steps(
    attachments: &mut HashMap<AttachmentId, AttachmentLink>,
    raw: &[RawStep],
) -> Vec<TestStep> {
    raw.iter()
        .map(|step| match step {
            RawStep::Step(step) => TestStep::Step(convert_step(attachments, step)),
            RawStep::Attachment(attachment) => {
                TestStep::Attachment(link_attachment(attachments, attachment))
            }
        })
        .collect()
}

fn convert_step(
    attachments: &mut HashMap<AttachmentId, AttachmentLink>,
    raw: &RawTestStepResult,
) -> DefaultTestStep {
    DefaultTestStep {
        name: non_blank(raw.name.as_deref()).unwrap_or_else(|| UNNAMED_STEP.to_string()),
        status: parse_status(raw.status.as_deref()),
        error: TestError::from_parts(raw.message.clone(), raw.trace.clone()),
        start: raw.start,
        stop: raw.stop,
        duration: duration_of(raw.start, raw.stop, raw.duration),
        parameters: convert_parameters(&raw.parameters),
        steps: convert_steps(attachments, &raw.steps),
    }
}

/// Resolve or create the link a step attachment points at.
fn link_attachment(
    attachments: &mut HashMap<AttachmentId, AttachmentLink>,
    raw: &RawTestAttachment,
) -> AttachmentStep {
    let id = attachment_id(&raw.original_file_name);
    let declared_ext = || {
        extension_of(&raw.original_file_name)
            .or_else(|| {
                raw.content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .map(ToString::to_string)
            })
            .unwrap_or_default()
    };

    if let Some(link) = attachments.get_mut(&id) {
        link.used = true;
        if raw.content_type.is_some() {
            link.content_type.clone_from(&raw.content_type);
        }
        if link.ext.is_empty() {
            link.ext = declared_ext();
        }
        if raw.name.is_some() {
            link.name.clone_from(&raw.name);
        }
        trace!(attachment = %id, "Resolved step attachment against existing link");
    } else {
        let content_type = raw.content_type.clone().or_else(|| {
            extension_of(&raw.original_file_name)
                .and_then(|ext| content_type_for_extension(&ext))
                .map(ToString::to_string)
        });
        attachments.insert(
            id.clone(),
            AttachmentLink {
                id: id.clone(),
                name: raw.name.clone(),
                original_file_name: raw.original_file_name.clone(),
                ext: declared_ext(),
                content_type,
                content_length: None,
                used: true,
                missed: true,
            },
        );
        trace!(attachment = %id, "Created missed link for step attachment");
    }

    AttachmentStep {
        name: raw.name.clone(),
        link_id: id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        attachments: HashMap<AttachmentId, AttachmentLink>,
        test_cases: HashMap<String, TestCase>,
        ids: IdGenerator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                attachments: HashMap::new(),
                test_cases: HashMap::new(),
                ids: IdGenerator::default(),
            }
        }

        fn convert(&mut self, raw: &RawTestResult) -> Result<TestResult> {
            let taken = |_: &str| false;
            let mut state = ConversionState {
                attachments: &mut self.attachments,
                test_cases: &mut self.test_cases,
                ids: &mut self.ids,
                id_taken: &taken,
            };
            test_result_raw_to_state(&mut state, raw, &ReaderContext::new("test"))
        }

        fn convert_fixture(&mut self, raw: &RawFixtureResult) -> Result<TestFixtureResult> {
            let taken = |_: &str| false;
            let mut state = ConversionState {
                attachments: &mut self.attachments,
                test_cases: &mut self.test_cases,
                ids: &mut self.ids,
                id_taken: &taken,
            };
            test_fixture_result_raw_to_state(&mut state, raw, &ReaderContext::new("test"))
        }
    }

    fn attachment(name: &str, content_type: Option<&str>) -> RawStep {
        RawStep::Attachment(RawTestAttachment {
            name: Some("log".to_string()),
            original_file_name: name.to_string(),
            content_type: content_type.map(ToString::to_string),
        })
    }

    #[test]
    fn minimal_result_gets_defaults() {
        let mut fx = Fixture::new();
        let tr = fx.convert(&RawTestResult::default()).unwrap();
        assert!(tr.id.starts_with("tr-"));
        assert_eq!(tr.name, UNKNOWN_TEST_NAME);
        assert_eq!(tr.status, Status::Unknown);
        assert_eq!(tr.environment, DEFAULT_ENVIRONMENT);
        assert!(tr.history_id.is_none());
        assert!(tr.test_case.is_none());
        assert_eq!(tr.source_metadata.reader_id, "test");
    }

    #[test]
    fn history_id_derives_from_test_case_and_parameters() {
        let mut fx = Fixture::new();
        let raw = RawTestResult {
            full_name: Some("suite.Login#works".to_string()),
            parameters: vec![RawParameter {
                name: Some("browser".to_string()),
                value: Some("firefox".to_string()),
                ..RawParameter::default()
            }],
            ..RawTestResult::default()
        };
        let a = fx.convert(&raw).unwrap();
        let b = fx.convert(&raw).unwrap();
        assert_eq!(a.name, "suite.Login#works");
        assert_eq!(a.history_id, b.history_id);
        assert_ne!(a.id, b.id);
        assert_eq!(fx.test_cases.len(), 1);

        let tc = a.test_case.unwrap();
        assert!(a.history_id.unwrap().starts_with(&format!("{}.", tc.id)));
    }

    #[test]
    fn explicit_history_id_wins() {
        let mut fx = Fixture::new();
        let raw = RawTestResult {
            test_id: Some("T-1".to_string()),
            history_id: Some("X".to_string()),
            ..RawTestResult::default()
        };
        let tr = fx.convert(&raw).unwrap();
        assert_eq!(tr.history_id.as_deref(), Some("X"));
        assert_eq!(tr.test_case.unwrap().id, "T-1");
    }

    #[test]
    fn duration_falls_back_to_stop_minus_start() {
        let mut fx = Fixture::new();
        let raw = RawTestResult {
            start: Some(1_000),
            stop: Some(1_250),
            ..RawTestResult::default()
        };
        assert_eq!(fx.convert(&raw).unwrap().duration, Some(250));
    }

    #[test]
    fn duration_is_absent_when_timing_span_overflows() {
        let mut fx = Fixture::new();
        let raw = RawTestResult {
            start: Some(i64::MIN),
            stop: Some(i64::MAX),
            ..RawTestResult::default()
        };
        let tr = fx.convert(&raw).unwrap();
        assert_eq!(tr.duration, None);
        assert_eq!(tr.start, Some(i64::MIN));
    }

    #[test]
    fn unknown_status_string_is_lenient() {
        assert_eq!(parse_status(Some("exploded")), Status::Unknown);
        assert_eq!(parse_status(Some("Failed")), Status::Failed);
        assert_eq!(parse_status(None), Status::Unknown);
    }

    #[test]
    fn step_attachment_without_file_is_missed() {
        let mut fx = Fixture::new();
        let raw = RawTestResult {
            steps: vec![attachment("a.txt", None)],
            ..RawTestResult::default()
        };
        let tr = fx.convert(&raw).unwrap();
        let id = attachment_id("a.txt");
        assert_eq!(tr.attachment_ids(), vec![id.clone()]);
        let link = &fx.attachments[&id];
        assert!(link.missed);
        assert!(link.used);
        assert_eq!(link.ext, ".txt");
        assert_eq!(link.content_type.as_deref(), Some("text/plain"));
        assert_eq!(link.name.as_deref(), Some("log"));
    }

    #[test]
    fn extension_from_declared_content_type() {
        let mut fx = Fixture::new();
        let raw = RawTestResult {
            steps: vec![attachment("screenshot", Some("image/png"))],
            ..RawTestResult::default()
        };
        fx.convert(&raw).unwrap();
        let link = &fx.attachments[&attachment_id("screenshot")];
        assert_eq!(link.ext, ".png");
        assert_eq!(link.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn declared_content_type_overrides_existing_link() {
        let mut fx = Fixture::new();
        let id = attachment_id("data.bin");
        fx.attachments.insert(
            id.clone(),
            AttachmentLink {
                id: id.clone(),
                name: None,
                original_file_name: "data.bin".to_string(),
                ext: ".bin".to_string(),
                content_type: Some("application/octet-stream".to_string()),
                content_length: Some(4),
                used: false,
                missed: false,
            },
        );
        let raw = RawTestResult {
            steps: vec![attachment("data.bin", Some("application/json"))],
            ..RawTestResult::default()
        };
        fx.convert(&raw).unwrap();
        let link = &fx.attachments[&id];
        assert!(link.used);
        assert!(!link.missed);
        assert_eq!(link.content_type.as_deref(), Some("application/json"));
        assert_eq!(link.ext, ".bin");
        assert_eq!(link.name.as_deref(), Some("log"));
    }

    #[test]
    fn malformed_result_is_rejected() {
        let mut fx = Fixture::new();
        let raw = RawTestResult {
            steps: vec![attachment(" ", None)],
            ..RawTestResult::default()
        };
        let err = fx.convert(&raw).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(fx.attachments.is_empty());
    }

    #[test]
    fn fixture_type_parsing() {
        let mut fx = Fixture::new();
        let raw = RawFixtureResult {
            fixture_type: Some("teardown".to_string()),
            test_result_ids: vec!["tr-1".to_string()],
            ..RawFixtureResult::default()
        };
        let fixture = fx.convert_fixture(&raw).unwrap();
        assert_eq!(fixture.fixture_type, FixtureType::After);
        assert!(fixture.id.starts_with("fx-"));

        let bad = RawFixtureResult {
            fixture_type: Some("during".to_string()),
            ..RawFixtureResult::default()
        };
        assert!(matches!(
            fx.convert_fixture(&bad),
            Err(StoreError::InvalidFixtureType { .. })
        ));
    }
}
