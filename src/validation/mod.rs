//! Validation of raw reader records.
//!
//! These routines enforce the constraints the conversion layer relies on
//! and return every violation found, with path-like field names such as
//! `steps[0].steps[2].originalFileName`. They never touch the store.

use crate::error::ValidationError;
use crate::model::{RawFixtureResult, RawParameter, RawStep, RawTestResult};

/// Validates raw test results.
pub struct RawResultValidator;

impl RawResultValidator {
    /// Validate a raw test result and return all validation errors found.
    ///
    /// # Errors
    ///
    /// Returns a `Vec<ValidationError>` if any validation rules are violated.
    pub fn validate(raw: &RawTestResult) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        // Reader-supplied ids must not be blank.
        if raw.uuid.as_deref().is_some_and(|id| id.trim().is_empty()) {
            errors.push(ValidationError::new("uuid", "cannot be blank"));
        }

        check_timing(&mut errors, "", raw.start, raw.stop);
        check_parameters(&mut errors, "", &raw.parameters);

        for (index, label) in raw.labels.iter().enumerate() {
            if label.name.as_deref().is_none_or(|name| name.trim().is_empty()) {
                errors.push(ValidationError::new(
                    format!("labels[{index}].name"),
                    "cannot be empty",
                ));
            }
        }

        check_steps(&mut errors, "", &raw.steps);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validates raw fixture results.
pub struct RawFixtureValidator;

impl RawFixtureValidator {
    /// Validate a raw fixture and return all validation errors found.
    ///
    /// # Errors
    ///
    /// Returns a `Vec<ValidationError>` if any validation rules are violated.
    pub fn validate(raw: &RawFixtureResult) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if raw.uuid.as_deref().is_some_and(|id| id.trim().is_empty()) {
            errors.push(ValidationError::new("uuid", "cannot be blank"));
        }
        if raw.fixture_type.as_deref().is_none_or(|t| t.trim().is_empty()) {
            errors.push(ValidationError::new("type", "is required"));
        }
        for (index, id) in raw.test_result_ids.iter().enumerate() {
            if id.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("testResultIds[{index}]"),
                    "cannot be empty",
                ));
            }
        }
        check_timing(&mut errors, "", raw.start, raw.stop);
        check_steps(&mut errors, "", &raw.steps);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_timing(errors: &mut Vec<ValidationError>, prefix: &str, start: Option<i64>, stop: Option<i64>) {
    if let (Some(start), Some(stop)) = (start, stop) {
        if stop < start {
            errors.push(ValidationError::new(
                format!("{prefix}stop"),
                "cannot be before start",
            ));
        }
    }
}

fn check_parameters(errors: &mut Vec<ValidationError>, prefix: &str, parameters: &[RawParameter]) {
    for (index, parameter) in parameters.iter().enumerate() {
        if parameter.name.as_deref().is_none_or(|name| name.trim().is_empty()) {
            errors.push(ValidationError::new(
                format!("{prefix}parameters[{index}].name"),
                "cannot be empty",
            ));
        }
    }
}

fn check_steps(errors: &mut Vec<ValidationError>, prefix: &str, steps: &[RawStep]) {
    for (index, step) in steps.iter().enumerate() {
        let path = format!("{prefix}steps[{index}].");
        match step {
            RawStep::Attachment(attachment) => {
                if attachment.original_file_name.trim().is_empty() {
                    errors.push(ValidationError::new(
                        format!("{path}originalFileName"),
                        "cannot be empty",
                    ));
                }
            }
            RawStep::Step(step) => {
                check_timing(errors, &path, step.start, step.stop);
                check_parameters(errors, &path, &step.parameters);
                check_steps(errors, &path, &step.steps);
            }
        }
    }
}
