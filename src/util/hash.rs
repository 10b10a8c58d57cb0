//! Stable fingerprints for attachments, test cases and history.
//!
//! Allure identifies attachments and history by lowercase MD5 hex, so these
//! ids stay compatible with history produced by other Allure tooling.

use md5::{Digest, Md5};

use crate::model::Parameter;

/// Lowercase hex MD5 of `input`.
#[must_use]
pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Attachment identity: `md5(original_file_name)`.
#[must_use]
pub fn attachment_id(original_file_name: &str) -> String {
    md5_hex(original_file_name)
}

/// Test case identity: the reader's test id, else `md5(full_name)`.
#[must_use]
pub fn test_case_id(test_id: Option<&str>, full_name: Option<&str>) -> Option<String> {
    match (test_id, full_name) {
        (Some(id), _) if !id.trim().is_empty() => Some(id.to_string()),
        (_, Some(name)) if !name.trim().is_empty() => Some(md5_hex(name)),
        _ => None,
    }
}

/// Fingerprint of the parameters that distinguish executions.
///
/// Excluded parameters are skipped; the rest are sorted by name so reader
/// ordering does not change the hash.
#[must_use]
pub fn parameters_hash(parameters: &[Parameter]) -> String {
    let mut parts: Vec<String> = parameters
        .iter()
        .filter(|p| !p.excluded)
        .map(|p| format!("{}:{}", p.name, p.value))
        .collect();
    parts.sort();
    md5_hex(&parts.join(","))
}

/// History id: `<test case id>.<parameters hash>`.
#[must_use]
pub fn compute_history_id(test_case_id: &str, parameters: &[Parameter]) -> String {
    format!("{test_case_id}.{}", parameters_hash(parameters))
}
