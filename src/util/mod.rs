//! Shared utilities for `allure_store`.
//!
//! - Identity hashing (md5 ids, history ids)
//! - Id generation for records that arrive without one
//! - Content type and extension tables
//! - Comparator combinators

pub mod compare;
pub mod hash;
pub mod id;
pub mod mime;

pub use compare::{compare_by, nulls_last, ordinal, reverse, then};
pub use hash::{attachment_id, compute_history_id, md5_hex, parameters_hash, test_case_id};
pub use id::{IdConfig, IdGenerator};
pub use mime::{content_type_for_extension, extension_for_content_type, extension_of};
