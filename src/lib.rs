//! `allure_store` - in-memory test result store for Allure reports.
//!
//! Readers push raw records through [`ResultsVisitor`]; report generators
//! query the normalized model through [`AllureStore`]. On top of the store
//! sit the tree builder ([`tree`]), statistics ([`stats`]) and comparator
//! combinators ([`util::compare`]).
//!
//! ```
//! use allure_store::{AllureStore, DefaultAllureStore, ResultFilter, ResultsVisitor};
//! use allure_store::model::{RawTestResult, ReaderContext};
//!
//! let mut store = DefaultAllureStore::default();
//! let raw = RawTestResult {
//!     uuid: Some("tr-1".to_string()),
//!     name: Some("login works".to_string()),
//!     status: Some("passed".to_string()),
//!     ..RawTestResult::default()
//! };
//! store.visit_test_result(&raw, &ReaderContext::new("demo")).unwrap();
//! assert_eq!(store.all_test_results(ResultFilter::default()).len(), 1);
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod convert;
pub mod error;
pub mod logging;
pub mod model;
pub mod stats;
pub mod store;
pub mod tree;
pub mod util;
pub mod validation;

pub use config::{EnvironmentConfig, EnvironmentMatcher, LabelMatcher, ReportConfig, StoreConfig};
pub use error::{Result, StoreError, ValidationError};
pub use stats::{Statistic, get_test_results_stats};
pub use store::{
    AllureStore, AttachmentFilter, DefaultAllureStore, EventLog, HistoryKey, ResultFilter,
    ResultsVisitor, StoreEvent,
};
pub use tree::{TreeData, create_test_results_tree, create_tree_by_labels};
