#![allow(dead_code)]

use allure_store::{DefaultAllureStore, StoreConfig};
use std::sync::Once;
use std::time::Instant;
use tracing::info;

pub mod fixtures;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        allure_store::logging::init_test_logging();
    });
}

pub struct TestLogGuard {
    name: String,
    start: Instant,
}

impl TestLogGuard {
    fn new(name: &str) -> Self {
        init_test_logging();
        info!("{name}: starting");
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for TestLogGuard {
    fn drop(&mut self) {
        info!(
            "{}: assertions passed (elapsed {:?})",
            self.name,
            self.start.elapsed()
        );
    }
}

pub fn test_log(name: &str) -> TestLogGuard {
    TestLogGuard::new(name)
}

pub fn test_store() -> DefaultAllureStore {
    init_test_logging();
    DefaultAllureStore::default()
}

pub fn test_store_with(config: StoreConfig) -> DefaultAllureStore {
    init_test_logging();
    DefaultAllureStore::new(config)
}
