//! Status histograms.
//!
//! A [`Statistic`] counts items per [`Status`]. It is what tree groups
//! accumulate while a tree is built and what the store reports for
//! `tests_statistic`.

use serde::{Deserialize, Serialize};

use crate::model::{Status, TestResult};

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Anything that carries a status and can be counted.
pub trait StatusItem {
    fn status(&self) -> Status;

    fn is_flaky(&self) -> bool {
        false
    }
}

impl StatusItem for TestResult {
    fn status(&self) -> Status {
        self.status
    }

    fn is_flaky(&self) -> bool {
        self.flaky
    }
}

impl StatusItem for Status {
    fn status(&self) -> Status {
        *self
    }
}

impl<T: StatusItem + ?Sized> StatusItem for &T {
    fn status(&self) -> Status {
        (**self).status()
    }

    fn is_flaky(&self) -> bool {
        (**self).is_flaky()
    }
}

/// Per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    pub total: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub failed: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub broken: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub passed: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unknown: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flaky: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: usize,
}

impl Statistic {
    /// Count for one status.
    #[must_use]
    pub const fn get(&self, status: Status) -> usize {
        match status {
            Status::Passed => self.passed,
            Status::Failed => self.failed,
            Status::Broken => self.broken,
            Status::Skipped => self.skipped,
            Status::Unknown => self.unknown,
        }
    }

    fn slot_mut(&mut self, status: Status) -> &mut usize {
        match status {
            Status::Passed => &mut self.passed,
            Status::Failed => &mut self.failed,
            Status::Broken => &mut self.broken,
            Status::Skipped => &mut self.skipped,
            Status::Unknown => &mut self.unknown,
        }
    }

    /// Worst status with a non-zero count.
    #[must_use]
    pub fn worst_status(&self) -> Option<Status> {
        Status::worst(Status::ALL.into_iter().filter(|s| self.get(*s) > 0))
    }

    /// Failed plus broken.
    #[must_use]
    pub const fn failures(&self) -> usize {
        self.failed + self.broken
    }
}

/// Add `count` occurrences of `item` to `statistic`.
pub fn increment_statistic<T: StatusItem + ?Sized>(
    statistic: &mut Statistic,
    item: &T,
    count: usize,
) {
    *statistic.slot_mut(item.status()) += count;
    statistic.total += count;
    if item.is_flaky() {
        statistic.flaky += count;
    }
}

/// Sum `other` into `statistic`.
pub fn merge_statistic(statistic: &mut Statistic, other: &Statistic) {
    statistic.total += other.total;
    statistic.failed += other.failed;
    statistic.broken += other.broken;
    statistic.passed += other.passed;
    statistic.skipped += other.skipped;
    statistic.unknown += other.unknown;
    statistic.flaky += other.flaky;
    statistic.retries += other.retries;
}

/// Histogram over `items`, optionally restricted by `filter`.
pub fn get_test_results_stats<'a, T, I, F>(items: I, filter: Option<F>) -> Statistic
where
    T: StatusItem + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> bool,
{
    let mut statistic = Statistic::default();
    for item in items {
        if filter.as_ref().is_none_or(|f| f(item)) {
            increment_statistic(&mut statistic, item, 1);
        }
    }
    statistic
}
