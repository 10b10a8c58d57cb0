//! Property-based tests for store and tree invariants.
//!
//! Uses proptest to verify that:
//! - Exactly one result per history id stays visible after retries
//! - History points always come back newest first
//! - Every tree child id resolves and has exactly one parent

use proptest::prelude::*;
use std::collections::HashMap;
use tracing::info;

use allure_store::model::{
    HistoryDataPoint, RawLabel, RawTestResult, ReaderContext,
};
use allure_store::tree::create_test_results_tree;
use allure_store::{AllureStore, DefaultAllureStore, ResultFilter, ResultsVisitor, StoreConfig};

/// Initialize test logging for proptest (called once per test)
fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

fn retry(index: usize, start: Option<i64>) -> RawTestResult {
    RawTestResult {
        uuid: Some(format!("attempt-{index}")),
        name: Some("flaky login".to_string()),
        history_id: Some("H".to_string()),
        start,
        status: Some("passed".to_string()),
        ..RawTestResult::default()
    }
}

/// Index of the attempt that should stay visible.
fn expected_winner(starts: &[Option<i64>]) -> usize {
    let mut winner = 0;
    for (index, start) in starts.iter().enumerate().skip(1) {
        let new_wins = match (start, starts[winner]) {
            (Some(new), Some(current)) => *new >= current,
            _ => true,
        };
        if new_wins {
            winner = index;
        }
    }
    winner
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        ..Default::default()
    })]

    /// Property: one visible attempt per history id, chosen by the tie-break
    #[test]
    fn retries_leave_one_visible(starts in prop::collection::vec(prop::option::of(0_i64..10_000), 1..10)) {
        init_test_logging();
        info!("proptest_retries: attempts={}", starts.len());

        let mut store = DefaultAllureStore::default();
        let context = ReaderContext::new("proptest");
        for (index, start) in starts.iter().enumerate() {
            store.visit_test_result(&retry(index, *start), &context).unwrap();
        }

        let visible = store.all_test_results(ResultFilter::default());
        prop_assert_eq!(visible.len(), 1);
        let winner = expected_winner(&starts);
        let winner_id = format!("attempt-{winner}");
        prop_assert_eq!(&visible[0].id, &winner_id);
        prop_assert_eq!(store.retries_by_tr_id(&winner_id).len(), starts.len() - 1);

        if starts.iter().all(Option::is_some) {
            let max = starts.iter().flatten().max().copied();
            prop_assert_eq!(visible[0].start, max);
        }
    }

    /// Property: history points are sorted by timestamp, newest first
    #[test]
    fn history_sorted_descending(timestamps in prop::collection::vec(0_i64..1_000_000, 0..30)) {
        init_test_logging();
        let history: Vec<HistoryDataPoint> = timestamps
            .iter()
            .enumerate()
            .map(|(index, timestamp)| HistoryDataPoint {
                uuid: format!("run-{index}"),
                name: String::new(),
                timestamp: *timestamp,
                known_test_case_ids: Vec::new(),
                test_results: std::collections::BTreeMap::new(),
                metrics: std::collections::BTreeMap::new(),
                url: None,
            })
            .collect();

        let store = DefaultAllureStore::new(StoreConfig::default().with_history(history));
        let points = store.all_history_data_points();
        prop_assert_eq!(points.len(), timestamps.len());
        prop_assert!(points.windows(2).all(|pair| pair[0].timestamp >= pair[1].timestamp));
    }

    /// Property: every child id resolves and has exactly one parent
    #[test]
    fn tree_children_have_one_parent(
        items in prop::collection::vec(
            (prop::collection::vec(0_usize..3, 0..3), prop::collection::vec(0_usize..3, 0..3)),
            1..20,
        )
    ) {
        init_test_logging();
        let mut store = DefaultAllureStore::default();
        let context = ReaderContext::new("proptest");
        for (index, (suites, features)) in items.iter().enumerate() {
            let mut labels: Vec<RawLabel> = suites
                .iter()
                .map(|s| RawLabel::new("suite", format!("suite-{s}")))
                .collect();
            labels.extend(features.iter().map(|f| RawLabel::new("feature", format!("feature-{f}"))));
            let raw = RawTestResult {
                uuid: Some(format!("tr-{index}")),
                name: Some(format!("test {index}")),
                labels,
                ..RawTestResult::default()
            };
            store.visit_test_result(&raw, &context).unwrap();
        }

        let results = store.all_test_results(ResultFilter::default());
        let tree = create_test_results_tree(&results, &["suite", "feature"]);

        let mut parents: HashMap<&str, usize> = HashMap::new();
        let child_lists = std::iter::once((&tree.root.groups, &tree.root.leaves)).chain(
            tree.groups_by_id.values().map(|group| (&group.groups, &group.leaves)),
        );
        for (groups, leaves) in child_lists {
            for id in groups {
                prop_assert!(tree.groups_by_id.contains_key(id));
                *parents.entry(id.as_str()).or_default() += 1;
            }
            for id in leaves {
                prop_assert!(tree.leaves_by_id.contains_key(id));
                *parents.entry(id.as_str()).or_default() += 1;
            }
        }
        prop_assert!(parents.values().all(|count| *count == 1));
        prop_assert_eq!(parents.len(), tree.groups_by_id.len() + tree.leaves_by_id.len());

        let root_total: usize = tree
            .root
            .groups
            .iter()
            .filter_map(|id| tree.groups_by_id.get(id))
            .map(|group| group.data.total)
            .sum::<usize>()
            + tree.root.leaves.len();
        prop_assert!(root_total >= results.len());
    }
}
