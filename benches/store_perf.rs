// Ingestion and tree-building benchmarks.
//
// Run with: cargo bench
//
// Performance Targets:
// | Operation            | Target    | Description                          |
// |----------------------|-----------|--------------------------------------|
// | Ingest (1k)          | < 10ms    | 1000 results, shuffled arrival       |
// | Ingest (10k)         | < 100ms   | 10000 results, 5 retries per test    |
// | Attachments (1k)     | < 10ms    | 1000 files after their declarations  |
// | Tree (10k)           | < 50ms    | Two-level label tree with statistics |
// | Sort + stamp (10k)   | < 20ms    | Sort leaves by name, stamp order     |

use allure_store::model::{
    BufferResultFile, RawLabel, RawStep, RawTestAttachment, RawTestResult, ReaderContext,
};
use allure_store::tree::{TestResultLeaf, create_test_results_tree, sort_tree, transform_tree};
use allure_store::util::{compare_by, ordinal};
use allure_store::{AllureStore, DefaultAllureStore, ResultFilter, ResultsVisitor};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::hint::black_box;
use std::sync::{Arc, Once};
use std::time::Instant;
use tracing::info;

const RETRIES_PER_TEST: usize = 5;

/// Raw result `i`; every `RETRIES_PER_TEST` consecutive results share a
/// history id.
fn create_raw_result(i: usize) -> RawTestResult {
    let start = i64::try_from(i).unwrap_or(i64::MAX) * 1_000;
    RawTestResult {
        uuid: Some(format!("bench-{i:06}")),
        name: Some(format!("Benchmark test {i}")),
        full_name: Some(format!("bench.suite_{}.test_{}", i % 20, i / RETRIES_PER_TEST)),
        history_id: Some(format!("history-{}", i / RETRIES_PER_TEST)),
        start: Some(start),
        stop: Some(start + 250),
        status: Some(
            match i % 7 {
                0 => "failed",
                1 => "broken",
                2 => "skipped",
                _ => "passed",
            }
            .to_string(),
        ),
        labels: vec![
            RawLabel::new("suite", format!("suite-{}", i % 20)),
            RawLabel::new("feature", format!("feature-{}", i % 7)),
            RawLabel::new("severity", "normal"),
        ],
        steps: vec![RawStep::Attachment(RawTestAttachment::new(format!(
            "attachment-{i}.txt"
        )))],
        ..RawTestResult::default()
    }
}

fn shuffled_results(count: usize) -> Vec<RawTestResult> {
    let mut results: Vec<RawTestResult> = (0..count).map(create_raw_result).collect();
    let mut rng = StdRng::seed_from_u64(42);
    results.shuffle(&mut rng);
    results
}

fn ingest(results: &[RawTestResult]) -> DefaultAllureStore {
    let mut store = DefaultAllureStore::default();
    let context = ReaderContext::new("bench");
    for raw in results {
        store
            .visit_test_result(raw, &context)
            .expect("benchmark input is valid");
    }
    store
}

fn init_bench_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = allure_store::logging::init_logging(0, false, None);
    });
}

fn log_bench_start(name: &str) -> Instant {
    info!("benchmark_start: {name}");
    Instant::now()
}

fn log_bench_end(name: &str, started_at: Instant) {
    info!("benchmark_end: {name} duration={:?}", started_at.elapsed());
}

fn bench_ingest(c: &mut Criterion) {
    init_bench_logging();
    let mut group = c.benchmark_group("ingest");

    for count in [1_000, 10_000] {
        let results = shuffled_results(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &results, |b, results| {
            let started = log_bench_start("ingest");
            b.iter(|| black_box(ingest(results)));
            log_bench_end("ingest", started);
        });
    }

    group.finish();
}

fn bench_attachment_files(c: &mut Criterion) {
    init_bench_logging();
    let results = shuffled_results(1_000);
    let files: Vec<Arc<BufferResultFile>> = (0..1_000)
        .map(|i| Arc::new(BufferResultFile::new(format!("attachment-{i}.txt"), vec![b'x'; 256])))
        .collect();
    let context = ReaderContext::new("bench");

    c.bench_function("attachment_files_1k", |b| {
        b.iter_with_setup(
            || ingest(&results),
            |mut store| {
                for file in &files {
                    store
                        .visit_attachment_file(file.clone(), &context)
                        .expect("in-memory attachment ingestion");
                }
                black_box(store)
            },
        );
    });
}

fn bench_tree(c: &mut Criterion) {
    init_bench_logging();
    let store = ingest(&shuffled_results(10_000));
    let visible = store.all_test_results(ResultFilter::default());

    c.bench_function("label_tree_10k", |b| {
        b.iter(|| black_box(create_test_results_tree(&visible, &["suite", "feature"])));
    });

    c.bench_function("sort_and_stamp_10k", |b| {
        b.iter_with_setup(
            || create_test_results_tree(&visible, &["suite", "feature"]),
            |mut tree| {
                sort_tree(
                    &mut tree,
                    compare_by(|leaf: &TestResultLeaf| leaf.name.clone(), ordinal::<String>()),
                );
                transform_tree(&mut tree, |mut leaf, index| {
                    leaf.group_order = Some(index + 1);
                    leaf
                });
                black_box(tree)
            },
        );
    });
}

criterion_group!(ingest_benches, bench_ingest, bench_attachment_files);
criterion_group!(tree_benches, bench_tree);
criterion_main!(ingest_benches, tree_benches);
