//! TreeSHAP throughput: path layouts, tree depth and threading.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use treeshap::testing::{random_dense_f32, random_forest};
use treeshap::{SamplesView, ShapAlgorithm, TreeExplainer, TreeShapConfig};

const N_FEATURES: usize = 20;
const N_TREES: usize = 50;

fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .sample_size(10)
}

fn config(algorithm: ShapAlgorithm, n_threads: usize) -> TreeShapConfig {
    TreeShapConfig::builder()
        .algorithm(algorithm)
        .n_threads(n_threads)
        .build()
        .expect("valid config")
}

fn bench_algorithms_by_depth(c: &mut Criterion) {
    let batch_size = 200usize;
    let data = random_dense_f32(batch_size, N_FEATURES, 42, -1.5, 1.5);
    let view = SamplesView::from_slice(&data, batch_size, N_FEATURES).expect("shape");

    let mut group = c.benchmark_group("tree_shap/depth");
    group.throughput(Throughput::Elements(batch_size as u64));

    for depth in [4usize, 8, 12] {
        let forest = random_forest(N_TREES, depth, N_FEATURES, 7);
        for (label, algorithm) in [
            ("full_path", ShapAlgorithm::FullPath),
            ("split_weights", ShapAlgorithm::SplitWeights),
        ] {
            let explainer = TreeExplainer::new(&forest, config(algorithm, 1)).expect("explainer");
            group.bench_with_input(BenchmarkId::new(label, depth), &view, |b, view| {
                b.iter(|| black_box(explainer.shap_values(black_box(*view)).expect("shap")))
            });
        }
    }

    group.finish();
}

fn bench_threads(c: &mut Criterion) {
    let batch_size = 2_000usize;
    let data = random_dense_f32(batch_size, N_FEATURES, 42, -1.5, 1.5);
    let view = SamplesView::from_slice(&data, batch_size, N_FEATURES).expect("shape");
    let forest = random_forest(N_TREES, 8, N_FEATURES, 7);

    let mut group = c.benchmark_group("tree_shap/threads");
    group.throughput(Throughput::Elements(batch_size as u64));

    for n_threads in [1usize, 2, 4, 8] {
        let explainer =
            TreeExplainer::new(&forest, config(ShapAlgorithm::SplitWeights, n_threads)).expect("explainer");
        group.bench_with_input(BenchmarkId::new("split_weights", n_threads), &view, |b, view| {
            b.iter(|| black_box(explainer.shap_values(black_box(*view)).expect("shap")))
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = default_criterion();
    targets = bench_algorithms_by_depth, bench_threads
}
criterion_main!(benches);
