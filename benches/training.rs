use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tabular_automl::export::{InMemoryModelRegistry, ModelRegistry};
use tabular_automl::inference::InferenceService;
use tabular_automl::pipeline::{PipelineConfig, Selection, Session};
use tabular_automl::training::{ModelKind, TrainEngine, TrainingConfig};
use polars::prelude::*;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 2.0 - 1.0);
    // Create target as sum of features + noise
    let y = x.sum_axis(ndarray::Axis(1)) + Array1::from_shape_fn(n_rows, |_| rng.gen::<f64>() * 0.1);
    (x, y)
}

fn create_furniture_frame(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let rate: Vec<i64> = (0..n_rows).map(|_| if rng.gen_bool(0.9) { 0 } else { rng.gen_range(1..=5) }).collect();
    let sale_pct: Vec<u32> = (0..n_rows).map(|_| rng.gen_range(0..60)).collect();
    let delivery: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(20.0..60.0)).collect();
    let price: Vec<f64> = (0..n_rows)
        .map(|i| 150.0 + 4.0 * delivery[i] - 1.5 * sale_pct[i] as f64 + rng.gen::<f64>() * 10.0)
        .collect();
    let sale: Vec<String> = sale_pct.iter().map(|s| format!("{}%", s)).collect();

    df!(
        "rate" => rate,
        "sale" => sale,
        "delivery" => delivery,
        "price" => price,
    )
    .unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [200, 1000, 2000].iter() {
        let (x, y) = create_regression_data(*n_rows, 3);

        for kind in ModelKind::ALL {
            let engine = TrainEngine::new(TrainingConfig::new().with_n_estimators(20));
            group.bench_with_input(
                BenchmarkId::new(kind.to_string(), n_rows),
                &(&x, &y),
                |b, (x, y)| b.iter(|| engine.fit_one(kind, black_box(x), black_box(y)).unwrap()),
            );
        }
    }

    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");
    group.sample_size(10);

    let raw = create_furniture_frame(500);
    let selection = Selection::new("price", ["rate", "sale", "delivery"]);

    group.bench_function("condition_train_persist", |b| {
        b.iter(|| {
            let registry = Arc::new(InMemoryModelRegistry::new());
            let config = PipelineConfig::new()
                .with_training(TrainingConfig::new().with_n_estimators(20));
            let mut session = Session::new(config, registry).unwrap();
            session.load_table(black_box(&raw)).unwrap();
            session.persist_best(&selection).unwrap()
        })
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train and persist once
    let registry: Arc<dyn ModelRegistry> = Arc::new(InMemoryModelRegistry::new());
    let mut session = Session::new(PipelineConfig::default(), Arc::clone(&registry)).unwrap();
    session.load_table(&create_furniture_frame(500)).unwrap();
    session
        .persist_best(&Selection::new("price", ["rate", "sale", "delivery"]))
        .unwrap();
    let service = InferenceService::new(registry);

    let mut row = HashMap::new();
    row.insert("rate".to_string(), 0.0);
    row.insert("sale".to_string(), 20.0);
    row.insert("delivery".to_string(), 52.0);

    group.bench_function("predict_one", |b| {
        b.iter(|| service.predict(black_box(&row)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_training, bench_session, bench_prediction);
criterion_main!(benches);
