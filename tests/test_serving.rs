//! Integration test: Artifact registry and inference service

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use ndarray::array;
use tabular_automl::error::AutomlError;
use tabular_automl::export::{
    ArtifactMetadata, FileModelRegistry, ModelArtifact, ModelRegistry,
};
use tabular_automl::inference::{FeatureValue, InferenceService};
use tabular_automl::preprocessing::{CategoryEncoding, FeatureMatrix, StandardScaler};
use tabular_automl::training::{
    KNNRegressor, LinearRegression, ModelKind, TargetTransform, TrainedModel,
};
use tempfile::tempdir;

fn features() -> FeatureMatrix {
    FeatureMatrix::new(
        vec!["sale".to_string(), "delivery".to_string()],
        array![
            [10.0, 30.0],
            [20.0, 45.0],
            [0.0, 52.0],
            [35.0, 20.0],
            [15.0, 60.0],
            [25.0, 38.0]
        ],
    )
    .unwrap()
}

fn target(x: &FeatureMatrix) -> ndarray::Array1<f64> {
    x.data.column(1).mapv(|d| 4.0 * d) - x.data.column(0).mapv(|s| 1.5 * s) + 150.0
}

fn linear_artifact() -> ModelArtifact {
    let x = features();
    let scaler = StandardScaler::fit(&x).unwrap();
    let mut model = LinearRegression::new();
    model.fit(&scaler.transform(&x).unwrap(), &target(&x)).unwrap();
    ModelArtifact::new(
        ArtifactMetadata::new(ModelKind::LinearRegression, "price")
            .with_features(x.names.clone())
            .with_train_rows(x.n_rows()),
        TrainedModel::LinearRegression(model),
        scaler,
        CategoryEncoding::default(),
        TargetTransform::Identity,
    )
    .unwrap()
}

fn knn_artifact() -> ModelArtifact {
    let x = features();
    let scaler = StandardScaler::fit(&x).unwrap();
    let mut model = KNNRegressor::with_k(3);
    model.fit(&scaler.transform(&x).unwrap(), &target(&x)).unwrap();
    ModelArtifact::new(
        ArtifactMetadata::new(ModelKind::KNN, "price").with_features(x.names.clone()),
        TrainedModel::KNN(model),
        scaler,
        CategoryEncoding::default(),
        TargetTransform::Identity,
    )
    .unwrap()
}

fn inputs(sale: f64, delivery: f64) -> HashMap<String, f64> {
    let mut m = HashMap::new();
    m.insert("sale".to_string(), sale);
    m.insert("delivery".to_string(), delivery);
    m
}

#[test]
fn test_service_follows_latest_save() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(FileModelRegistry::new(dir.path().join("best_model.bin")));
    let service = InferenceService::new(registry.clone());

    assert!(service.predict(&inputs(20.0, 52.0)).unwrap_err().is_not_ready());

    registry.save(&linear_artifact()).unwrap();
    let linear = service.predict(&inputs(20.0, 52.0)).unwrap();
    assert!((linear - (4.0 * 52.0 - 1.5 * 20.0 + 150.0)).abs() < 1e-9);

    // last writer wins, no restart needed
    registry.save(&knn_artifact()).unwrap();
    assert_eq!(service.artifact().unwrap().metadata.model_kind, ModelKind::KNN);
    let knn = service.predict(&inputs(20.0, 52.0)).unwrap();
    assert!(knn.is_finite());

    let stats = service.stats();
    assert_eq!(stats.total_predictions, 3);
    assert_eq!(stats.error_count, 1);
}

#[test]
fn test_readers_never_see_a_partial_write() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(FileModelRegistry::new(dir.path().join("best_model.bin")));
    registry.save(&linear_artifact()).unwrap();

    let writer_registry = Arc::clone(&registry);
    thread::scope(|s| {
        s.spawn(move || {
            let artifacts = [knn_artifact(), linear_artifact()];
            for i in 0..40 {
                writer_registry.save(&artifacts[i % 2]).unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..40 {
                let artifact = registry.load().expect("every read sees a whole artifact");
                assert_eq!(artifact.feature_names(), &["sale", "delivery"]);
            }
        });
    });
}

#[test]
fn test_batch_matches_single_predictions() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(FileModelRegistry::new(dir.path().join("model.bin")));
    registry.save(&linear_artifact()).unwrap();
    let service = InferenceService::new(registry);

    let rows: Vec<HashMap<String, FeatureValue>> = [(0.0, 20.0), (30.0, 55.0)]
        .iter()
        .map(|&(s, d)| {
            inputs(s, d)
                .into_iter()
                .map(|(k, v)| (k, FeatureValue::Number(v)))
                .collect()
        })
        .collect();

    let batch = service.predict_batch(&rows).unwrap();
    let single: Vec<f64> = rows
        .iter()
        .map(|r| service.predict_values(r).unwrap())
        .collect();
    assert_eq!(batch.len(), single.len());
    for (b, s) in batch.iter().zip(&single) {
        assert!((b - s).abs() < 1e-9);
    }
}

#[test]
fn test_label_for_numeric_feature_rejected() {
    let registry = Arc::new(tabular_automl::export::InMemoryModelRegistry::new());
    registry.save(&linear_artifact()).unwrap();
    let service = InferenceService::new(registry);

    let mut row = HashMap::new();
    row.insert("sale".to_string(), FeatureValue::Category("lots".to_string()));
    row.insert("delivery".to_string(), FeatureValue::Number(30.0));
    assert!(service.predict_values(&row).is_err());
}

#[test]
fn test_non_finite_inputs_are_rejected() {
    let registry = Arc::new(tabular_automl::export::InMemoryModelRegistry::new());
    registry.save(&linear_artifact()).unwrap();
    let service = InferenceService::new(registry);

    // nan and inf typed on the command line are labels, and sale is numeric
    let parsed: FeatureValue = "nan".parse().unwrap();
    assert_eq!(parsed, FeatureValue::Category("nan".to_string()));
    let mut row = HashMap::new();
    row.insert("sale".to_string(), parsed);
    row.insert("delivery".to_string(), FeatureValue::Number(30.0));
    assert!(matches!(
        service.predict_values(&row),
        Err(AutomlError::InvalidParameter { .. })
    ));

    let mut row = HashMap::new();
    row.insert("sale".to_string(), FeatureValue::Number(f64::NAN));
    row.insert("delivery".to_string(), FeatureValue::Number(f64::INFINITY));
    assert!(matches!(
        service.predict_values(&row),
        Err(AutomlError::InvalidParameter { .. })
    ));
    assert!(matches!(
        service.predict(&inputs(f64::NAN, 30.0)),
        Err(AutomlError::InvalidParameter { .. })
    ));
    assert!(service.predict_batch(&[row]).is_err());

    let stats = service.stats();
    assert_eq!(stats.total_predictions, 4);
    assert_eq!(stats.error_count, 4);
}
