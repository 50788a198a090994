//! Session orchestration
//!
//! A [`Session`] owns the loaded table, its outlier mask and the memo of the
//! last training run. The artifact registry is the only state it shares with
//! other sessions.

use super::config::PipelineConfig;
use crate::cache::{CacheStats, RunKey, SessionCache};
use crate::error::{AutomlError, Result};
use crate::export::{ArtifactMetadata, FileModelRegistry, ModelArtifact, ModelRegistry};
use crate::inference::{FeatureValue, InferenceService};
use crate::preprocessing::{
    load_csv, CategoryEncoding, ConditionedTable, DataConditioner, Dataset, OutlierDetector,
    OutlierMask, RawTable, ScalerState, StandardScaler,
};
use crate::training::{
    validate_test_size, CancelToken, ModelEvaluator, ModelFailure, ModelKind, Performance,
    PerformanceRecord, TrainEngine,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Target and predictors chosen for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub target: String,
    pub predictors: Vec<String>,
    /// Held-out fraction; `None` uses the configured one
    pub test_size: Option<f64>,
}

impl Selection {
    pub fn new<I, S>(target: impl Into<String>, predictors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            predictors: predictors.into_iter().map(Into::into).collect(),
            test_size: None,
        }
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = Some(test_size);
        self
    }

    /// Check the selection against `table`
    pub fn validate(&self, table: &ConditionedTable, test_size: f64) -> Result<()> {
        if table.column(&self.target).is_none() {
            return Err(AutomlError::FeatureNotFound(self.target.clone()));
        }
        if self.predictors.is_empty() {
            return Err(AutomlError::InvalidParameter {
                name: "predictors".to_string(),
                value: "[]".to_string(),
                reason: "select at least one predictor".to_string(),
            });
        }
        if self.predictors.contains(&self.target) {
            return Err(AutomlError::InvalidParameter {
                name: "predictors".to_string(),
                value: self.target.clone(),
                reason: "the target cannot also be a predictor".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for p in &self.predictors {
            if !seen.insert(p.as_str()) {
                return Err(AutomlError::InvalidParameter {
                    name: "predictors".to_string(),
                    value: p.clone(),
                    reason: "listed more than once".to_string(),
                });
            }
            if table.column(p).is_none() {
                return Err(AutomlError::FeatureNotFound(p.clone()));
            }
        }
        validate_test_size(test_size)
    }
}

/// What a training run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub target: String,
    pub features: Vec<String>,
    pub test_size: f64,
    pub n_train: usize,
    pub n_test: usize,
    /// Test-split metrics per trained model, in catalogue order
    pub performance: Performance,
    pub best: ModelKind,
    pub failures: Vec<ModelFailure>,
    pub fit_secs: BTreeMap<ModelKind, f64>,
    /// Served from the session memo
    pub from_cache: bool,
}

impl TrainingReport {
    pub fn best_record(&self) -> Option<&PerformanceRecord> {
        self.performance.get(&self.best)
    }
}

/// Cached state of one run, enough to persist its winner
#[derive(Debug, Clone)]
struct TrainingRun {
    report: TrainingReport,
    dataset: Dataset,
    scaler: ScalerState,
    encoding: CategoryEncoding,
}

#[derive(Debug)]
struct LoadedTable {
    table: ConditionedTable,
    mask: OutlierMask,
    fingerprint: u64,
}

/// One analyst session
pub struct Session {
    config: PipelineConfig,
    registry: Arc<dyn ModelRegistry>,
    inference: InferenceService,
    conditioner: DataConditioner,
    loaded: Option<LoadedTable>,
    cache: SessionCache<TrainingRun>,
    cancel: Option<CancelToken>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry.location())
            .field("rows", &self.loaded.as_ref().map(|l| l.table.n_rows()))
            .field("cache", &self.cache.stats())
            .finish()
    }
}

impl Session {
    pub fn new(config: PipelineConfig, registry: Arc<dyn ModelRegistry>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            conditioner: DataConditioner::new(config.conditioning.clone()),
            inference: InferenceService::new(Arc::clone(&registry)),
            registry,
            config,
            loaded: None,
            cache: SessionCache::new(),
            cancel: None,
        })
    }

    /// Session over the file registry named in `config`
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let registry = Arc::new(FileModelRegistry::new(&config.registry.artifact_path));
        Self::new(config, registry)
    }

    /// Observe `token` between models of every training run
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn ModelRegistry> {
        &self.registry
    }

    pub fn inference(&self) -> &InferenceService {
        &self.inference
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Condition `raw`, fit the outlier mask and make it the session's table
    pub fn load_table(&mut self, raw: &RawTable) -> Result<&ConditionedTable> {
        let table = self.conditioner.condition(raw)?;
        let c = &self.config.conditioning;
        let mask = OutlierDetector::iqr(c.iqr_factor)
            .with_exempt_column(c.rating_column.clone())
            .fit(&table);
        let fingerprint = table.fingerprint();
        info!(
            rows = table.n_rows(),
            columns = table.n_columns(),
            fingerprint,
            "table loaded"
        );

        self.cache.invalidate();
        let loaded = self.loaded.insert(LoadedTable {
            table,
            mask,
            fingerprint,
        });
        Ok(&loaded.table)
    }

    pub fn load_csv(&mut self, path: impl AsRef<Path>) -> Result<&ConditionedTable> {
        let raw = load_csv(path)?;
        self.load_table(&raw)
    }

    pub fn table(&self) -> Option<&ConditionedTable> {
        self.loaded.as_ref().map(|l| &l.table)
    }

    pub fn outlier_mask(&self) -> Option<&OutlierMask> {
        self.loaded.as_ref().map(|l| &l.mask)
    }

    /// Train and score the catalogue on `selection`.
    ///
    /// Repeating a selection on the same table returns the memoized report.
    pub fn train(&mut self, selection: &Selection) -> Result<TrainingReport> {
        let (key, hit) = self.ensure_run(selection)?;
        let run = self.cache.peek(&key).ok_or(AutomlError::NoTrainedModels)?;
        let mut report = run.report.clone();
        report.from_cache = hit;
        Ok(report)
    }

    /// Retrain the winner of `selection` on all projected rows and save it.
    ///
    /// The scaler fitted on the training split is reused, so the stored
    /// scaler is the one the reported metrics were computed with.
    pub fn persist_best(&mut self, selection: &Selection) -> Result<ArtifactMetadata> {
        let (key, _) = self.ensure_run(selection)?;
        let run = self.cache.peek(&key).ok_or(AutomlError::NoTrainedModels)?;
        let training = &self.config.training;
        let best = run.report.best;

        let x_full = run.scaler.transform(&run.dataset.features)?;
        let y_full = training.target_transform.forward(&run.dataset.target)?;
        let model = TrainEngine::new(training.clone()).fit_one(best, &x_full, &y_full)?;

        let mut metadata = ArtifactMetadata::new(best, run.report.target.clone())
            .with_features(run.scaler.feature_names().to_vec())
            .with_train_rows(run.dataset.n_rows());
        metadata.performance = run.report.best_record().copied();

        let artifact = ModelArtifact::new(
            metadata.clone(),
            model,
            run.scaler.clone(),
            run.encoding.clone(),
            training.target_transform,
        )?;
        self.registry.save(&artifact)?;
        info!(model = %best, rows = metadata.n_train_rows, location = %self.registry.location(), "best model persisted");
        Ok(metadata)
    }

    /// Predict with the persisted artifact
    pub fn predict(&self, features: &HashMap<String, FeatureValue>) -> Result<f64> {
        self.inference.predict_values(features)
    }

    pub fn predict_numeric(&self, features: &HashMap<String, f64>) -> Result<f64> {
        self.inference.predict(features)
    }

    /// Make sure the cache holds the run for `selection`; returns its key and
    /// whether it was already there
    fn ensure_run(&mut self, selection: &Selection) -> Result<(RunKey, bool)> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| AutomlError::DataError("no table loaded".to_string()))?;
        let test_size = selection.test_size.unwrap_or(self.config.training.test_size);
        selection.validate(&loaded.table, test_size)?;

        let key = RunKey::new(
            &selection.predictors,
            &selection.target,
            test_size,
            loaded.fingerprint,
        );
        if self.cache.get(&key).is_some() {
            debug!(target = %selection.target, "training run served from cache");
            return Ok((key, true));
        }

        let run = run_training(&self.config, self.cancel.as_ref(), loaded, selection, test_size)?;
        self.cache.insert(key.clone(), run);
        Ok((key, false))
    }
}

fn run_training(
    config: &PipelineConfig,
    cancel: Option<&CancelToken>,
    loaded: &LoadedTable,
    selection: &Selection,
    test_size: f64,
) -> Result<TrainingRun> {
    let started = Instant::now();
    let training = &config.training;

    let dataset = Dataset::project(
        &loaded.table,
        &loaded.mask,
        &selection.predictors,
        &selection.target,
        config.conditioning.fill_value,
    )?;
    let split = dataset.train_test_split(test_size, training.random_state)?;

    let scaler = StandardScaler::fit(&split.x_train)?;
    let x_train = scaler.transform(&split.x_train)?;
    let x_test = scaler.transform(&split.x_test)?;
    let y_train = training.target_transform.forward(&split.y_train)?;

    let mut engine = TrainEngine::new(training.clone());
    if let Some(token) = cancel {
        engine = engine.with_cancel_token(token.clone());
    }
    let outcome = engine.train_all(&x_train, &y_train)?;
    if outcome.is_empty() {
        warn!(failures = outcome.failures.len(), "every model failed to train");
        return Err(AutomlError::NoTrainedModels);
    }

    let evaluation = ModelEvaluator::new(training.target_transform).evaluate(
        &outcome,
        &x_test,
        &split.y_test,
    )?;
    let performance = evaluation.performance;
    let best = ModelEvaluator::select_best(&performance)?;
    info!(
        best = %best,
        mse = performance.get(&best).map(|r| r.mse),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "training run complete"
    );

    let report = TrainingReport {
        target: selection.target.clone(),
        features: selection.predictors.clone(),
        test_size,
        n_train: split.x_train.n_rows(),
        n_test: split.x_test.n_rows(),
        fit_secs: outcome
            .models
            .iter()
            .filter(|(kind, _)| performance.contains_key(*kind))
            .map(|(&kind, c)| (kind, c.fit_secs))
            .collect(),
        performance,
        best,
        failures: outcome.failures.into_iter().chain(evaluation.failures).collect(),
        from_cache: false,
    };

    Ok(TrainingRun {
        report,
        encoding: loaded.table.encoding().restrict(&selection.predictors),
        dataset,
        scaler,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::InMemoryModelRegistry;
    use crate::training::TrainingConfig;
    use polars::prelude::*;

    fn raw() -> RawTable {
        let n = 40;
        let rate: Vec<i64> = (0..n).map(|i| (i % 5) as i64).collect();
        let sale: Vec<String> = (0..n).map(|i| format!("{}%", (i * 7) % 50)).collect();
        let delivery: Vec<f64> = (0..n).map(|i| 20.0 + (i % 9) as f64 * 5.0).collect();
        let kind: Vec<&str> = (0..n).map(|i| ["chair", "sofa", "table"][i % 3]).collect();
        let price: Vec<f64> = (0..n)
            .map(|i| 100.0 + 3.0 * delivery[i] - 2.0 * ((i * 7) % 50) as f64 + 10.0 * (i % 3) as f64)
            .collect();
        df!(
            "rate" => rate,
            "sale" => sale,
            "delivery" => delivery,
            "type" => kind,
            "price" => price,
        )
        .unwrap()
    }

    fn session() -> Session {
        let config = PipelineConfig::new()
            .with_training(TrainingConfig::new().with_n_estimators(10));
        let mut s = Session::new(config, Arc::new(InMemoryModelRegistry::new())).unwrap();
        s.load_table(&raw()).unwrap();
        s
    }

    #[test]
    fn test_selection_validation() {
        let s = session();
        let table = s.table().unwrap();
        assert!(matches!(
            Selection::new("missing", ["rate"]).validate(table, 0.2),
            Err(AutomlError::FeatureNotFound(_))
        ));
        assert!(Selection::new("price", Vec::<String>::new()).validate(table, 0.2).is_err());
        assert!(Selection::new("price", ["price", "rate"]).validate(table, 0.2).is_err());
        assert!(Selection::new("price", ["rate", "rate"]).validate(table, 0.2).is_err());
        assert!(Selection::new("price", ["rate"]).validate(table, 0.05).is_err());
        assert!(Selection::new("price", ["rate"]).validate(table, 0.5).is_ok());
    }

    #[test]
    fn test_train_reports_every_model() {
        let mut s = session();
        let report = s.train(&Selection::new("price", ["rate", "sale", "delivery"])).unwrap();
        assert_eq!(report.performance.len(), 5);
        assert_eq!(report.n_test, (0.2 * (report.n_train + report.n_test) as f64).ceil() as usize);
        let min = report
            .performance
            .values()
            .map(|r| r.mse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(report.best_record().unwrap().mse, min);
        assert!(!report.from_cache);
    }

    #[test]
    fn test_repeat_selection_hits_cache() {
        let mut s = session();
        let first = s.train(&Selection::new("price", ["sale", "delivery"])).unwrap();
        let second = s.train(&Selection::new("price", ["delivery", "sale"])).unwrap();
        assert!(second.from_cache);
        assert_eq!(first.performance, second.performance);

        s.train(&Selection::new("price", ["sale", "delivery"]).with_test_size(0.3))
            .unwrap();
        assert_eq!(s.cache_stats().hits, 1);

        s.load_table(&raw()).unwrap();
        let after_reload = s.train(&Selection::new("price", ["sale", "delivery"])).unwrap();
        assert!(!after_reload.from_cache);
    }

    #[test]
    fn test_train_without_table() {
        let mut s = Session::new(PipelineConfig::default(), Arc::new(InMemoryModelRegistry::new()))
            .unwrap();
        assert!(s.train(&Selection::new("price", ["rate"])).is_err());
    }

    #[test]
    fn test_persist_and_predict_with_category() {
        let mut s = session();
        let selection = Selection::new("price", ["delivery", "type"]);
        let metadata = s.persist_best(&selection).unwrap();
        assert_eq!(metadata.feature_names, vec!["delivery".to_string(), "type".to_string()]);
        assert!(metadata.performance.is_some());

        let mut input = HashMap::new();
        input.insert("delivery".to_string(), FeatureValue::Number(40.0));
        input.insert("type".to_string(), FeatureValue::Category("sofa".to_string()));
        assert!(s.predict(&input).unwrap().is_finite());

        let artifact = s.inference().artifact().unwrap();
        assert_eq!(artifact.encoding.labels("type").unwrap().len(), 3);
        assert!(!artifact.encoding.contains("sale"));
    }

    #[test]
    fn test_cancelled_session() {
        let token = CancelToken::new();
        token.cancel();
        let mut s = session().with_cancel_token(token);
        assert!(matches!(
            s.train(&Selection::new("price", ["rate"])),
            Err(AutomlError::Cancelled)
        ));
    }
}
