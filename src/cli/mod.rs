//! Tabular AutoML CLI Module
//!
//! Command-line interface for training, prediction, and data inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::export::FileModelRegistry;
use crate::inference::{FeatureValue, InferenceService};
use crate::pipeline::{PipelineConfig, Selection, Session, TrainingReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<12} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tabular-automl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, compare and serve regression models on tabular data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train every catalogue model and save the best one
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Predictor columns, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Held-out fraction (0.1 to 0.5)
        #[arg(long)]
        test_size: Option<f64>,

        /// Artifact file
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Predict one value with the saved model
    Predict {
        /// Artifact file
        #[arg(short, long, default_value = crate::export::DEFAULT_ARTIFACT_PATH)]
        artifact: PathBuf,

        /// Feature value as name=value (numbers or category labels)
        #[arg(short = 'v', long = "value", value_parser = parse_key_val, required = true)]
        values: Vec<(String, FeatureValue)>,
    },

    /// Show how a dataset is conditioned
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, FeatureValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing feature name in '{}'", s));
    }
    let value = value.parse::<FeatureValue>().map_err(|e| e.to_string())?;
    Ok((key.to_string(), value))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    target: &str,
    features: &[String],
    test_size: Option<f64>,
    artifact: Option<&Path>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = load_config(config_path)?;
    if let Some(path) = artifact {
        config = config.with_artifact_path(path);
    }
    let mut session = Session::from_config(config)?;

    step_run("Loading data");
    let start = Instant::now();
    let table = session.load_csv(data_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        table.n_rows(),
        table.n_columns(),
        start.elapsed()
    ));

    let mut selection = Selection::new(target, features.iter().cloned());
    if let Some(ts) = test_size {
        selection = selection.with_test_size(ts);
    }

    step_run(&format!("Training {} models", session.config().training.models.len()));
    let start = Instant::now();
    let report = session.train(&selection)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&report);

    step_run(&format!("Saving → {}", session.registry().location()));
    let metadata = session.persist_best(&selection)?;
    step_done(&format!("{} rows", metadata.n_train_rows));

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        metadata.model_name.white().bold(),
        muted("MSE:"),
        report.best_record().map(|r| r.mse).unwrap_or(f64::NAN)
    );
    println!();
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!();
    kv("Target", &report.target);
    kv("Features", &report.features.join(", "));
    kv("Split", &format!("{} train / {} test", report.n_train, report.n_test));
    println!();
    println!(
        "  {:<26} {:>12} {:>8} {:>10} {:>9}",
        muted("Model"),
        muted("MSE"),
        muted("R²"),
        muted("MAE"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(68)));

    for (kind, record) in &report.performance {
        let secs = report.fit_secs.get(kind).copied().unwrap_or(0.0);
        let line = format!(
            "{:<26} {:>12.4} {:>8.4} {:>10.4} {:>8.3}s",
            kind.display_name(),
            record.mse,
            record.r2,
            record.mae,
            secs
        );
        if *kind == report.best {
            println!("  {}", line.white().bold());
        } else {
            println!("  {}", line);
        }
    }
    for failure in &report.failures {
        println!(
            "  {:<26} {}",
            failure.kind.display_name(),
            format!("err: {}", failure.reason).red()
        );
    }
    println!("  {}", dim(&"─".repeat(68)));
    println!();
}

pub fn cmd_predict(artifact: &Path, values: &[(String, FeatureValue)]) -> anyhow::Result<()> {
    section("Predict");

    let service = InferenceService::new(Arc::new(FileModelRegistry::new(artifact)));
    let inputs: HashMap<String, FeatureValue> = values.iter().cloned().collect();

    let prediction = match service.predict_detailed(&inputs) {
        Ok(p) => p,
        Err(e) if e.is_not_ready() => {
            println!("  {}", format!("No trained model at {}", artifact.display()).yellow());
            println!("  {}", dim("run `tabular-automl train` first"));
            println!();
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = &prediction.metadata;
    kv("Model", &metadata.model_name);
    for (name, value) in values {
        kv(name, &value.to_string());
    }
    println!();
    println!(
        "  {:<12} {}",
        muted(&metadata.target_name),
        format!("{:.4}", prediction.value).white().bold()
    );
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Data Info");

    let mut session = Session::from_config(load_config(config_path)?)?;
    session.load_csv(data_path)?;
    let (Some(table), Some(mask)) = (session.table(), session.outlier_mask()) else {
        anyhow::bail!("no table loaded");
    };

    kv("File", &data_path.display().to_string());
    kv("Rows", &table.n_rows().to_string());
    kv("Columns", &table.n_columns().to_string());
    println!();

    println!(
        "  {:<20} {:<12} {:<10} {:>8} {:>9}",
        muted("Column"),
        muted("Type"),
        muted("Outcome"),
        muted("Missing"),
        muted("Outliers")
    );
    println!("  {}", dim(&"─".repeat(63)));

    for column in table.columns() {
        let outliers = match mask.column(&column.name) {
            Some(_) => mask.outlier_count(&column.name).to_string(),
            None => "-".to_string(),
        };
        println!(
            "  {:<20} {:<12} {:<10} {:>8} {:>9}",
            column.name,
            column.data.kind_name(),
            format!("{:?}", column.outcome).to_lowercase().truecolor(140, 140, 140),
            column.data.null_count(),
            outliers
        );
    }

    let encoding = table.encoding();
    if !encoding.is_empty() {
        println!();
        for name in encoding.column_names() {
            let labels = encoding.labels(name).unwrap_or_default();
            kv(name, &format!("{} categories", labels.len()));
        }
    }

    println!();
    Ok(())
}
