//! Data preprocessing module
//!
//! Provides the steps between a loaded CSV and a scaled numeric matrix:
//! - Table loading and the typed conditioned representation
//! - Conditioning (coercion, percent parsing, dedup, label encoding)
//! - IQR outlier masking
//! - Feature/target projection and the seeded train/test split
//! - Standardization

mod config;
mod conditioner;
mod encoder;
pub mod dataset;
pub mod outlier;
pub mod scaler;
pub mod table;

pub use config::ConditioningConfig;
pub use conditioner::{coerce_column, parse_percent, DataConditioner};
pub use dataset::{Dataset, FeatureMatrix, SplitData};
pub use encoder::{CategoryEncoder, CategoryEncoding};
pub use outlier::{OutlierBounds, OutlierDetector, OutlierMask};
pub use scaler::{ScalerState, StandardScaler};
pub use table::{
    load_csv, CoercionOutcome, ColumnData, ConditionedColumn, ConditionedTable, RawTable,
};
