//! # homeval Core
//!
//! Core library for the homeval house-price front end.
//! Provides the prediction session orchestrator, the persisted prediction
//! history, history analytics (price trend, feature correlation, location
//! averages), JSON/CSV export, prediction backends, and configuration.
//!
//! Rendering, storage, and the prediction service are collaborators behind
//! the [`ChartSink`], [`KeyValueStore`], and [`PricePredictor`] traits, so the
//! whole flow runs headless.

pub mod analytics;
pub mod chart;
pub mod config;
pub mod correlation;
pub mod error;
pub mod export;
pub mod history;
pub mod orchestrator;
pub mod predictor;
pub mod storage;
pub mod types;

// Re-export commonly used types at the crate root.
pub use analytics::{Analytics, FeatureCorrelations, LocationAverages, PriceTrend};
pub use chart::{ChartSink, RecordingSink};
pub use config::{HomevalConfig, PredictorBackend, config_exists, load_config};
pub use correlation::pearson;
pub use error::{HomevalError, Result};
pub use export::{ExportFile, ExportFormat};
pub use history::{HistoryStore, LoadWarning, SnapshotStatus};
pub use orchestrator::{AutoConfirm, Confirmation, Outcome, PredictionState, Session};
pub use predictor::{HttpPredictor, MockPredictor, PricePredictor, SimulatedPredictor, build_predictor};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{
    Feature, FeatureImportance, Location, PredictionForm, PredictionRecord, PredictionRequest,
    PredictionResult,
};
