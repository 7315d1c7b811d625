//! Integration tests for the prediction session.
//!
//! These exercise the full submit → history → analytics → export loop against
//! a file-backed store in a temporary workspace.

use std::sync::Arc;

use homeval_core::chart::ids;
use homeval_core::config::HomevalConfig;
use homeval_core::error::ExportError;
use homeval_core::{
    AutoConfirm, ExportFormat, Feature, FileStore, HistoryStore, KeyValueStore, MockPredictor,
    Outcome, PredictionForm, RecordingSink, Session, SimulatedPredictor,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn form(bedrooms: u32, sqft: u32, location: u32) -> PredictionForm {
    PredictionForm {
        bedrooms: bedrooms.to_string(),
        bathrooms: "2".into(),
        sqft: sqft.to_string(),
        location: location.to_string(),
        age: "10".into(),
        model_type: "linear_regression".into(),
    }
}

/// Helper to open a session on a workspace with the simulated predictor.
fn open(workspace: &TempDir) -> Session {
    let config = HomevalConfig::default();
    Session::open(workspace.path(), &config).unwrap()
}

#[tokio::test]
async fn test_reference_scenario_appends_exactly_one_record() {
    let workspace = TempDir::new().unwrap();
    let mut session = open(&workspace);
    let before = session.history().len();

    let outcome = session.submit(&form(3, 1500, 1)).await;
    let Outcome::Recorded { record, persistence } = outcome else {
        panic!("prediction should succeed");
    };

    assert!(persistence.is_none());
    assert_eq!(session.history().len(), before + 1);
    assert_eq!(record.bedrooms, 3);
    assert_eq!(record.bathrooms, 2.0);
    assert_eq!(record.sqft, 1500);
    assert_eq!(record.location, 1);
    assert_eq!(record.age, 10);
    assert_eq!(record.model_type, "linear_regression");
    assert!(record.price.is_finite());
    let importance = record.feature_importance.expect("importance is returned");
    assert_eq!(importance.values().len(), 5);
    assert!(importance.values().iter().all(|v| v.is_finite()));
}

#[tokio::test]
async fn test_history_survives_restart() {
    let workspace = TempDir::new().unwrap();
    {
        let mut session = open(&workspace);
        session.submit(&form(2, 900, 0)).await;
        session.submit(&form(4, 2400, 2)).await;
    }

    let session = open(&workspace);
    assert_eq!(session.history().len(), 2);
    assert!(session.history().load_warning().is_none());
    let bedrooms: Vec<u32> = session.history().all().iter().map(|r| r.bedrooms).collect();
    assert_eq!(bedrooms, vec![2, 4]);
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty_with_warning() {
    let workspace = TempDir::new().unwrap();
    let config = HomevalConfig::default();
    let store = FileStore::new(config.storage.resolve_data_dir(workspace.path()));
    store.set(&config.storage.history_key, "[{\"oops\":").unwrap();

    let mut session = open(&workspace);
    assert!(session.history().is_empty());
    assert!(session.history().load_warning().is_some());

    // The session stays usable and overwrites the corrupt snapshot.
    session.submit(&form(3, 1500, 1)).await;
    let reopened = open(&workspace);
    assert_eq!(reopened.history().len(), 1);
}

#[tokio::test]
async fn test_clear_then_all_is_empty_and_snapshot_removed() {
    let workspace = TempDir::new().unwrap();
    let config = HomevalConfig::default();
    let mut session = open(&workspace);
    session.submit(&form(3, 1500, 1)).await;

    let store = FileStore::new(config.storage.resolve_data_dir(workspace.path()));
    assert!(store.contains(&config.storage.history_key).unwrap());

    let status = session.clear_history(&AutoConfirm(true)).unwrap();
    assert!(status.is_saved());
    assert!(session.history().all().is_empty());
    assert!(!store.contains(&config.storage.history_key).unwrap());
}

#[tokio::test]
async fn test_analytics_follow_history() {
    let store = Arc::new(homeval_core::MemoryStore::new());
    let history = HistoryStore::load(store, "predictionHistory");
    let mut session = Session::new(
        history,
        Arc::new(SimulatedPredictor::new(0.0)),
        &HomevalConfig::default(),
    );
    let sink = Arc::new(RecordingSink::new());
    session.attach_sink(sink.clone());

    for (bedrooms, sqft, location) in [(2, 800, 0), (3, 1500, 1), (4, 2200, 2), (5, 3000, 2)] {
        session.submit(&form(bedrooms, sqft, location)).await;
    }

    let analytics = session.refresh_analytics();
    assert_eq!(analytics.price_trend.len(), 4);
    // Without noise, price rises with square footage.
    assert!(analytics.feature_correlations.get(Feature::Sqft) > 0.9);
    let averages = sink.series(ids::LOCATION_IMPACT).unwrap();
    assert_eq!(averages.values.len(), 3);
    assert!(averages.values.iter().all(|v| *v > 0.0));
}

#[tokio::test]
async fn test_failed_prediction_then_retry() {
    let store = Arc::new(homeval_core::MemoryStore::new());
    let history = HistoryStore::load(store, "predictionHistory");
    let mock = Arc::new(MockPredictor::new());
    mock.queue_failure("connection reset");
    let mut session = Session::new(history, mock, &HomevalConfig::default());

    assert!(matches!(session.submit(&form(3, 1500, 1)).await, Outcome::Failed(_)));
    assert!(session.history().is_empty());

    assert!(matches!(
        session.submit(&form(3, 1500, 1)).await,
        Outcome::Recorded { .. }
    ));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_export_files_written_to_workspace() {
    let workspace = TempDir::new().unwrap();
    let mut session = open(&workspace);

    assert!(matches!(
        session.export_history(),
        Err(ExportError::EmptyHistory)
    ));

    session.submit(&form(3, 1500, 1)).await;
    let single = session.export_current(ExportFormat::Csv).unwrap();
    let path = single.write_to(workspace.path()).unwrap();
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("house_prediction_"));

    let bulk = session.export_history().unwrap();
    let path = bulk.write_to(workspace.path()).unwrap();
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.starts_with("Date,Price,Bedrooms,Bathrooms,Square Feet,Location,Age,Model\n"));
    assert!(content.contains("\"Suburban\""));
}
