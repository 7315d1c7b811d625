//! Rendering seam. The core hands labeled series to a [`ChartSink`] and never
//! knows how (or whether) they are drawn.

use std::collections::HashMap;
use std::sync::Mutex;

/// Identifiers of the charts the core feeds.
pub mod ids {
    /// Per-feature importance of the current prediction.
    pub const FEATURE_IMPACT: &str = "feature_impact";
    /// Price over time, across the history.
    pub const PRICE_TREND: &str = "price_trend";
    /// Feature-to-price correlation across the history.
    pub const FEATURE_CORRELATION: &str = "feature_correlation";
    /// Average price per location category.
    pub const LOCATION_IMPACT: &str = "location_impact";
}

/// Accepts a labeled numeric series and redraws the chart `id`.
pub trait ChartSink: Send + Sync {
    fn update_series(&self, id: &str, labels: &[String], values: &[f64]);
}

/// A labeled series as last pushed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Sink that remembers the latest series per chart and counts redraws.
#[derive(Debug, Default)]
pub struct RecordingSink {
    series: Mutex<HashMap<String, Series>>,
    updates: Mutex<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(&self, id: &str) -> Option<Series> {
        self.series
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn update_count(&self) -> usize {
        *self.updates.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChartSink for RecordingSink {
    fn update_series(&self, id: &str, labels: &[String], values: &[f64]) {
        self.series.lock().unwrap_or_else(|e| e.into_inner()).insert(
            id.to_string(),
            Series {
                labels: labels.to_vec(),
                values: values.to_vec(),
            },
        );
        *self.updates.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }
}
