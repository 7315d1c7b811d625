//! Views derived from the prediction history: price trend, feature-to-price
//! correlation, and average price per location.
//!
//! Every view is recomputed from scratch; histories are small (hundreds of
//! records) and the aggregator keeps no incremental state. An empty history
//! produces an empty trend and all-zero correlations and averages.

use serde::{Deserialize, Serialize};

use crate::chart::{ChartSink, ids};
use crate::correlation::pearson;
use crate::types::{Feature, Location, PredictionRecord};

/// Default chrono format for trend labels.
pub const DEFAULT_DATE_LABEL_FORMAT: &str = "%Y-%m-%d";

/// Prices ordered by timestamp, with a parallel sequence of date labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTrend {
    pub labels: Vec<String>,
    pub prices: Vec<f64>,
}

impl PriceTrend {
    /// Stable sort by timestamp; records sharing a timestamp keep their
    /// insertion order.
    pub fn compute(records: &[PredictionRecord], date_format: &str) -> Self {
        let mut sorted: Vec<&PredictionRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.timestamp);
        Self {
            labels: sorted
                .iter()
                .map(|r| r.timestamp.format(date_format).to_string())
                .collect(),
            prices: sorted.iter().map(|r| r.price).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Pearson correlation of each feature against price, in `Feature::ALL` order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrelations(pub [f64; 5]);

impl FeatureCorrelations {
    pub fn compute(records: &[PredictionRecord]) -> Self {
        if records.len() <= 1 {
            return Self::default();
        }
        let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
        Self(Feature::ALL.map(|feature| {
            let values: Vec<f64> = records.iter().map(|r| feature.value_of(r)).collect();
            pearson(&values, &prices)
        }))
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature as usize]
    }

    pub fn values(&self) -> &[f64; 5] {
        &self.0
    }
}

/// Average price per location, in `Location::ALL` order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationAverages(pub [f64; 3]);

impl LocationAverages {
    /// Categories without records average to zero. Records whose location
    /// code is unknown are left out.
    pub fn compute(records: &[PredictionRecord]) -> Self {
        let mut sums = [0.0f64; 3];
        let mut counts = [0usize; 3];
        for record in records {
            if let Some(location) = record.location_category() {
                let idx = location.code() as usize;
                sums[idx] += record.price;
                counts[idx] += 1;
            }
        }
        let mut averages = [0.0f64; 3];
        for idx in 0..3 {
            if counts[idx] > 0 {
                averages[idx] = sums[idx] / counts[idx] as f64;
            }
        }
        Self(averages)
    }

    pub fn get(&self, location: Location) -> f64 {
        self.0[location.code() as usize]
    }

    pub fn values(&self) -> &[f64; 3] {
        &self.0
    }
}

/// All three history views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub price_trend: PriceTrend,
    pub feature_correlations: FeatureCorrelations,
    pub location_averages: LocationAverages,
}

impl Analytics {
    pub fn compute(records: &[PredictionRecord], date_format: &str) -> Self {
        Self {
            price_trend: PriceTrend::compute(records, date_format),
            feature_correlations: FeatureCorrelations::compute(records),
            location_averages: LocationAverages::compute(records),
        }
    }

    /// Push every view to the sink.
    pub fn publish(&self, sink: &dyn ChartSink) {
        sink.update_series(
            ids::PRICE_TREND,
            &self.price_trend.labels,
            &self.price_trend.prices,
        );
        sink.update_series(
            ids::FEATURE_CORRELATION,
            &feature_labels(),
            self.feature_correlations.values(),
        );
        let location_labels: Vec<String> =
            Location::ALL.iter().map(|l| l.name().to_string()).collect();
        sink.update_series(
            ids::LOCATION_IMPACT,
            &location_labels,
            self.location_averages.values(),
        );
    }
}

/// Feature chart labels in `Feature::ALL` order.
pub fn feature_labels() -> Vec<String> {
    Feature::ALL.iter().map(|f| f.label().to_string()).collect()
}
