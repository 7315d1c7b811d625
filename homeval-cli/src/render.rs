//! Terminal rendering: horizontal bar charts and the history table.

use homeval_core::chart::{ChartSink, ids};
use homeval_core::types::{display_model_name, format_currency};
use homeval_core::{Location, PredictionRecord};

const BAR_WIDTH: usize = 40;

/// Draws every series it receives as a horizontal bar chart on stdout.
#[derive(Debug, Default)]
pub struct TerminalChartSink;

impl TerminalChartSink {
    pub fn new() -> Self {
        Self
    }
}

fn title(id: &str) -> &str {
    match id {
        ids::FEATURE_IMPACT => "Feature Impact",
        ids::PRICE_TREND => "Price Over Time",
        ids::FEATURE_CORRELATION => "Feature Correlation",
        ids::LOCATION_IMPACT => "Location Impact",
        other => other,
    }
}

/// Correlations are unitless; everything else is money.
fn format_value(id: &str, value: f64) -> String {
    if id == ids::FEATURE_CORRELATION {
        format!("{value:+.3}")
    } else {
        format_currency(value)
    }
}

/// Render one series to a string.
pub fn bar_chart(id: &str, labels: &[String], values: &[f64]) -> String {
    let mut out = format!("{}\n", title(id));
    if values.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let max = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    for (label, value) in labels.iter().zip(values) {
        let len = if max > 0.0 {
            ((value.abs() / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let bar = if *value < 0.0 { "░" } else { "█" }.repeat(len);
        out.push_str(&format!(
            "  {label:<label_width$} │{bar:<BAR_WIDTH$} {}\n",
            format_value(id, *value)
        ));
    }
    out
}

impl ChartSink for TerminalChartSink {
    fn update_series(&self, id: &str, labels: &[String], values: &[f64]) {
        println!("{}", bar_chart(id, labels, values));
    }
}

/// Newest-first history table. Indices are the stable history positions.
pub fn history_table<'a>(rows: impl Iterator<Item = (usize, &'a PredictionRecord)>) -> String {
    let mut out = format!(
        "{:>4}  {:<19}  {:>15}  {:>4}  {:>5}  {:>7}  {:<8}  {:>4}  {}\n",
        "#", "Date", "Price", "Beds", "Baths", "Sq Ft", "Location", "Age", "Model"
    );
    let mut any = false;
    for (index, record) in rows {
        any = true;
        let location = match Location::from_code(record.location) {
            Some(location) => location.name().to_string(),
            None => record.location.to_string(),
        };
        out.push_str(&format!(
            "{:>4}  {:<19}  {:>15}  {:>4}  {:>5}  {:>7}  {:<8}  {:>4}  {}\n",
            index,
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            format_currency(record.price),
            record.bedrooms,
            record.bathrooms,
            record.sqft,
            location,
            record.age,
            display_model_name(&record.model_type),
        ));
    }
    if !any {
        out.push_str("  No prediction history yet\n");
    }
    out
}
