//! Fundamental data types: prediction requests, results, and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Location category of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Rural,
    Suburban,
    Urban,
}

impl Location {
    pub const ALL: [Location; 3] = [Location::Rural, Location::Suburban, Location::Urban];

    /// Map an integer code (0, 1, 2) to a location.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Location::Rural),
            1 => Some(Location::Suburban),
            2 => Some(Location::Urban),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Location::Rural => 0,
            Location::Suburban => 1,
            Location::Urban => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Location::Rural => "Rural",
            Location::Suburban => "Suburban",
            Location::Urban => "Urban",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five input features the prediction is based on, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Bedrooms,
    Bathrooms,
    Sqft,
    Location,
    Age,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Bedrooms,
        Feature::Bathrooms,
        Feature::Sqft,
        Feature::Location,
        Feature::Age,
    ];

    /// Machine name, as used in JSON payloads.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Bedrooms => "bedrooms",
            Feature::Bathrooms => "bathrooms",
            Feature::Sqft => "sqft",
            Feature::Location => "location",
            Feature::Age => "age",
        }
    }

    /// Human-readable chart label.
    pub fn label(self) -> &'static str {
        match self {
            Feature::Bedrooms => "Bedrooms",
            Feature::Bathrooms => "Bathrooms",
            Feature::Sqft => "Square Feet",
            Feature::Location => "Location",
            Feature::Age => "Age",
        }
    }

    /// This feature's value on a record, as a number.
    pub fn value_of(self, record: &PredictionRecord) -> f64 {
        match self {
            Feature::Bedrooms => f64::from(record.bedrooms),
            Feature::Bathrooms => record.bathrooms,
            Feature::Sqft => f64::from(record.sqft),
            Feature::Location => record.location as f64,
            Feature::Age => f64::from(record.age),
        }
    }
}

/// Per-feature contribution to a predicted price, as returned by the
/// prediction service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    #[serde(default)]
    pub bedrooms: f64,
    #[serde(default)]
    pub bathrooms: f64,
    #[serde(default)]
    pub sqft: f64,
    #[serde(default)]
    pub location: f64,
    #[serde(default)]
    pub age: f64,
}

impl FeatureImportance {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Bedrooms => self.bedrooms,
            Feature::Bathrooms => self.bathrooms,
            Feature::Sqft => self.sqft,
            Feature::Location => self.location,
            Feature::Age => self.age,
        }
    }

    /// Values in `Feature::ALL` order.
    pub fn values(&self) -> [f64; 5] {
        Feature::ALL.map(|f| self.get(f))
    }

    /// The demo service's additive contribution formula.
    pub fn from_inputs(bedrooms: u32, bathrooms: f64, sqft: u32, location: i64, age: u32) -> Self {
        Self {
            bedrooms: f64::from(bedrooms) * 5000.0,
            bathrooms: bathrooms * 10000.0,
            sqft: f64::from(sqft) * 100.0,
            location: (3.0 - location as f64) * 20000.0,
            age: f64::from(30 - age.min(30)) * 1000.0,
        }
    }
}

/// Raw form input, exactly as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionForm {
    pub bedrooms: String,
    pub bathrooms: String,
    pub sqft: String,
    pub location: String,
    pub age: String,
    pub model_type: String,
}

impl PredictionForm {
    /// Validate and coerce the raw fields into a typed request.
    pub fn parse(&self) -> Result<PredictionRequest, ValidationError> {
        let bedrooms = parse_count("bedrooms", &self.bedrooms)?;
        let bathrooms = parse_decimal("bathrooms", &self.bathrooms)?;
        let sqft = parse_count("sqft", &self.sqft)?;
        let location_code = parse_integer("location", &self.location)?;
        let location = Location::from_code(location_code).ok_or(
            ValidationError::UnknownLocation {
                code: location_code,
            },
        )?;
        let age = parse_count("age", &self.age)?;
        let model_type = self.model_type.trim();
        if model_type.is_empty() {
            return Err(ValidationError::MissingField {
                field: "model_type".into(),
            });
        }
        Ok(PredictionRequest {
            bedrooms,
            bathrooms,
            sqft,
            location,
            age,
            model_type: model_type.to_string(),
        })
    }
}

fn require<'a>(field: &str, raw: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(trimmed)
}

fn parse_integer(field: &str, raw: &str) -> Result<i64, ValidationError> {
    let value = require(field, raw)?;
    value.parse::<i64>().map_err(|_| ValidationError::NotANumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_count(field: &str, raw: &str) -> Result<u32, ValidationError> {
    let value = parse_integer(field, raw)?;
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    u32::try_from(value).map_err(|_| ValidationError::NotANumber {
        field: field.to_string(),
        value: raw.trim().to_string(),
    })
}

fn parse_decimal(field: &str, raw: &str) -> Result<f64, ValidationError> {
    let value = require(field, raw)?;
    let parsed = value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::NotANumber {
            field: field.to_string(),
            value: value.to_string(),
        })?;
    if parsed < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(parsed)
}

/// A validated prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub sqft: u32,
    #[serde(with = "location_code")]
    pub location: Location,
    pub age: u32,
    pub model_type: String,
}

impl PredictionRequest {
    /// Merge a service result into an immutable record stamped at `timestamp`.
    pub fn into_record(self, result: PredictionResult, timestamp: DateTime<Utc>) -> PredictionRecord {
        PredictionRecord {
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            sqft: self.sqft,
            location: self.location.code(),
            age: self.age,
            model_type: self.model_type,
            price: result.price,
            feature_importance: result.feature_importance,
            timestamp,
        }
    }
}

/// Serializes a `Location` as its integer code on the wire.
mod location_code {
    use super::Location;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(location: &Location, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(location.code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Location, D::Error> {
        let code = i64::deserialize(d)?;
        Location::from_code(code).ok_or_else(|| D::Error::custom(format!("unknown location code {code}")))
    }
}

/// What the prediction service returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<FeatureImportance>,
}

/// One user query merged with its predicted result. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub sqft: u32,
    /// Location code. Codes outside 0..=2 can only come from old snapshots.
    pub location: i64,
    pub age: u32,
    pub model_type: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<FeatureImportance>,
    pub timestamp: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn location_category(&self) -> Option<Location> {
        Location::from_code(self.location)
    }

    /// Stored importance, or the service formula when the record has none.
    pub fn importance_or_estimate(&self) -> FeatureImportance {
        self.feature_importance.unwrap_or_else(|| {
            FeatureImportance::from_inputs(
                self.bedrooms,
                self.bathrooms,
                self.sqft,
                self.location,
                self.age,
            )
        })
    }

    /// Prefilled form for the "view then re-predict" flow.
    pub fn to_form(&self) -> PredictionForm {
        PredictionForm {
            bedrooms: self.bedrooms.to_string(),
            bathrooms: self.bathrooms.to_string(),
            sqft: self.sqft.to_string(),
            location: self.location.to_string(),
            age: self.age.to_string(),
            model_type: self.model_type.clone(),
        }
    }
}

/// Model identifier for display: underscores become spaces and the first
/// character of every word is capitalized (`random_forest` -> `Random Forest`,
/// `xgb-boost_v2` -> `Xgb-Boost V2`).
pub fn display_model_name(model_type: &str) -> String {
    let spaced = model_type.replace('_', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut in_word = false;
    for ch in spaced.chars() {
        let word_char = ch.is_ascii_alphanumeric();
        if word_char && !in_word {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        in_word = word_char;
    }
    out
}

/// Format a price as US currency with two decimals (`$1,234.50`).
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!(
        "{}${}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        cents % 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn form(bedrooms: &str, bathrooms: &str, sqft: &str, location: &str, age: &str) -> PredictionForm {
        PredictionForm {
            bedrooms: bedrooms.into(),
            bathrooms: bathrooms.into(),
            sqft: sqft.into(),
            location: location.into(),
            age: age.into(),
            model_type: "linear_regression".into(),
        }
    }

    #[test]
    fn test_parse_valid_form() {
        let req = form("3", "2.5", "1500", "1", "10").parse().unwrap();
        assert_eq!(req.bedrooms, 3);
        assert_eq!(req.bathrooms, 2.5);
        assert_eq!(req.sqft, 1500);
        assert_eq!(req.location, Location::Suburban);
        assert_eq!(req.age, 10);
        assert_eq!(req.model_type, "linear_regression");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let req = form(" 3 ", "2", " 900", "0 ", "1").parse().unwrap();
        assert_eq!(req.bedrooms, 3);
        assert_eq!(req.sqft, 900);
    }

    #[test]
    fn test_parse_non_numeric() {
        let err = form("three", "2", "1500", "1", "10").parse().unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotANumber {
                field: "bedrooms".into(),
                value: "three".into()
            }
        );
    }

    #[test]
    fn test_parse_missing_field() {
        let err = form("3", "", "1500", "1", "10").parse().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "bathrooms".into()
            }
        );
    }

    #[test]
    fn test_parse_negative() {
        let err = form("3", "2", "1500", "1", "-4").parse().unwrap_err();
        assert_eq!(err, ValidationError::Negative { field: "age".into() });
        let err = form("3", "-0.5", "1500", "1", "4").parse().unwrap_err();
        assert_eq!(
            err,
            ValidationError::Negative {
                field: "bathrooms".into()
            }
        );
    }

    #[test]
    fn test_parse_unknown_location() {
        let err = form("3", "2", "1500", "7", "10").parse().unwrap_err();
        assert_eq!(err, ValidationError::UnknownLocation { code: 7 });
    }

    #[test]
    fn test_parse_rejects_nan_bathrooms() {
        assert!(form("3", "NaN", "1500", "1", "10").parse().is_err());
    }

    #[test]
    fn test_parse_empty_model_type() {
        let mut f = form("3", "2", "1500", "1", "10");
        f.model_type = "   ".into();
        assert_eq!(
            f.parse().unwrap_err(),
            ValidationError::MissingField {
                field: "model_type".into()
            }
        );
    }

    #[test]
    fn test_feature_importance_formula() {
        let fi = FeatureImportance::from_inputs(3, 2.0, 1500, 1, 10);
        assert_eq!(fi.values(), [15000.0, 20000.0, 150000.0, 40000.0, 20000.0]);

        let old = FeatureImportance::from_inputs(1, 1.0, 100, 2, 45);
        assert_eq!(old.age, 0.0);
    }

    #[test]
    fn test_record_json_field_names() {
        let req = form("3", "2", "1500", "1", "10").parse().unwrap();
        let ts = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = req.into_record(
            PredictionResult {
                price: 250000.0,
                feature_importance: None,
            },
            ts,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["model_type"], "linear_regression");
        assert_eq!(json["location"], 1);
        assert!(json.get("feature_importance").is_none());
        assert_eq!(json["timestamp"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_record_loads_unknown_location_code() {
        let raw = r#"{"bedrooms":2,"bathrooms":1,"sqft":800,"location":9,"age":3,
            "model_type":"random_forest","price":100000.0,"timestamp":"2024-01-01T00:00:00Z"}"#;
        let record: PredictionRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.location, 9);
        assert_eq!(record.location_category(), None);
    }

    #[test]
    fn test_estimate_handles_extreme_location_codes() {
        let raw = r#"{"bedrooms":2,"bathrooms":1,"sqft":800,"location":-9223372036854775808,"age":3,
            "model_type":"random_forest","price":100000.0,"timestamp":"2024-01-01T00:00:00Z"}"#;
        let record: PredictionRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.location, i64::MIN);
        let estimate = record.importance_or_estimate();
        assert!(estimate.location.is_finite());
        assert!(estimate.location > 0.0);

        let high = FeatureImportance::from_inputs(1, 1.0, 100, i64::MAX, 0);
        assert!(high.location < 0.0);
    }

    #[test]
    fn test_request_serializes_location_as_code() {
        let req = form("3", "2", "1500", "2", "10").parse().unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["location"], 2);
    }

    #[test]
    fn test_display_model_name() {
        assert_eq!(display_model_name("random_forest"), "Random Forest");
        assert_eq!(display_model_name("gradient_boosting"), "Gradient Boosting");
        assert_eq!(display_model_name("linear"), "Linear");
        assert_eq!(display_model_name("a_b_c"), "A B C");
        assert_eq!(display_model_name("xgb-boost_v2"), "Xgb-Boost V2");
        assert_eq!(display_model_name("my \"best\"_model"), "My \"Best\" Model");
        assert_eq!(display_model_name("2nd_try"), "2nd Try");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1234567.5), "$1,234,567.50");
        assert_eq!(format_currency(-42.1), "-$42.10");
    }

    #[test]
    fn test_to_form_roundtrips_through_parse() {
        let req = form("4", "1.5", "2000", "2", "30").parse().unwrap();
        let record = req.clone().into_record(
            PredictionResult {
                price: 1.0,
                feature_importance: None,
            },
            Utc::now(),
        );
        assert_eq!(record.to_form().parse().unwrap(), req);
    }
}
