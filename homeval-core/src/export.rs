//! Export of predictions to downloadable JSON and CSV files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::storage::atomic_write;
use crate::types::{Location, PredictionRecord, display_model_name};

/// Default chrono format of the Date column in history exports.
pub const DEFAULT_EXPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column headers of the bulk history export.
pub const HISTORY_HEADERS: [&str; 8] = [
    "Date",
    "Price",
    "Bedrooms",
    "Bathrooms",
    "Square Feet",
    "Location",
    "Age",
    "Model",
];

/// Field names of a single-record CSV export, in declaration order.
pub const RECORD_FIELDS: [&str; 9] = [
    "bedrooms",
    "bathrooms",
    "sqft",
    "location",
    "age",
    "model_type",
    "price",
    "feature_importance",
    "timestamp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{other}' (expected json or csv)")),
        }
    }
}

/// A file ready to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub content: String,
}

impl ExportFile {
    /// Write the file into `dir`, returning its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.file_name);
        atomic_write(&path, self.content.as_bytes()).map_err(|e| ExportError::WriteFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), bytes = self.content.len(), "Export written");
        Ok(path)
    }
}

/// Export one record as pretty JSON or a two-line CSV.
pub fn export_record(
    record: &PredictionRecord,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> Result<ExportFile, ExportError> {
    let content = match format {
        ExportFormat::Json => record_to_json(record)?,
        ExportFormat::Csv => record_to_csv(record)?,
    };
    Ok(ExportFile {
        file_name: format!(
            "house_prediction_{}.{}",
            now.format("%Y-%m-%d"),
            format.extension()
        ),
        mime_type: format.mime_type(),
        content,
    })
}

/// Export the whole history as CSV. Fails when there is nothing to export.
pub fn export_history(
    records: &[PredictionRecord],
    date_format: &str,
    now: DateTime<Utc>,
) -> Result<ExportFile, ExportError> {
    if records.is_empty() {
        return Err(ExportError::EmptyHistory);
    }
    Ok(ExportFile {
        file_name: format!("house_price_history_{}.csv", now.format("%Y-%m-%d")),
        mime_type: ExportFormat::Csv.mime_type(),
        content: history_to_csv(records, date_format),
    })
}

/// Pretty-printed (2-space) JSON of a record.
pub fn record_to_json(record: &PredictionRecord) -> Result<String, ExportError> {
    serde_json::to_string_pretty(record).map_err(encode_error)
}

/// Header row of field names plus one values row. Feature importance is
/// embedded as a JSON string.
pub fn record_to_csv(record: &PredictionRecord) -> Result<String, ExportError> {
    let importance = match &record.feature_importance {
        Some(fi) => serde_json::to_string(fi).map_err(encode_error)?,
        None => String::new(),
    };
    let values = [
        record.bedrooms.to_string(),
        record.bathrooms.to_string(),
        record.sqft.to_string(),
        record.location.to_string(),
        record.age.to_string(),
        record.model_type.clone(),
        record.price.to_string(),
        importance,
        record.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    ];
    let row: Vec<String> = values.iter().map(|v| escape_field(v)).collect();
    Ok(format!("{}\n{}", RECORD_FIELDS.join(","), row.join(",")))
}

fn encode_error(err: serde_json::Error) -> ExportError {
    ExportError::Encode {
        message: err.to_string(),
    }
}

/// Bulk CSV: fixed headers, one quoted row per record.
pub fn history_to_csv(records: &[PredictionRecord], date_format: &str) -> String {
    let mut out = HISTORY_HEADERS.join(",");
    out.push('\n');
    for record in records {
        let location = match Location::from_code(record.location) {
            Some(location) => location.name().to_string(),
            None => record.location.to_string(),
        };
        let row = [
            record.timestamp.format(date_format).to_string(),
            record.price.to_string(),
            record.bedrooms.to_string(),
            record.bathrooms.to_string(),
            record.sqft.to_string(),
            location,
            record.age.to_string(),
            display_model_name(&record.model_type),
        ];
        let quoted: Vec<String> = row.iter().map(|v| quote(v)).collect();
        out.push_str(&quoted.join(","));
        out.push('\n');
    }
    out
}

/// Always quote, doubling internal quotes.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Quote only when the value contains a separator, quote or line break.
fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quote(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureImportance;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 4, 18, 30, 0).unwrap()
    }

    fn record() -> PredictionRecord {
        PredictionRecord {
            bedrooms: 3,
            bathrooms: 2.5,
            sqft: 1500,
            location: 1,
            age: 10,
            model_type: "random_forest".into(),
            price: 250000.5,
            feature_importance: Some(FeatureImportance {
                bedrooms: 15000.0,
                bathrooms: 25000.0,
                sqft: 150000.0,
                location: 40000.0,
                age: 20000.0,
            }),
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, 8, 15, 0).unwrap(),
        }
    }

    #[test]
    fn test_record_json_is_pretty() {
        let file = export_record(&record(), ExportFormat::Json, now()).unwrap();
        assert_eq!(file.file_name, "house_prediction_2024-07-04.json");
        assert_eq!(file.mime_type, "application/json");
        assert!(file.content.starts_with("{\n  \"bedrooms\": 3,"));
        let back: PredictionRecord = serde_json::from_str(&file.content).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn test_record_csv() {
        let file = export_record(&record(), ExportFormat::Csv, now()).unwrap();
        assert_eq!(file.file_name, "house_prediction_2024-07-04.csv");
        let mut lines = file.content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "bedrooms,bathrooms,sqft,location,age,model_type,price,feature_importance,timestamp"
        );
        assert_eq!(
            lines.next().unwrap(),
            "3,2.5,1500,1,10,random_forest,250000.5,\
             \"{\"\"bedrooms\"\":15000.0,\"\"bathrooms\"\":25000.0,\"\"sqft\"\":150000.0,\
             \"\"location\"\":40000.0,\"\"age\"\":20000.0}\",2024-07-01T08:15:00Z"
        );
    }

    #[test]
    fn test_record_csv_without_importance() {
        let mut r = record();
        r.feature_importance = None;
        let csv = record_to_csv(&r).unwrap();
        assert!(csv.ends_with(",250000.5,,2024-07-01T08:15:00Z"));
    }

    #[test]
    fn test_record_exports_share_timestamp_format() {
        let json = record_to_json(&record()).unwrap();
        let csv = record_to_csv(&record()).unwrap();
        let stamp = "2024-07-01T08:15:00Z";
        assert!(json.contains(&format!("\"timestamp\": \"{stamp}\"")));
        assert!(csv.ends_with(stamp));

        let mut fractional = record();
        fractional.timestamp = Utc.with_ymd_and_hms(2024, 7, 1, 8, 15, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        let json = record_to_json(&fractional).unwrap();
        let csv = record_to_csv(&fractional).unwrap();
        assert!(json.contains("2024-07-01T08:15:00.250Z"));
        assert!(csv.ends_with("2024-07-01T08:15:00.250Z"));
    }

    #[test]
    fn test_encode_error_message() {
        let err = serde_json::from_str::<PredictionRecord>("{").unwrap_err();
        let export_err = encode_error(err);
        assert!(matches!(export_err, ExportError::Encode { .. }));
        assert!(export_err.to_string().starts_with("Failed to encode export"));
    }

    #[test]
    fn test_history_csv() {
        let mut second = record();
        second.location = 7;
        second.model_type = "my \"best\"_model".into();
        second.price = 100.0;
        let csv = history_to_csv(&[record(), second], DEFAULT_EXPORT_DATE_FORMAT);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Date,Price,Bedrooms,Bathrooms,Square Feet,Location,Age,Model"
        );
        assert_eq!(
            lines[1],
            "\"2024-07-01 08:15:00\",\"250000.5\",\"3\",\"2.5\",\"1500\",\"Suburban\",\"10\",\"Random Forest\""
        );
        assert_eq!(
            lines[2],
            "\"2024-07-01 08:15:00\",\"100\",\"3\",\"2.5\",\"1500\",\"7\",\"10\",\"My \"\"Best\"\" Model\""
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_history_export_fails() {
        let err = export_history(&[], DEFAULT_EXPORT_DATE_FORMAT, now()).unwrap_err();
        assert!(matches!(err, ExportError::EmptyHistory));
    }

    #[test]
    fn test_history_file_name() {
        let file = export_history(&[record()], DEFAULT_EXPORT_DATE_FORMAT, now()).unwrap();
        assert_eq!(file.file_name, "house_price_history_2024-07-04.csv");
        assert_eq!(file.mime_type, "text/csv");
    }

    #[test]
    fn test_write_to() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = export_history(&[record()], DEFAULT_EXPORT_DATE_FORMAT, now()).unwrap();
        let path = file.write_to(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), file.content);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
