//! Prediction orchestrator: one user session's form → prediction → history →
//! analytics → display loop.
//!
//! Each request moves through `Idle → Pending → {Succeeded, Failed}`. The
//! session is owned by a single task and mutated through `&mut self`, so
//! history appends never interleave; the only suspension point is the
//! awaited predictor call.
//!
//! Overlapping submissions follow a latest-wins policy: every submission is
//! issued a ticket, and a completion carrying anything but the latest ticket
//! is discarded without touching the history.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::analytics::{Analytics, feature_labels};
use crate::chart::{ChartSink, ids};
use crate::config::HomevalConfig;
use crate::error::{
    ExportError, HomevalError, PersistenceError, ServiceError, ValidationError,
};
use crate::export::{ExportFile, ExportFormat, export_history, export_record};
use crate::history::{HistoryStore, SnapshotStatus};
use crate::predictor::{PricePredictor, build_predictor};
use crate::storage::FileStore;
use crate::types::{
    FeatureImportance, PredictionForm, PredictionRecord, PredictionRequest, PredictionResult,
};

/// Yes/no prompt shown before destructive actions.
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmation that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmation for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Prompt used before clearing the history.
pub const CLEAR_HISTORY_PROMPT: &str = "Are you sure you want to clear all prediction history?";

/// Where the latest request stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionState {
    Idle,
    Pending { ticket: u64 },
    Succeeded { ticket: u64 },
    Failed { ticket: u64, message: String },
}

/// A validated request waiting for the predictor.
#[derive(Debug, Clone)]
pub struct PendingPrediction {
    pub ticket: u64,
    pub request: PredictionRequest,
}

impl PendingPrediction {
    /// Call the predictor. Does not touch the session, so the session stays
    /// free for other events while this is awaited.
    pub async fn resolve(self, predictor: &dyn PricePredictor) -> Completion {
        let result = predictor.predict(&self.request).await;
        Completion {
            ticket: self.ticket,
            request: self.request,
            result,
        }
    }
}

/// A predictor response, ready to be applied to the session.
#[derive(Debug)]
pub struct Completion {
    pub ticket: u64,
    pub request: PredictionRequest,
    pub result: Result<PredictionResult, ServiceError>,
}

/// What a submission did to the session.
#[derive(Debug)]
pub enum Outcome {
    /// A record was created and appended. `persistence` is set when the
    /// snapshot could not be written.
    Recorded {
        record: PredictionRecord,
        persistence: Option<PersistenceError>,
    },
    /// The form did not validate.
    Invalid(ValidationError),
    /// The predictor failed; history is untouched.
    Failed(ServiceError),
    /// The response belonged to a superseded submission and was dropped.
    Discarded { ticket: u64 },
}

impl Outcome {
    /// Message suitable for showing to the user.
    pub fn notice(&self) -> Option<String> {
        match self {
            Outcome::Recorded {
                persistence: Some(err),
                ..
            } => Some(format!("Prediction saved for this session only: {err}")),
            Outcome::Recorded { .. } | Outcome::Discarded { .. } => None,
            Outcome::Invalid(err) => Some(format!("Please check your input: {err}")),
            Outcome::Failed(err) => Some(format!("Error making prediction: {err}")),
        }
    }
}

/// A single user session: history, predictor, display, and the current record.
pub struct Session {
    history: HistoryStore,
    predictor: Arc<dyn PricePredictor>,
    sink: Option<Arc<dyn ChartSink>>,
    current: Option<PredictionRecord>,
    state: PredictionState,
    next_ticket: u64,
    date_label_format: String,
    export_date_format: String,
}

impl Session {
    pub fn new(history: HistoryStore, predictor: Arc<dyn PricePredictor>, config: &HomevalConfig) -> Self {
        Self {
            history,
            predictor,
            sink: None,
            current: None,
            state: PredictionState::Idle,
            next_ticket: 0,
            date_label_format: config.analytics.date_label_format.clone(),
            export_date_format: config.export.date_format.clone(),
        }
    }

    /// Session backed by the file store and predictor named in `config`.
    pub fn open(workspace: &Path, config: &HomevalConfig) -> Result<Self, HomevalError> {
        let mut store = FileStore::new(config.storage.resolve_data_dir(workspace));
        if let Some(limit) = config.storage.max_snapshot_bytes {
            store = store.with_quota(limit);
        }
        let history = HistoryStore::load(Arc::new(store), config.storage.history_key.clone());
        let predictor = build_predictor(&config.predictor)?;
        Ok(Self::new(history, predictor, config))
    }

    /// Attach a display and draw the current analytics on it.
    pub fn attach_sink(&mut self, sink: Arc<dyn ChartSink>) {
        self.sink = Some(sink);
        self.refresh_analytics();
    }

    /// Stop rendering. Late completions still update state.
    pub fn detach_sink(&mut self) {
        self.sink = None;
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn current(&self) -> Option<&PredictionRecord> {
        self.current.as_ref()
    }

    pub fn state(&self) -> &PredictionState {
        &self.state
    }

    pub fn predictor(&self) -> &Arc<dyn PricePredictor> {
        &self.predictor
    }

    /// Validate the form and start a request (`Idle → Pending`). Any request
    /// still pending is superseded.
    pub fn begin(&mut self, form: &PredictionForm) -> Result<PendingPrediction, ValidationError> {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        match form.parse() {
            Ok(request) => {
                if let PredictionState::Pending { ticket: previous } = self.state {
                    tracing::debug!(previous, ticket, "Superseding pending prediction");
                }
                self.state = PredictionState::Pending { ticket };
                Ok(PendingPrediction { ticket, request })
            }
            Err(err) => {
                tracing::debug!(error = %err, "Prediction form rejected");
                self.state = PredictionState::Failed {
                    ticket,
                    message: err.to_string(),
                };
                Err(err)
            }
        }
    }

    /// Apply a predictor response (`Pending → Succeeded | Failed`).
    pub fn complete(&mut self, completion: Completion) -> Outcome {
        let Completion {
            ticket,
            request,
            result,
        } = completion;

        if self.state != (PredictionState::Pending { ticket }) {
            tracing::debug!(ticket, "Discarding response of superseded prediction");
            return Outcome::Discarded { ticket };
        }

        match result {
            Ok(result) => {
                let record = request.into_record(result, Utc::now());
                let status = self.history.append(record.clone());
                self.current = Some(record.clone());
                self.state = PredictionState::Succeeded { ticket };
                self.render_feature_impact(&record.importance_or_estimate());
                self.refresh_analytics();
                let persistence = match status {
                    SnapshotStatus::Saved => None,
                    SnapshotStatus::Degraded(err) => Some(err),
                };
                Outcome::Recorded {
                    record,
                    persistence,
                }
            }
            Err(err) => {
                tracing::warn!(ticket, error = %err, "Prediction failed");
                self.state = PredictionState::Failed {
                    ticket,
                    message: err.to_string(),
                };
                Outcome::Failed(err)
            }
        }
    }

    /// Full submission: validate, await the predictor, apply the result.
    pub async fn submit(&mut self, form: &PredictionForm) -> Outcome {
        let pending = match self.begin(form) {
            Ok(pending) => pending,
            Err(err) => return Outcome::Invalid(err),
        };
        let predictor = Arc::clone(&self.predictor);
        let completion = pending.resolve(predictor.as_ref()).await;
        self.complete(completion)
    }

    /// Make a past record current and return its form for re-prediction.
    /// The record itself is never modified.
    pub fn view(&mut self, index: usize) -> Option<PredictionForm> {
        let record = self.history.get(index)?.clone();
        self.render_feature_impact(&record.importance_or_estimate());
        let form = record.to_form();
        self.current = Some(record);
        Some(form)
    }

    /// Clear the history after confirmation. Returns whether it was cleared.
    pub fn clear_history(&mut self, confirmation: &dyn Confirmation) -> Option<SnapshotStatus> {
        if !confirmation.confirm(CLEAR_HISTORY_PROMPT) {
            return None;
        }
        let status = self.history.clear();
        self.refresh_analytics();
        Some(status)
    }

    /// Recompute analytics and push them to the display, if attached.
    pub fn refresh_analytics(&self) -> Analytics {
        let analytics = Analytics::compute(self.history.all(), &self.date_label_format);
        if let Some(sink) = &self.sink {
            analytics.publish(sink.as_ref());
        }
        analytics
    }

    /// Export the current record.
    pub fn export_current(&self, format: ExportFormat) -> Result<ExportFile, ExportError> {
        let record = self.current.as_ref().ok_or(ExportError::NoCurrentRecord)?;
        export_record(record, format, Utc::now())
    }

    /// Export the whole history as CSV.
    pub fn export_history(&self) -> Result<ExportFile, ExportError> {
        export_history(self.history.all(), &self.export_date_format, Utc::now())
    }

    fn render_feature_impact(&self, importance: &FeatureImportance) {
        if let Some(sink) = &self.sink {
            sink.update_series(ids::FEATURE_IMPACT, &feature_labels(), &importance.values());
        }
    }
}
