//! Prediction backends.
//!
//! The price itself is computed by an external collaborator behind the
//! [`PricePredictor`] trait. Three implementations ship with the crate:
//! - [`SimulatedPredictor`]: the demo's additive formula plus uniform noise,
//! - [`HttpPredictor`]: a remote service speaking the `/predict` JSON contract,
//! - [`MockPredictor`]: queued responses for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;

use crate::config::{PredictorBackend, PredictorConfig};
use crate::error::ServiceError;
use crate::types::{FeatureImportance, PredictionRequest, PredictionResult};

/// External price prediction function: request in, `{price, feature_importance}` out.
#[async_trait]
pub trait PricePredictor: Send + Sync {
    fn name(&self) -> &str;
    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, ServiceError>;
}

/// Build the backend selected in configuration.
pub fn build_predictor(config: &PredictorConfig) -> Result<Arc<dyn PricePredictor>, ServiceError> {
    match config.backend {
        PredictorBackend::Simulated => Ok(Arc::new(
            SimulatedPredictor::new(config.noise_max)
                .with_latency(Duration::from_millis(config.latency_ms)),
        )),
        PredictorBackend::Http => Ok(Arc::new(HttpPredictor::new(
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
        )?)),
    }
}

/// Local stand-in for the prediction service.
#[derive(Debug, Clone)]
pub struct SimulatedPredictor {
    noise_max: f64,
    latency: Duration,
}

impl SimulatedPredictor {
    pub fn new(noise_max: f64) -> Self {
        Self {
            noise_max: noise_max.max(0.0),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Price before noise: the sum of the feature contributions.
    pub fn base_price(request: &PredictionRequest) -> f64 {
        Self::importance(request).values().iter().sum()
    }

    fn importance(request: &PredictionRequest) -> FeatureImportance {
        FeatureImportance::from_inputs(
            request.bedrooms,
            request.bathrooms,
            request.sqft,
            request.location.code(),
            request.age,
        )
    }
}

impl Default for SimulatedPredictor {
    fn default() -> Self {
        Self::new(50_000.0)
    }
}

#[async_trait]
impl PricePredictor for SimulatedPredictor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, ServiceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let noise = if self.noise_max > 0.0 {
            rand::thread_rng().gen_range(0.0..self.noise_max)
        } else {
            0.0
        };
        Ok(PredictionResult {
            price: Self::base_price(request) + noise,
            feature_importance: Some(Self::importance(request)),
        })
    }
}

/// Body returned by the prediction service, success or failure.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    price: Option<f64>,
    #[serde(default)]
    feature_importance: Option<FeatureImportance>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for a remote prediction service (`POST <endpoint>/predict`).
#[derive(Debug, Clone)]
pub struct HttpPredictor {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpPredictor {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Unavailable {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: format!("{}/predict", endpoint.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PricePredictor for HttpPredictor {
    fn name(&self) -> &str {
        "http"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, ServiceError> {
        tracing::debug!(url = %self.url, model = %request.model_type, "Requesting prediction");
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    ServiceError::Request {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body: PredictResponse =
            response
                .json()
                .await
                .map_err(|e| ServiceError::ResponseParse {
                    message: e.to_string(),
                })?;
        parse_response(status.as_u16(), body)
    }
}

fn parse_response(status: u16, body: PredictResponse) -> Result<PredictionResult, ServiceError> {
    if !(200..300).contains(&status) || body.error.is_some() {
        return Err(ServiceError::Rejected {
            status,
            message: body.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    let price = body.price.ok_or_else(|| ServiceError::ResponseParse {
        message: "response has no price".to_string(),
    })?;
    Ok(PredictionResult {
        price,
        feature_importance: body.feature_importance,
    })
}

/// Predictor returning queued responses in order, for tests.
///
/// With an empty queue it answers with the simulated base price.
#[derive(Debug, Default)]
pub struct MockPredictor {
    responses: Mutex<VecDeque<Result<PredictionResult, String>>>,
    calls: Mutex<Vec<PredictionRequest>>,
}

impl MockPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful prediction.
    pub fn queue_price(&self, price: f64, feature_importance: Option<FeatureImportance>) {
        self.lock_responses().push_back(Ok(PredictionResult {
            price,
            feature_importance,
        }));
    }

    /// Queue a service failure.
    pub fn queue_failure(&self, message: &str) {
        self.lock_responses().push_back(Err(message.to_string()));
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<PredictionRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<PredictionResult, String>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PricePredictor for MockPredictor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, ServiceError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        match self.lock_responses().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(ServiceError::Unavailable { message }),
            None => Ok(PredictionResult {
                price: SimulatedPredictor::base_price(request),
                feature_importance: Some(SimulatedPredictor::importance(request)),
            }),
        }
    }
}
