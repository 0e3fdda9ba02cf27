//! The boundary with the backend prediction service.
//!
//! Only the request/response schema matters here. Responses are decoded into the typed records of
//! this crate and checked before anything else sees them, so malformed data is reported as a
//! [`ClientError::Schema`] instead of travelling further in.
use crate::dataset::Dataset;
use crate::prediction::PredictionResult;
use crate::scenario::{ScenarioDefaults, ScenarioInput};
use crate::settings::Settings;
use crate::zone::Zone;
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Endpoint serving the analytics dataset
pub const DASHBOARD_ENDPOINT: &str = "/api/dashboard";

/// Endpoint serving zone defaults for the scenario form
pub const DEFAULTS_ENDPOINT: &str = "/api/defaults";

/// Endpoint accepting scenarios for prediction
pub const PREDICT_ENDPOINT: &str = "/api/predict";

/// A failed call to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The backend could not be reached
    Transport {
        /// The endpoint called
        endpoint: String,
        /// What went wrong
        message: String,
    },
    /// The backend answered with an error status
    HttpStatus {
        /// The endpoint called
        endpoint: String,
        /// The HTTP status code
        code: u16,
        /// The response body
        message: String,
    },
    /// The backend's response did not match the expected schema
    Schema {
        /// The endpoint called
        endpoint: String,
        /// What was wrong with the response
        message: String,
    },
}

impl ClientError {
    /// The endpoint whose call failed
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::HttpStatus { endpoint, .. }
            | Self::Schema { endpoint, .. } => endpoint,
        }
    }

    /// Whether the backend answered but with malformed data
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    fn schema(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    fn transport(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { endpoint, message } => {
                write!(f, "request to {endpoint} failed: {message}")
            }
            Self::HttpStatus {
                endpoint,
                code,
                message,
            } => write!(f, "{endpoint} returned HTTP {code}: {message}"),
            Self::Schema { endpoint, message } => {
                write!(f, "invalid response from {endpoint}: {message}")
            }
        }
    }
}

impl Error for ClientError {}

/// The backend's three endpoints.
///
/// Calls block the calling thread; callers that must stay responsive run them on a worker thread
/// (see [`crate::session::Runtime`]).
pub trait Backend: Send + Sync {
    /// Fetch the analytics dataset for the whole network
    fn fetch_dataset(&self) -> Result<Dataset, ClientError>;

    /// Fetch baseline scenario values for a zone
    fn fetch_defaults(&self, zone: Zone) -> Result<ScenarioDefaults, ClientError>;

    /// Submit a scenario for prediction
    fn predict(&self, input: &ScenarioInput) -> Result<PredictionResult, ClientError>;
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|err| ClientError::schema(endpoint, err.to_string()))
}

/// Decode and check a dataset response
pub fn decode_dataset(body: &str) -> Result<Dataset, ClientError> {
    let dataset: Dataset = decode(DASHBOARD_ENDPOINT, body)?;
    dataset
        .validate()
        .map_err(|err| ClientError::schema(DASHBOARD_ENDPOINT, format!("{err:#}")))?;

    Ok(dataset)
}

/// Decode a zone defaults response
pub fn decode_defaults(body: &str) -> Result<ScenarioDefaults, ClientError> {
    decode(DEFAULTS_ENDPOINT, body)
}

/// Decode and check a prediction response for a scenario in `zone`.
///
/// Accuracy scores outside `[0, 1]` violate the data contract but are still accepted, so that the
/// raw figures can be shown. They are logged as warnings.
pub fn decode_prediction(body: &str, zone: Zone) -> Result<PredictionResult, ClientError> {
    let result: PredictionResult = decode(PREDICT_ENDPOINT, body)?;
    result
        .validate(zone)
        .map_err(|err| ClientError::schema(PREDICT_ENDPOINT, format!("{err:#}")))?;

    for (name, score) in result.out_of_range_scores() {
        warn!("Prediction for {zone} has {name} = {score}, outside [0, 1]");
    }

    Ok(result)
}

/// A [`Backend`] reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    /// Create a backend client for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::transport(base_url, err.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a backend client from program settings
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        Self::new(
            &settings.backend_url(),
            Duration::from_millis(settings.timeout_ms.max(1)),
        )
    }

    /// The full URL of an endpoint
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    /// Send a request and return the body of a successful response
    fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<String, ClientError> {
        debug!("Calling {}", self.url(endpoint));
        let response = request
            .send()
            .map_err(|err| ClientError::transport(endpoint, err.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(ClientError::HttpStatus {
                endpoint: endpoint.to_string(),
                code: status.as_u16(),
                message,
            });
        }

        response
            .text()
            .map_err(|err| ClientError::transport(endpoint, err.to_string()))
    }
}

impl Backend for HttpBackend {
    fn fetch_dataset(&self) -> Result<Dataset, ClientError> {
        let request = self.client.get(self.url(DASHBOARD_ENDPOINT));
        decode_dataset(&self.send(DASHBOARD_ENDPOINT, request)?)
    }

    fn fetch_defaults(&self, zone: Zone) -> Result<ScenarioDefaults, ClientError> {
        let request = self
            .client
            .get(self.url(DEFAULTS_ENDPOINT))
            .query(&[("zone", zone.name())]);
        decode_defaults(&self.send(DEFAULTS_ENDPOINT, request)?)
    }

    fn predict(&self, input: &ScenarioInput) -> Result<PredictionResult, ClientError> {
        let request = self.client.post(self.url(PREDICT_ENDPOINT)).json(input);
        decode_prediction(&self.send(PREDICT_ENDPOINT, request)?, input.zone)
    }
}
