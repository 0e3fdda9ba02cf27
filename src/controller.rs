//! The scenario form and the lifecycle of prediction requests.
//!
//! ```text
//! Idle ──select──▶ Ready ──submit──▶ Submitting ──ok──▶ Succeeded
//!                    ▲                    │                 │
//!                    │                    └──error──▶ Failed│
//!                    └──────── zone change (from any state) ┘
//! ```
//!
//! `Succeeded` and `Failed` can be submitted from again. Every submission and every zone change
//! bumps a generation counter, and a response is only applied if it carries the current
//! generation.
use crate::client::ClientError;
use crate::prediction::PredictionResult;
use crate::scenario::{ScenarioDefaults, ScenarioField, ScenarioForm, ScenarioInput, ValidationError};
use crate::zone::Zone;
use log::{debug, info, warn};
use std::fmt;

/// Where the controller is in the prediction lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    /// No zone selected
    Idle,
    /// Zone selected and form editable
    Ready,
    /// Prediction request in flight
    Submitting,
    /// The last submission produced a result
    Succeeded,
    /// The last submission failed
    Failed,
}

/// An outstanding prediction request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTicket {
    /// The scenario being predicted
    pub input: ScenarioInput,
    generation: u64,
}

/// Why a submission was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// The form failed validation
    Validation(ValidationError),
    /// A prediction is already in flight
    AlreadySubmitting,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::AlreadySubmitting => write!(f, "a prediction is already in progress"),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<ValidationError> for SubmitError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// Owns the scenario form and the prediction result
#[derive(Debug)]
pub struct ScenarioController {
    state: ScenarioState,
    form: ScenarioForm,
    result: Option<PredictionResult>,
    last_error: Option<ClientError>,
    generation: u64,
}

impl Default for ScenarioController {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioController {
    /// Create an idle controller
    pub fn new() -> Self {
        Self {
            state: ScenarioState::Idle,
            form: ScenarioForm::default(),
            result: None,
            last_error: None,
            generation: 0,
        }
    }

    /// The current state
    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// The scenario form
    pub fn form(&self) -> &ScenarioForm {
        &self.form
    }

    /// The result of the last successful prediction for the current zone
    pub fn result(&self) -> Option<&PredictionResult> {
        self.result.as_ref()
    }

    /// The error from the last failed prediction
    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Start a new scenario for `zone`, abandoning the previous scenario and any request in flight
    pub fn select_zone(&mut self, zone: Zone) {
        self.generation += 1;
        self.form = ScenarioForm::new(Some(zone));
        self.result = None;
        self.last_error = None;
        self.state = ScenarioState::Ready;
    }

    /// Seed the form with zone defaults, keeping anything the operator has already entered
    pub fn apply_defaults(&mut self, defaults: &ScenarioDefaults) {
        self.form.apply_defaults(defaults);
    }

    /// Edit a field. Edits are allowed in every state and never change the state.
    pub fn edit(&mut self, field: ScenarioField, value: impl Into<String>) {
        self.form.set(field, value);
    }

    /// Validate the form and start a prediction request.
    ///
    /// On rejection the state is left unchanged and nothing should be sent to the backend.
    pub fn submit(&mut self) -> Result<PredictionTicket, SubmitError> {
        if self.state == ScenarioState::Submitting {
            return Err(SubmitError::AlreadySubmitting);
        }

        let input = self.form.validate()?;
        self.generation += 1;
        self.state = ScenarioState::Submitting;
        info!("Submitting scenario for {}", input.zone);

        Ok(PredictionTicket {
            input,
            generation: self.generation,
        })
    }

    /// Apply the outcome of a prediction request.
    ///
    /// # Returns
    ///
    /// `true` if applied, `false` if the request had been superseded
    pub fn complete(
        &mut self,
        ticket: &PredictionTicket,
        result: Result<PredictionResult, ClientError>,
    ) -> bool {
        if ticket.generation != self.generation || self.state != ScenarioState::Submitting {
            debug!(
                "Discarding prediction for {} (generation {})",
                ticket.input.zone, ticket.generation
            );
            return false;
        }

        match result {
            Ok(result) => {
                info!("Prediction received for {}", ticket.input.zone);
                self.result = Some(result);
                self.last_error = None;
                self.state = ScenarioState::Succeeded;
            }
            Err(err) => {
                warn!("Prediction failed: {err}");
                self.last_error = Some(err);
                self.state = ScenarioState::Failed;
            }
        }

        true
    }
}
