//! Wiring between zone selection, the dataset, defaults and the scenario controller.
//!
//! A [`Session`] reacts to one trigger at a time and never blocks: operations that need the
//! backend return a [`Request`], and the eventual outcome is fed back in as a [`Completion`].
//! [`Runtime`] runs requests on worker threads against a [`Backend`] and applies completions on the
//! thread that owns the session.
use crate::aggregate::{DerivedView, NetworkView};
use crate::client::{Backend, ClientError};
use crate::controller::{PredictionTicket, ScenarioController, ScenarioState, SubmitError};
use crate::dataset::{Dataset, DatasetState, DatasetStore, RefreshTicket};
use crate::defaults::{DefaultsLookup, DefaultsResolver, DefaultsTicket};
use crate::prediction::PredictionResult;
use crate::scenario::{ScenarioDefaults, ScenarioField, ScenarioForm};
use crate::selection::ZoneSelection;
use crate::zone::Zone;
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// A call the backend must make on the session's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Fetch the dataset
    Dataset(RefreshTicket),
    /// Fetch defaults for a zone
    Defaults(DefaultsTicket),
    /// Predict a scenario
    Prediction(PredictionTicket),
}

/// The outcome of a [`Request`]
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Outcome of a dataset fetch
    Dataset(RefreshTicket, Result<Dataset, ClientError>),
    /// Outcome of a defaults fetch
    Defaults(DefaultsTicket, Result<ScenarioDefaults, ClientError>),
    /// Outcome of a prediction
    Prediction(PredictionTicket, Result<PredictionResult, ClientError>),
}

impl Request {
    /// The endpoint the request is for
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Dataset(_) => crate::client::DASHBOARD_ENDPOINT,
            Self::Defaults(_) => crate::client::DEFAULTS_ENDPOINT,
            Self::Prediction(_) => crate::client::PREDICT_ENDPOINT,
        }
    }

    /// Make the call, blocking until the backend answers
    pub fn execute(self, backend: &dyn Backend) -> Completion {
        match self {
            Self::Dataset(ticket) => Completion::Dataset(ticket, backend.fetch_dataset()),
            Self::Defaults(ticket) => {
                Completion::Defaults(ticket, backend.fetch_defaults(ticket.zone))
            }
            Self::Prediction(ticket) => {
                let result = backend.predict(&ticket.input);
                Completion::Prediction(ticket, result)
            }
        }
    }

    /// Complete the request with an error without calling the backend
    pub fn fail(self, err: ClientError) -> Completion {
        match self {
            Self::Dataset(ticket) => Completion::Dataset(ticket, Err(err)),
            Self::Defaults(ticket) => Completion::Defaults(ticket, Err(err)),
            Self::Prediction(ticket) => Completion::Prediction(ticket, Err(err)),
        }
    }
}

/// What the analytics pane can show
#[derive(Debug, PartialEq)]
pub enum Analytics<'a> {
    /// The dataset has not arrived yet
    Loading,
    /// The dataset could not be fetched
    Unavailable(&'a ClientError),
    /// Network-wide metrics, as no zone has been selected
    Network(&'a NetworkView),
    /// Derived metrics for the selected zone
    Ready(&'a DerivedView),
}

/// The state of one operator session
#[derive(Debug, Default)]
pub struct Session {
    selection: ZoneSelection,
    store: DatasetStore,
    defaults: DefaultsResolver,
    controller: ScenarioController,
    network: Option<NetworkView>,
    derived: Option<DerivedView>,
    defaults_error: Option<ClientError>,
}

impl Session {
    /// Start a session with nothing selected or loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected zone
    pub fn zone(&self) -> Option<Zone> {
        self.selection.current()
    }

    /// The dataset store
    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// The scenario controller
    pub fn controller(&self) -> &ScenarioController {
        &self.controller
    }

    /// The scenario form
    pub fn form(&self) -> &ScenarioForm {
        self.controller.form()
    }

    /// The prediction lifecycle state
    pub fn state(&self) -> ScenarioState {
        self.controller.state()
    }

    /// The error from the last defaults fetch for the selected zone, if it failed
    pub fn defaults_error(&self) -> Option<&ClientError> {
        self.defaults_error.as_ref()
    }

    /// Refresh the dataset, superseding any refresh in flight
    pub fn refresh_dataset(&mut self) -> Request {
        self.network = None;
        self.derived = None;
        Request::Dataset(self.store.begin_refresh())
    }

    /// Select a zone.
    ///
    /// Invalidates everything tied to the previous zone and seeds a fresh form. Returns a request
    /// if the zone's defaults have to be fetched.
    pub fn select_zone(&mut self, zone: Zone) -> Option<Request> {
        let change = self.selection.select(zone)?;
        if let Some(previous) = change.previous {
            self.defaults.invalidate(previous);
        }
        self.derived = None;
        self.defaults_error = None;
        self.controller.select_zone(zone);

        match self.defaults.load_defaults(zone) {
            DefaultsLookup::Cached(defaults) => {
                self.controller.apply_defaults(&defaults);
                None
            }
            DefaultsLookup::InFlight => None,
            DefaultsLookup::Fetch(ticket) => Some(Request::Defaults(ticket)),
        }
    }

    /// Edit a scenario field
    pub fn edit(&mut self, field: ScenarioField, value: impl Into<String>) {
        self.controller.edit(field, value);
    }

    /// Submit the scenario for prediction
    pub fn submit(&mut self) -> Result<Request, SubmitError> {
        self.controller.submit().map(Request::Prediction)
    }

    /// Apply the outcome of a request.
    ///
    /// # Returns
    ///
    /// `true` if the outcome was applied, `false` if it was stale and discarded
    pub fn complete(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Dataset(ticket, result) => {
                self.network = None;
                self.derived = None;
                self.store.complete_refresh(ticket, result)
            }
            Completion::Defaults(ticket, result) => match self.defaults.complete(ticket, result) {
                Some(Ok(defaults)) => {
                    self.controller.apply_defaults(&defaults);
                    true
                }
                Some(Err(err)) => {
                    warn!("Could not load defaults for {}: {err}", ticket.zone);
                    self.defaults_error = Some(err);
                    true
                }
                None => false,
            },
            Completion::Prediction(ticket, result) => self.controller.complete(&ticket, result),
        }
    }

    /// Derived metrics for the selected zone, or for the whole network if no zone is selected.
    ///
    /// Views are recomputed if the zone or dataset has changed. A failed dataset fetch is reported
    /// whether or not a zone is selected.
    pub fn analytics(&mut self) -> Analytics<'_> {
        let dataset = match self.store.state() {
            DatasetState::Empty => return Analytics::Loading,
            DatasetState::Unavailable(err) => return Analytics::Unavailable(err),
            DatasetState::Loaded(dataset) => dataset,
        };
        let generation = self.store.generation();

        let Some(zone) = self.selection.current() else {
            let network = match self.network.take() {
                Some(view) if view.is_current(generation) => view,
                _ => {
                    debug!("Computing network view");
                    NetworkView::compute(dataset, generation)
                }
            };
            return Analytics::Network(self.network.insert(network));
        };

        let derived = match self.derived.take() {
            Some(view) if view.is_current(zone, generation) => view,
            _ => {
                debug!("Computing derived view for {zone}");
                DerivedView::compute(dataset, zone, generation)
            }
        };

        Analytics::Ready(self.derived.insert(derived))
    }
}

/// Drives a [`Session`] against a real backend.
///
/// Each request runs on its own worker thread so the owning thread is never blocked by the
/// network. Completions are queued on a channel and applied, one at a time, by [`Runtime::poll`] or
/// [`Runtime::settle`].
pub struct Runtime {
    session: Session,
    backend: Arc<dyn Backend>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    outstanding: usize,
}

impl Runtime {
    /// Create a runtime with a fresh session
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            session: Session::new(),
            backend,
            sender,
            receiver,
            outstanding: 0,
        }
    }

    /// The session being driven
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the session, e.g. for [`Session::analytics`]
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Number of requests whose completions have not yet been applied
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Run a request on a worker thread
    fn dispatch(&mut self, request: Request) {
        self.outstanding += 1;
        let backend = Arc::clone(&self.backend);
        let sender = self.sender.clone();
        debug!("Dispatching request to {}", request.endpoint());

        thread::spawn(move || {
            let fallback = request.clone();
            let completion = panic::catch_unwind(AssertUnwindSafe(|| {
                request.execute(backend.as_ref())
            }))
            .unwrap_or_else(|_| {
                let endpoint = fallback.endpoint().to_string();
                fallback.fail(ClientError::Transport {
                    endpoint,
                    message: "backend call panicked".into(),
                })
            });

            // The receiver only goes away when the runtime is dropped
            let _ = sender.send(completion);
        });
    }

    /// Refresh the dataset
    pub fn refresh_dataset(&mut self) {
        let request = self.session.refresh_dataset();
        self.dispatch(request);
    }

    /// Select a zone, fetching its defaults if needed
    pub fn select_zone(&mut self, zone: Zone) {
        if let Some(request) = self.session.select_zone(zone) {
            self.dispatch(request);
        }
    }

    /// Edit a scenario field
    pub fn edit(&mut self, field: ScenarioField, value: impl Into<String>) {
        self.session.edit(field, value);
    }

    /// Submit the scenario for prediction
    pub fn submit(&mut self) -> Result<(), SubmitError> {
        let request = self.session.submit()?;
        self.dispatch(request);
        Ok(())
    }

    fn apply(&mut self, completion: Completion) {
        self.outstanding -= 1;
        self.session.complete(completion);
    }

    /// Apply any completions that have already arrived, without blocking
    ///
    /// # Returns
    ///
    /// The number of completions applied
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            self.apply(completion);
            applied += 1;
        }

        applied
    }

    /// Block until every outstanding request has completed and been applied
    pub fn settle(&mut self) {
        while self.outstanding > 0 {
            match self.receiver.recv() {
                Ok(completion) => self.apply(completion),
                // Unreachable while we hold a sender
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{dataset, north_defaults, prediction_result, south_defaults};
    use rstest::rstest;

    fn defaults_ticket(request: Option<Request>) -> DefaultsTicket {
        match request {
            Some(Request::Defaults(ticket)) => ticket,
            other => panic!("Expected defaults request, got {other:?}"),
        }
    }

    #[rstest]
    fn test_latest_zone_wins(north_defaults: ScenarioDefaults, south_defaults: ScenarioDefaults) {
        let mut session = Session::new();
        let north = defaults_ticket(session.select_zone(Zone::North));
        let south = defaults_ticket(session.select_zone(Zone::South));

        // South answers quickly, North slowly
        assert!(session.complete(Completion::Defaults(south, Ok(south_defaults.clone()))));
        assert!(!session.complete(Completion::Defaults(north, Ok(north_defaults))));

        let mut expected = ScenarioForm::new(Some(Zone::South));
        expected.apply_defaults(&south_defaults);
        assert_eq!(session.form(), &expected);
    }

    #[rstest]
    fn test_cached_defaults_applied_synchronously(north_defaults: ScenarioDefaults) {
        let mut session = Session::new();
        let north = defaults_ticket(session.select_zone(Zone::North));
        session.complete(Completion::Defaults(north, Ok(north_defaults)));
        defaults_ticket(session.select_zone(Zone::East));

        // North's defaults are cached, so no request is needed
        assert_eq!(session.select_zone(Zone::North), None);
        assert_eq!(session.form().get(ScenarioField::Population), "120000");
    }

    #[test]
    fn test_reselect_same_zone_is_noop() {
        let mut session = Session::new();
        defaults_ticket(session.select_zone(Zone::West));
        session.edit(ScenarioField::RainfallMm, "12");
        assert_eq!(session.select_zone(Zone::West), None);
        assert_eq!(session.form().get(ScenarioField::RainfallMm), "12");
    }

    #[test]
    fn test_defaults_failure_leaves_form_editable() {
        let mut session = Session::new();
        let ticket = defaults_ticket(session.select_zone(Zone::Central));
        let err = ClientError::Transport {
            endpoint: "/api/defaults".into(),
            message: "connection refused".into(),
        };
        assert!(session.complete(Completion::Defaults(ticket, Err(err.clone()))));
        assert_eq!(session.defaults_error(), Some(&err));
        assert_eq!(session.state(), ScenarioState::Ready);

        session.edit(ScenarioField::Population, "5000");
        assert!(session.submit().is_ok());
    }

    #[rstest]
    fn test_prediction_dropped_after_zone_change(prediction_result: PredictionResult) {
        let mut session = Session::new();
        session.select_zone(Zone::North);
        let Ok(Request::Prediction(ticket)) = session.submit() else {
            panic!("Expected prediction request");
        };

        session.select_zone(Zone::South);
        assert!(!session.complete(Completion::Prediction(ticket, Ok(prediction_result))));
        assert_eq!(session.state(), ScenarioState::Ready);
        assert!(session.controller().result().is_none());
    }

    #[rstest]
    fn test_analytics(dataset: Dataset) {
        let mut session = Session::new();
        assert_eq!(session.analytics(), Analytics::Loading);

        let Request::Dataset(ticket) = session.refresh_dataset() else {
            panic!("Expected dataset request");
        };
        assert_eq!(session.analytics(), Analytics::Loading);

        session.complete(Completion::Dataset(ticket, Ok(dataset)));
        let Analytics::Network(network) = session.analytics() else {
            panic!("Expected network analytics");
        };
        assert_eq!(network.current_week_supply, Some(245.0));

        session.select_zone(Zone::North);
        let Analytics::Ready(view) = session.analytics() else {
            panic!("Expected analytics");
        };
        assert_eq!(view.zone, Zone::North);
        assert_eq!(view.zone_weekly.len(), 2);

        // Changing zone recomputes the view
        session.select_zone(Zone::South);
        let Analytics::Ready(view) = session.analytics() else {
            panic!("Expected analytics");
        };
        assert_eq!(view.zone, Zone::South);
    }

    #[rstest]
    #[case(Some(Zone::East))]
    #[case(None)]
    fn test_analytics_unavailable(#[case] zone: Option<Zone>) {
        let mut session = Session::new();
        if let Some(zone) = zone {
            session.select_zone(zone);
        }
        let Request::Dataset(ticket) = session.refresh_dataset() else {
            panic!("Expected dataset request");
        };
        let err = ClientError::Transport {
            endpoint: "/api/dashboard".into(),
            message: "connection refused".into(),
        };
        session.complete(Completion::Dataset(ticket, Err(err.clone())));
        assert_eq!(session.analytics(), Analytics::Unavailable(&err));
    }
}
