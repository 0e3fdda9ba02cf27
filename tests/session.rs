//! Integration tests for driving a session against a backend on worker threads.
use aquasmart::client::{Backend, ClientError};
use aquasmart::controller::{ScenarioState, SubmitError};
use aquasmart::dataset::Dataset;
use aquasmart::prediction::PredictionResult;
use aquasmart::scenario::{ScenarioDefaults, ScenarioField, ScenarioInput, ValidationError};
use aquasmart::session::{Analytics, Runtime};
use aquasmart::units::Mld;
use aquasmart::zone::Zone;
use fake_backend::FakeBackend;
use float_cmp::assert_approx_eq;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// A backend which panics on every call
struct PanickingBackend;

impl Backend for PanickingBackend {
    fn fetch_dataset(&self) -> Result<Dataset, ClientError> {
        panic!("dataset exploded")
    }

    fn fetch_defaults(&self, _zone: Zone) -> Result<ScenarioDefaults, ClientError> {
        panic!("defaults exploded")
    }

    fn predict(&self, _input: &ScenarioInput) -> Result<PredictionResult, ClientError> {
        panic!("prediction exploded")
    }
}

/// A slow response for a zone the operator has moved away from must not overwrite the form
#[test]
fn test_latest_zone_wins() {
    let backend = FakeBackend::with_delay(Zone::North, Duration::from_millis(200));
    let mut runtime = Runtime::new(Arc::new(backend));

    runtime.select_zone(Zone::North);
    runtime.select_zone(Zone::South);
    runtime.settle();

    let session = runtime.session();
    assert_eq!(session.zone(), Some(Zone::South));
    assert_eq!(session.form().zone(), Some(Zone::South));
    assert_eq!(session.form().get(ScenarioField::Population), "95000");
    assert_eq!(session.form().get(ScenarioField::PriorityLevel), "Medium");
    assert_eq!(session.form().get(ScenarioField::Season), "SW_Monsoon");
    assert_eq!(session.state(), ScenarioState::Ready);
}

#[test]
fn test_poll_does_not_block() {
    let backend = FakeBackend::with_delay(Zone::North, Duration::from_millis(300));
    let mut runtime = Runtime::new(Arc::new(backend));

    runtime.select_zone(Zone::North);
    assert_eq!(runtime.poll(), 0);
    assert_eq!(runtime.outstanding(), 1);

    // The form stays editable while the defaults are on their way
    runtime.edit(ScenarioField::RainfallMm, "12");

    runtime.settle();
    assert_eq!(runtime.outstanding(), 0);
    let form = runtime.session().form();
    assert_eq!(form.get(ScenarioField::RainfallMm), "12");
    assert_eq!(form.get(ScenarioField::Population), "120000");
}

#[test]
fn test_predict_after_defaults() {
    let mut runtime = Runtime::new(Arc::new(FakeBackend::default()));
    runtime.select_zone(Zone::North);
    runtime.settle();

    runtime.edit(ScenarioField::IndDemand, "11");
    runtime.submit().unwrap();
    assert_eq!(runtime.session().state(), ScenarioState::Submitting);
    assert_eq!(runtime.submit(), Err(SubmitError::AlreadySubmitting));

    runtime.settle();
    let controller = runtime.session().controller();
    assert_eq!(controller.state(), ScenarioState::Succeeded);
    let result = controller.result().unwrap();
    assert_eq!(result.zone, Some(Zone::North));
    assert_approx_eq!(Mld, result.total_supply(), Mld(30.0), epsilon = 1e-9);
}

#[test]
fn test_resubmit_after_failure() {
    let backend = Arc::new(FakeBackend::failing_predictions(1));
    let mut runtime = Runtime::new(backend.clone());
    runtime.select_zone(Zone::North);
    runtime.settle();
    runtime.edit(ScenarioField::Population, "130000");

    runtime.submit().unwrap();
    runtime.settle();
    assert_eq!(runtime.session().state(), ScenarioState::Failed);
    assert_eq!(
        runtime.session().controller().last_error(),
        Some(&FakeBackend::unavailable())
    );
    assert_eq!(
        runtime.session().form().get(ScenarioField::Population),
        "130000"
    );

    // No re-entry needed
    runtime.submit().unwrap();
    runtime.settle();
    assert_eq!(runtime.session().state(), ScenarioState::Succeeded);
    assert_eq!(backend.predict_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalid_scenario_not_sent() {
    let backend = Arc::new(FakeBackend::default());
    let mut runtime = Runtime::new(backend.clone());
    runtime.select_zone(Zone::South);
    runtime.settle();

    runtime.edit(ScenarioField::ComDemand, "-4");
    assert!(matches!(
        runtime.submit(),
        Err(SubmitError::Validation(ValidationError::InvalidField {
            field: ScenarioField::ComDemand,
            ..
        }))
    ));
    assert_eq!(runtime.outstanding(), 0);
    assert_eq!(backend.predict_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_missing_defaults_leave_form_usable() {
    let mut runtime = Runtime::new(Arc::new(FakeBackend::default()));
    runtime.select_zone(Zone::Central);
    runtime.settle();

    assert!(runtime.session().defaults_error().is_some());
    assert_eq!(runtime.session().form().get(ScenarioField::Population), "0");
    runtime.submit().unwrap();
    runtime.settle();
    assert_eq!(runtime.session().state(), ScenarioState::Succeeded);
}

#[test]
fn test_analytics_after_refresh() {
    let mut runtime = Runtime::new(Arc::new(FakeBackend::default()));
    runtime.select_zone(Zone::North);
    runtime.refresh_dataset();
    runtime.settle();

    let Analytics::Ready(view) = runtime.session_mut().analytics() else {
        panic!("Expected analytics");
    };
    assert_eq!(view.zone, Zone::North);
    assert_eq!(view.zone_weekly.len(), 2);
    assert_eq!(view.network.current_week_supply, Some(245.0));
    assert_eq!(
        view.network.dominant_status.as_ref().map(|s| s.system_status.as_str()),
        Some("Normal")
    );
}

#[test]
fn test_analytics_malformed_dataset() {
    let backend = FakeBackend {
        dataset: Ok(r#"{"weekly_trend": [{"week_start": "2024-01-01"}]}"#.to_string()),
        ..FakeBackend::default()
    };
    let mut runtime = Runtime::new(Arc::new(backend));
    runtime.select_zone(Zone::East);
    runtime.refresh_dataset();
    runtime.settle();

    let Analytics::Unavailable(err) = runtime.session_mut().analytics() else {
        panic!("Expected dataset to be unavailable");
    };
    assert!(err.is_schema());
}

#[test]
fn test_panicking_backend_reported_as_error() {
    let mut runtime = Runtime::new(Arc::new(PanickingBackend));
    runtime.select_zone(Zone::West);
    runtime.settle();
    assert!(runtime.session().defaults_error().is_some());

    runtime.submit().unwrap();
    runtime.settle();
    assert_eq!(runtime.session().state(), ScenarioState::Failed);
    assert!(matches!(
        runtime.session().controller().last_error(),
        Some(ClientError::Transport { .. })
    ));
}
