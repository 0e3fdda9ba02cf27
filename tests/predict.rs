//! Integration tests for the `predict` and `dashboard` commands.
use aquasmart::cli::{Dashboard, load_dashboard, predict_scenario};
use aquasmart::client::ClientError;
use aquasmart::scenario::ScenarioField;
use aquasmart::units::Mld;
use aquasmart::zone::Zone;
use fake_backend::FakeBackend;
use float_cmp::assert_approx_eq;
use std::sync::Arc;

#[test]
fn test_predict_scenario() {
    let assignments = [
        (ScenarioField::ResDemand, "20".to_string()),
        (ScenarioField::FestivalWeek, "yes".to_string()),
    ];
    let result =
        predict_scenario(Arc::new(FakeBackend::default()), Zone::North, &assignments).unwrap();

    // North's defaults plus the override: 20 + 4.5 + 2.0
    assert_eq!(result.zone, Some(Zone::North));
    assert_approx_eq!(Mld, result.total_supply(), Mld(26.5), epsilon = 1e-9);
}

#[test]
fn test_predict_scenario_invalid() {
    let assignments = [(ScenarioField::Population, "many".to_string())];
    let err =
        predict_scenario(Arc::new(FakeBackend::default()), Zone::South, &assignments).unwrap_err();
    assert_eq!(err.to_string(), "Invalid scenario.");
}

#[test]
fn test_predict_scenario_failed() {
    let err = predict_scenario(
        Arc::new(FakeBackend::failing_predictions(1)),
        Zone::North,
        &[],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Prediction failed.");
    assert_eq!(
        err.downcast_ref::<ClientError>(),
        Some(&FakeBackend::unavailable())
    );
}

#[test]
fn test_load_dashboard() {
    let backend = Arc::new(FakeBackend::default());
    let Dashboard::Network(network) = load_dashboard(backend.clone(), None).unwrap() else {
        panic!("Expected network metrics without a zone");
    };
    assert_eq!(network.current_week_supply, Some(245.0));
    assert_eq!(network.scenario_weeks.len(), 1);
    assert_eq!(
        network.scenario_weeks[0].week_start,
        "2024-01-15".parse::<chrono::NaiveDate>().unwrap()
    );

    let Dashboard::Zone(view) = load_dashboard(backend, Some(Zone::North)).unwrap() else {
        panic!("Expected zone metrics");
    };
    assert_approx_eq!(f64, view.zone_average_demand.unwrap(), 12.5);
    assert!(view.zone_demand_mix.is_some());
    assert_eq!(view.network, network);
}

fn unreachable_backend() -> FakeBackend {
    FakeBackend {
        dataset: Err(ClientError::Transport {
            endpoint: "/api/dashboard".to_string(),
            message: "connection refused".to_string(),
        }),
        ..FakeBackend::default()
    }
}

#[test]
fn test_load_dashboard_unavailable() {
    let err = load_dashboard(Arc::new(unreachable_backend()), Some(Zone::East)).unwrap_err();
    assert_eq!(err.to_string(), "Dashboard data is unavailable.");
}

#[test]
fn test_load_dashboard_unavailable_without_zone() {
    let err = load_dashboard(Arc::new(unreachable_backend()), None).unwrap_err();
    assert_eq!(err.to_string(), "Dashboard data is unavailable.");
    assert_eq!(
        err.downcast_ref::<ClientError>().map(ClientError::endpoint),
        Some("/api/dashboard")
    );
}
