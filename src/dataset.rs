//! The analytics dataset fetched from the backend and the store holding the latest snapshot.
//!
//! A [`Dataset`] is a set of parallel record collections describing the whole network. Time-series
//! records are keyed by `week_start` and per-zone records by `zone`. Zone names are kept exactly as
//! the backend sent them; they are only ever compared case-insensitively against a [`Zone`].
use crate::client::ClientError;
use crate::zone::Zone;
use anyhow::{Context, Result, ensure};
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A record that belongs to a week of a time series
pub trait TimeSeriesRecord {
    /// The first day of the week this record describes
    fn week_start(&self) -> NaiveDate;
}

/// A record that belongs to a single zone
pub trait ZoneRecord {
    /// The zone name exactly as it appears in the dataset
    fn zone_name(&self) -> &str;

    /// Whether this record belongs to `zone`
    fn is_for(&self, zone: Zone) -> bool {
        zone.matches(self.zone_name())
    }
}

macro_rules! impl_time_series_record {
    ($t:ty) => {
        impl TimeSeriesRecord for $t {
            fn week_start(&self) -> NaiveDate {
                self.week_start
            }
        }
    };
}

macro_rules! impl_zone_record {
    ($t:ty) => {
        impl ZoneRecord for $t {
            fn zone_name(&self) -> &str {
                &self.zone
            }
        }
    };
}

/// Total network supply for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySupply {
    /// First day of the week
    pub week_start: NaiveDate,
    /// Total supply across all sources (MLD)
    pub total_supply_mld: f64,
}
impl_time_series_record!(WeeklySupply);

/// Average demand for a zone over the whole dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDemand {
    /// Zone name
    pub zone: String,
    /// Total demand (MLD)
    pub total_demand_mld: f64,
}
impl_zone_record!(ZoneDemand);

/// Average supply for a season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSupply {
    /// Season name (e.g. "SW_Monsoon")
    pub season: String,
    /// Total supply (MLD)
    pub total_supply_mld: f64,
}

/// Supply drawn from each source for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMix {
    /// First day of the week
    pub week_start: NaiveDate,
    /// Supply from the Siruvani reservoir (MLD)
    pub siruvani_supply_mld: f64,
    /// Supply from the Pilloor scheme (MLD)
    pub pilloor_supply_mld: f64,
    /// Supply from groundwater (MLD)
    pub groundwater_supply_mld: f64,
}
impl_time_series_record!(SourceMix);

/// Reservoir storage levels for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageLevel {
    /// First day of the week
    pub week_start: NaiveDate,
    /// Siruvani storage as a percentage of capacity
    pub siruvani_storage_pct: f64,
    /// Pilloor storage as a percentage of capacity
    pub pilloor_storage_pct: f64,
}
impl_time_series_record!(StorageLevel);

/// Average daily supply hours for a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReliability {
    /// Zone name
    pub zone: String,
    /// Hours of supply per day
    pub supply_hours_per_day: f64,
}
impl_zone_record!(ZoneReliability);

/// Demand and reliability for one zone in one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneWeeklyMetric {
    /// First day of the week
    pub week_start: NaiveDate,
    /// Zone name
    pub zone: String,
    /// Total demand (MLD)
    pub total_demand_mld: f64,
    /// Hours of supply per day
    pub supply_hours_per_day: f64,
}
impl_time_series_record!(ZoneWeeklyMetric);
impl_zone_record!(ZoneWeeklyMetric);

/// Composition of a zone's demand by consumer category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDemandMix {
    /// Zone name
    pub zone: String,
    /// Residential demand (MLD)
    pub residential_demand_mld: f64,
    /// Commercial demand (MLD)
    pub commercial_demand_mld: f64,
    /// Industrial demand (MLD)
    pub industrial_demand_mld: f64,
}
impl_zone_record!(ZoneDemandMix);

/// One sample from a what-if scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEfficiency {
    /// Identifier of the scenario (e.g. "S1")
    pub scenario_id: String,
    /// Week of the year, starting at 1
    pub week: u32,
    /// Percentage of demand met by the allocation
    pub allocation_efficiency_percent: f64,
    /// Shortfall between demand and supply (MLD)
    pub supply_demand_gap_mld: f64,
}

impl ScenarioEfficiency {
    /// The first day of the sample's week.
    ///
    /// Scenario runs cover 2024 and number weeks from 1, so week `n` starts `7 * (n - 1)` days
    /// after 1 January 2024. Returns `None` for week 0.
    pub fn week_start(&self) -> Option<NaiveDate> {
        let offset = self.week.checked_sub(1)?;
        NaiveDate::from_ymd_opt(2024, 1, 1)?.checked_add_days(Days::new(u64::from(offset) * 7))
    }
}

/// Number of weeks the network spent in a given status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    /// Status label (e.g. "Stressed")
    pub system_status: String,
    /// Number of weeks
    pub count: u64,
}

/// Total population served for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationPoint {
    /// First day of the week
    pub week_start: NaiveDate,
    /// Population across all zones
    pub population: f64,
}
impl_time_series_record!(PopulationPoint);

/// A snapshot of the analytics dataset for the whole network.
///
/// Collections missing from a response are treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Supply for the latest week, if the backend reported it
    #[serde(default)]
    pub current_week_supply: Option<f64>,
    /// Weekly network supply
    #[serde(default)]
    pub weekly_trend: Vec<WeeklySupply>,
    /// Average demand per zone
    #[serde(default)]
    pub zone_distribution: Vec<ZoneDemand>,
    /// Average supply per season
    #[serde(default)]
    pub season_supply: Vec<SeasonSupply>,
    /// Weekly supply per source
    #[serde(default)]
    pub source_mix: Vec<SourceMix>,
    /// Weekly reservoir storage
    #[serde(default)]
    pub storage_trend: Vec<StorageLevel>,
    /// Average supply hours per zone
    #[serde(default)]
    pub zone_reliability: Vec<ZoneReliability>,
    /// Weekly demand and supply hours per zone
    #[serde(default)]
    pub zone_weekly_metrics: Vec<ZoneWeeklyMetric>,
    /// Demand composition per zone
    #[serde(default)]
    pub zone_demand_mix: Vec<ZoneDemandMix>,
    /// Samples from what-if scenario runs
    #[serde(default)]
    pub scenario_efficiency: Vec<ScenarioEfficiency>,
    /// Weeks spent in each network status
    #[serde(default)]
    pub status_summary: Vec<StatusCount>,
    /// Weekly population served
    #[serde(default)]
    pub population_trend: Vec<PopulationPoint>,
}

/// Check that every record in a per-zone collection names a known zone
fn check_zones<T: ZoneRecord>(collection: &str, records: &[T]) -> Result<()> {
    for (idx, record) in records.iter().enumerate() {
        ensure!(
            Zone::lookup(record.zone_name()).is_some(),
            "{collection}[{idx}]: unknown zone '{}'",
            record.zone_name()
        );
    }

    Ok(())
}

impl Dataset {
    /// Check invariants that cannot be expressed in the record types alone.
    ///
    /// Every per-zone record must name a zone from the registry and every scenario sample must
    /// have a week number from which a `week_start` can be derived.
    pub fn validate(&self) -> Result<()> {
        check_zones("zone_distribution", &self.zone_distribution)?;
        check_zones("zone_reliability", &self.zone_reliability)?;
        check_zones("zone_weekly_metrics", &self.zone_weekly_metrics)?;
        check_zones("zone_demand_mix", &self.zone_demand_mix)?;

        for (idx, sample) in self.scenario_efficiency.iter().enumerate() {
            sample.week_start().with_context(|| {
                format!(
                    "scenario_efficiency[{idx}]: invalid week number {}",
                    sample.week
                )
            })?;
        }

        Ok(())
    }
}

/// Identifies one dataset refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
}

/// What the store currently holds
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetState {
    /// Nothing has been fetched yet
    Empty,
    /// The latest successful fetch
    Loaded(Dataset),
    /// The latest fetch failed, so no analytics are available
    Unavailable(ClientError),
}

/// Holds the most recently fetched dataset.
///
/// Each refresh is tagged with a generation and only the response to the latest refresh is
/// applied. Responses to superseded refreshes are dropped.
#[derive(Debug)]
pub struct DatasetStore {
    state: DatasetState,
    /// Generation of the latest refresh issued
    latest: u64,
    /// Generation of the refresh that produced `state`
    applied: u64,
}

impl Default for DatasetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            state: DatasetState::Empty,
            latest: 0,
            applied: 0,
        }
    }

    /// The current state of the store
    pub fn state(&self) -> &DatasetState {
        &self.state
    }

    /// The current snapshot, if one has been loaded successfully
    pub fn snapshot(&self) -> Option<&Dataset> {
        match &self.state {
            DatasetState::Loaded(dataset) => Some(dataset),
            _ => None,
        }
    }

    /// The generation of the refresh which produced the current state
    pub fn generation(&self) -> u64 {
        self.applied
    }

    /// Whether a refresh has been issued but not yet completed
    pub fn is_refreshing(&self) -> bool {
        self.latest != self.applied
    }

    /// Start a refresh, superseding any refresh already in flight
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.latest += 1;
        debug!("Dataset refresh {} issued", self.latest);
        RefreshTicket {
            generation: self.latest,
        }
    }

    /// Apply the outcome of a refresh.
    ///
    /// # Returns
    ///
    /// `true` if the outcome was applied, `false` if it belonged to a superseded refresh
    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Dataset, ClientError>,
    ) -> bool {
        if ticket.generation != self.latest {
            debug!(
                "Dropping response to dataset refresh {} (latest is {})",
                ticket.generation, self.latest
            );
            return false;
        }

        self.applied = ticket.generation;
        self.state = match result {
            Ok(dataset) => {
                info!(
                    "Loaded dataset with {} weeks of supply data",
                    dataset.weekly_trend.len()
                );
                DatasetState::Loaded(dataset)
            }
            Err(err) => {
                warn!("No analytics available: {err}");
                DatasetState::Unavailable(err)
            }
        };

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, dataset};
    use rstest::rstest;

    fn transport_error() -> ClientError {
        ClientError::Transport {
            endpoint: "/api/dashboard".into(),
            message: "connection refused".into(),
        }
    }

    #[rstest]
    #[case(1, Some("2024-01-01"))]
    #[case(2, Some("2024-01-08"))]
    #[case(52, Some("2024-12-23"))]
    #[case(0, None)]
    fn test_scenario_week_start(#[case] week: u32, #[case] expected: Option<&str>) {
        let sample = ScenarioEfficiency {
            scenario_id: "S1".into(),
            week,
            allocation_efficiency_percent: 90.0,
            supply_demand_gap_mld: 1.0,
        };
        let expected = expected.map(|s| s.parse::<NaiveDate>().unwrap());
        assert_eq!(sample.week_start(), expected);
    }

    #[rstest]
    fn test_validate_ok(dataset: Dataset) {
        assert!(dataset.validate().is_ok());
    }

    #[rstest]
    fn test_validate_unknown_zone(mut dataset: Dataset) {
        dataset.zone_demand_mix[1].zone = "Harbour".into();
        assert_error!(
            dataset.validate(),
            "zone_demand_mix[1]: unknown zone 'Harbour'"
        );
    }

    #[rstest]
    fn test_validate_bad_week(mut dataset: Dataset) {
        dataset.scenario_efficiency[0].week = 0;
        assert_error!(
            dataset.validate(),
            "scenario_efficiency[0]: invalid week number 0"
        );
    }

    #[test]
    fn test_missing_collections_are_empty() {
        let dataset: Dataset = serde_json::from_str("{}").unwrap();
        assert_eq!(dataset, Dataset::default());
    }

    #[rstest]
    fn test_store_applies_latest(dataset: Dataset) {
        let mut store = DatasetStore::new();
        assert_eq!(store.state(), &DatasetState::Empty);

        let ticket = store.begin_refresh();
        assert!(store.is_refreshing());
        assert!(store.complete_refresh(ticket, Ok(dataset.clone())));
        assert!(!store.is_refreshing());
        assert_eq!(store.snapshot(), Some(&dataset));
        assert_eq!(store.generation(), 1);
    }

    #[rstest]
    fn test_store_drops_superseded_refresh(dataset: Dataset) {
        let mut store = DatasetStore::new();
        let first = store.begin_refresh();
        let second = store.begin_refresh();

        assert!(store.complete_refresh(second, Ok(dataset.clone())));

        // A late failure from the first refresh must not clobber the newer snapshot
        assert!(!store.complete_refresh(first, Err(transport_error())));
        assert_eq!(store.snapshot(), Some(&dataset));
    }

    #[rstest]
    fn test_store_failure_is_unavailable(dataset: Dataset) {
        let mut store = DatasetStore::new();
        let ticket = store.begin_refresh();
        store.complete_refresh(ticket, Ok(dataset));

        let ticket = store.begin_refresh();
        assert!(store.complete_refresh(ticket, Err(transport_error())));
        assert!(store.snapshot().is_none());
        match store.state() {
            DatasetState::Unavailable(err) => assert_eq!(err.endpoint(), "/api/dashboard"),
            state => panic!("Unexpected state: {state:?}"),
        }
    }
}
