//! Derived metrics computed from a dataset snapshot.
//!
//! Everything here is a pure function of its inputs. An empty input never produces a zero: "no
//! data" is always reported as `None` so that callers can tell it apart from a genuine zero.
use crate::dataset::{
    Dataset, PopulationPoint, ScenarioEfficiency, SeasonSupply, SourceMix, StatusCount,
    StorageLevel, TimeSeriesRecord, WeeklySupply, ZoneDemand, ZoneDemandMix, ZoneRecord,
    ZoneReliability, ZoneWeeklyMetric,
};
use crate::units::Mld;
use crate::zone::Zone;
use chrono::NaiveDate;
use itertools::Itertools;

/// A record with a primary numeric field, used when averaging a series
pub trait Measured {
    /// The value of the record's primary numeric field
    fn primary_value(&self) -> f64;
}

macro_rules! impl_measured {
    ($t:ty, $field:ident) => {
        impl Measured for $t {
            fn primary_value(&self) -> f64 {
                self.$field
            }
        }
    };
}

impl_measured!(WeeklySupply, total_supply_mld);
impl_measured!(ZoneDemand, total_demand_mld);
impl_measured!(SeasonSupply, total_supply_mld);
impl_measured!(ZoneReliability, supply_hours_per_day);
impl_measured!(ZoneWeeklyMetric, total_demand_mld);
impl_measured!(ScenarioEfficiency, allocation_efficiency_percent);
impl_measured!(PopulationPoint, population);

/// A record together with the mean of the series it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Averaged<T> {
    /// The original record
    pub record: T,
    /// Mean of the primary field over the whole series
    pub rolling_avg: f64,
}

/// The arithmetic mean of a series' primary field, or `None` if the series is empty
#[allow(clippy::cast_precision_loss)]
pub fn mean<'a, T, I>(series: I) -> Option<f64>
where
    T: Measured + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let (count, sum) = series
        .into_iter()
        .fold((0usize, 0.0), |(count, sum), record| {
            (count + 1, sum + record.primary_value())
        });

    (count > 0).then(|| sum / count as f64)
}

/// Augment each record of a series with the series mean.
///
/// Returns `None` for an empty series, as there is no mean to report.
pub fn rolling_average<T: Measured + Clone>(series: &[T]) -> Option<Vec<Averaged<T>>> {
    let avg = mean(series)?;
    Some(
        series
            .iter()
            .map(|record| Averaged {
                record: record.clone(),
                rolling_avg: avg,
            })
            .collect(),
    )
}

/// The records belonging to `zone`, in their original order
pub fn filter_by_zone<T: ZoneRecord>(series: &[T], zone: Zone) -> Vec<&T> {
    series.iter().filter(|record| record.is_for(zone)).collect()
}

/// The first record belonging to `zone`, if any
pub fn find_zone_record<T: ZoneRecord>(series: &[T], zone: Zone) -> Option<&T> {
    series.iter().find(|record| record.is_for(zone))
}

/// The demand mix for `zone`, or `None` if the dataset has no entry for it
pub fn zone_demand_mix(series: &[ZoneDemandMix], zone: Zone) -> Option<&ZoneDemandMix> {
    find_zone_record(series, zone)
}

/// Mean weekly demand for `zone`, or `None` if the zone has no weekly records
pub fn zone_average_demand(series: &[ZoneWeeklyMetric], zone: Zone) -> Option<f64> {
    mean(filter_by_zone(series, zone))
}

/// The series sorted by week. Records for the same week keep their original order.
pub fn in_week_order<T: TimeSeriesRecord + Clone>(series: &[T]) -> Vec<T> {
    series
        .iter()
        .cloned()
        .sorted_by_key(|record| record.week_start())
        .collect()
}

/// The record for the most recent week, or `None` for an empty series
pub fn latest_week<T: TimeSeriesRecord>(series: &[T]) -> Option<&T> {
    series.iter().max_by_key(|record| record.week_start())
}

/// Supply for the latest week.
///
/// Uses the figure reported by the backend, falling back to the latest week of the weekly trend.
pub fn current_week_supply(dataset: &Dataset) -> Option<f64> {
    dataset.current_week_supply.or_else(|| {
        latest_week(&dataset.weekly_trend).map(|week| week.total_supply_mld)
    })
}

/// A scenario sample placed on the calendar by its week number
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioWeek {
    /// First day of the sample's week
    pub week_start: NaiveDate,
    /// The sample itself
    pub sample: ScenarioEfficiency,
}

impl TimeSeriesRecord for ScenarioWeek {
    fn week_start(&self) -> NaiveDate {
        self.week_start
    }
}

impl Measured for ScenarioWeek {
    fn primary_value(&self) -> f64 {
        self.sample.allocation_efficiency_percent
    }
}

/// Scenario samples keyed by the start of their week, in week order.
///
/// Samples without a valid week number are skipped; [`Dataset::validate`] rejects them anyway.
pub fn scenario_weeks(series: &[ScenarioEfficiency]) -> Vec<ScenarioWeek> {
    let weeks: Vec<_> = series
        .iter()
        .filter_map(|sample| {
            Some(ScenarioWeek {
                week_start: sample.week_start()?,
                sample: sample.clone(),
            })
        })
        .collect();

    in_week_order(&weeks)
}

/// The status the network spent the most weeks in. Ties go to the first listed.
pub fn dominant_status(summary: &[StatusCount]) -> Option<&StatusCount> {
    summary.iter().reduce(|best, status| {
        if status.count > best.count {
            status
        } else {
            best
        }
    })
}

impl ZoneDemandMix {
    /// Sum of the residential, commercial and industrial components
    pub fn total_demand(&self) -> Mld {
        Mld(self.residential_demand_mld + self.commercial_demand_mld + self.industrial_demand_mld)
    }
}

/// Metrics for the whole network, derived from one dataset snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkView {
    /// The dataset generation the view was computed from
    pub generation: u64,
    /// Supply for the latest week
    pub current_week_supply: Option<f64>,
    /// Weekly network supply in week order with its mean, or `None` if there are no weeks
    pub weekly_supply: Option<Vec<Averaged<WeeklySupply>>>,
    /// Average demand per zone
    pub zone_distribution: Vec<ZoneDemand>,
    /// Mean of the per-zone average demand
    pub mean_zone_demand: Option<f64>,
    /// Average supply per season
    pub season_supply: Vec<SeasonSupply>,
    /// Supply per source for the latest week
    pub latest_source_mix: Option<SourceMix>,
    /// Reservoir storage for the latest week
    pub latest_storage: Option<StorageLevel>,
    /// Population served in the latest week
    pub latest_population: Option<PopulationPoint>,
    /// Scenario samples in week order
    pub scenario_weeks: Vec<ScenarioWeek>,
    /// Mean allocation efficiency over all scenario samples
    pub mean_scenario_efficiency: Option<f64>,
    /// Weeks spent in each network status
    pub status_summary: Vec<StatusCount>,
    /// Status the network spent most weeks in
    pub dominant_status: Option<StatusCount>,
}

impl NetworkView {
    /// Compute the network-wide metrics of `dataset`
    pub fn compute(dataset: &Dataset, generation: u64) -> Self {
        let scenario_weeks = scenario_weeks(&dataset.scenario_efficiency);
        Self {
            generation,
            current_week_supply: current_week_supply(dataset),
            weekly_supply: rolling_average(&in_week_order(&dataset.weekly_trend)),
            zone_distribution: dataset.zone_distribution.clone(),
            mean_zone_demand: mean(&dataset.zone_distribution),
            season_supply: dataset.season_supply.clone(),
            latest_source_mix: latest_week(&dataset.source_mix).cloned(),
            latest_storage: latest_week(&dataset.storage_trend).cloned(),
            latest_population: latest_week(&dataset.population_trend).cloned(),
            mean_scenario_efficiency: mean(&scenario_weeks),
            scenario_weeks,
            status_summary: dataset.status_summary.clone(),
            dominant_status: dominant_status(&dataset.status_summary).cloned(),
        }
    }

    /// Whether this view was computed from the given dataset generation
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

/// Metrics derived from one dataset snapshot for one zone.
///
/// A view is never updated in place; it is recomputed whenever the dataset or the zone changes.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    /// The zone the view was computed for
    pub zone: Zone,
    /// Network-wide metrics from the same snapshot
    pub network: NetworkView,
    /// Weekly metrics for the zone in time order
    pub zone_weekly: Vec<ZoneWeeklyMetric>,
    /// Demand composition for the zone
    pub zone_demand_mix: Option<ZoneDemandMix>,
    /// Mean weekly demand for the zone
    pub zone_average_demand: Option<f64>,
    /// Average supply hours for the zone
    pub zone_reliability: Option<ZoneReliability>,
}

impl DerivedView {
    /// Compute the view for `zone` from `dataset`
    pub fn compute(dataset: &Dataset, zone: Zone, generation: u64) -> Self {
        Self {
            zone,
            network: NetworkView::compute(dataset, generation),
            zone_weekly: filter_by_zone(&dataset.zone_weekly_metrics, zone)
                .into_iter()
                .cloned()
                .sorted_by_key(|record| record.week_start())
                .collect(),
            zone_demand_mix: zone_demand_mix(&dataset.zone_demand_mix, zone).cloned(),
            zone_average_demand: zone_average_demand(&dataset.zone_weekly_metrics, zone),
            zone_reliability: find_zone_record(&dataset.zone_reliability, zone).cloned(),
        }
    }

    /// Whether this view is still valid for the given zone and dataset generation
    pub fn is_current(&self, zone: Zone, generation: u64) -> bool {
        self.zone == zone && self.network.is_current(generation)
    }
}
