//! Fixtures for tests

use crate::allocation::ZoneRequirement;
use crate::dataset::{
    Dataset, PopulationPoint, ScenarioEfficiency, SeasonSupply, SourceMix, StatusCount,
    StorageLevel, WeeklySupply, ZoneDemand, ZoneDemandMix, ZoneReliability, ZoneWeeklyMetric,
};
use crate::prediction::{ModelScope, PredictionResult};
use crate::scenario::{PriorityLevel, ScenarioDefaults, Season};
use crate::units::Mld;
use crate::zone::Zone;
use chrono::NaiveDate;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

fn week(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn zone_weekly(week_start: &str, zone: &str, demand: f64, hours: f64) -> ZoneWeeklyMetric {
    ZoneWeeklyMetric {
        week_start: week(week_start),
        zone: zone.into(),
        total_demand_mld: demand,
        supply_hours_per_day: hours,
    }
}

fn demand_mix(zone: &str, residential: f64, commercial: f64, industrial: f64) -> ZoneDemandMix {
    ZoneDemandMix {
        zone: zone.into(),
        residential_demand_mld: residential,
        commercial_demand_mld: commercial,
        industrial_demand_mld: industrial,
    }
}

#[fixture]
pub fn dataset() -> Dataset {
    let weeks = ["2024-01-01", "2024-01-08", "2024-01-15"];
    Dataset {
        current_week_supply: Some(245.0),
        weekly_trend: weeks
            .iter()
            .zip([220.0, 230.0, 240.0])
            .map(|(week_start, supply)| WeeklySupply {
                week_start: week(week_start),
                total_supply_mld: supply,
            })
            .collect(),
        zone_distribution: vec![
            ZoneDemand {
                zone: "North".into(),
                total_demand_mld: 12.5,
            },
            ZoneDemand {
                zone: "South".into(),
                total_demand_mld: 9.0,
            },
        ],
        season_supply: vec![
            SeasonSupply {
                season: "Summer".into(),
                total_supply_mld: 210.0,
            },
            SeasonSupply {
                season: "SW_Monsoon".into(),
                total_supply_mld: 260.0,
            },
        ],
        source_mix: vec![SourceMix {
            week_start: week(weeks[0]),
            siruvani_supply_mld: 100.0,
            pilloor_supply_mld: 80.0,
            groundwater_supply_mld: 40.0,
        }],
        storage_trend: vec![StorageLevel {
            week_start: week(weeks[0]),
            siruvani_storage_pct: 64.0,
            pilloor_storage_pct: 58.5,
        }],
        zone_reliability: vec![
            ZoneReliability {
                zone: "North".into(),
                supply_hours_per_day: 4.5,
            },
            ZoneReliability {
                zone: "east".into(),
                supply_hours_per_day: 3.0,
            },
        ],
        zone_weekly_metrics: vec![
            zone_weekly(weeks[0], "North", 12.0, 4.0),
            zone_weekly(weeks[0], "SOUTH", 9.0, 3.5),
            zone_weekly(weeks[1], "north", 13.0, 5.0),
            zone_weekly(weeks[1], "East", 7.5, 3.0),
            zone_weekly(weeks[2], "Central", 15.0, 6.0),
        ],
        zone_demand_mix: vec![
            demand_mix("North", 8.0, 3.0, 1.5),
            demand_mix("south", 18.0, 8.0, 4.0),
            demand_mix("East", 5.0, 2.0, 0.5),
        ],
        scenario_efficiency: vec![
            ScenarioEfficiency {
                scenario_id: "S1".into(),
                week: 1,
                allocation_efficiency_percent: 92.0,
                supply_demand_gap_mld: 3.5,
            },
            ScenarioEfficiency {
                scenario_id: "S2".into(),
                week: 2,
                allocation_efficiency_percent: 88.0,
                supply_demand_gap_mld: 6.0,
            },
        ],
        status_summary: vec![
            StatusCount {
                system_status: "Normal".into(),
                count: 30,
            },
            StatusCount {
                system_status: "Stressed".into(),
                count: 18,
            },
        ],
        population_trend: vec![PopulationPoint {
            week_start: week(weeks[0]),
            population: 1_650_000.0,
        }],
    }
}

#[fixture]
pub fn north_defaults() -> ScenarioDefaults {
    ScenarioDefaults {
        population: Some(120_000.0),
        priority_level: None,
        festival_week: None,
        res_demand: Some(14.5),
        com_demand: Some(4.5),
        ind_demand: Some(2.0),
        season: Some(Season::Summer),
        temp_avg_c: Some(31.0),
        rainfall_mm: Some(0.0),
    }
}

#[fixture]
pub fn south_defaults() -> ScenarioDefaults {
    ScenarioDefaults {
        population: Some(95_000.0),
        priority_level: Some(PriorityLevel::Medium),
        festival_week: None,
        res_demand: Some(11.0),
        com_demand: Some(3.0),
        ind_demand: Some(5.5),
        season: Some(Season::SwMonsoon),
        temp_avg_c: Some(26.5),
        rainfall_mm: Some(42.0),
    }
}

#[fixture]
pub fn prediction_result() -> PredictionResult {
    PredictionResult {
        zone: Some(Zone::North),
        model_scope: Some(ModelScope::Zone),
        supply_r2: 0.91,
        ops_r2: 0.87,
        siruvani_supply_mld: 100.0,
        pilloor_supply_mld: 80.0,
        groundwater_supply_mld: 60.0,
        supply_hours_per_day: 4.5,
        pumping_capacity_mld: 250.0,
    }
}

#[fixture]
pub fn zone_requirements() -> Vec<ZoneRequirement> {
    let requirement = |zone, demand, capacity, priority_level| ZoneRequirement {
        zone,
        demand: Mld(demand),
        capacity: Mld(capacity),
        priority_level,
    };

    vec![
        requirement(Zone::North, 50.0, 60.0, PriorityLevel::High),
        requirement(Zone::East, 30.0, 20.0, PriorityLevel::Low),
        requirement(Zone::West, 40.0, 45.0, PriorityLevel::Medium),
    ]
}
