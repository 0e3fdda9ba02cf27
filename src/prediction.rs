//! Results of scenario predictions.
use crate::units::Mld;
use crate::zone::Zone;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Which model produced a prediction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelScope {
    /// A model trained on the zone's own data
    Zone,
    /// A model trained on the whole network
    Global,
}

/// The backend's prediction for one scenario.
///
/// Accuracy scores are kept exactly as reported, even when they fall outside `[0, 1]`. Use the
/// `*_proportion` methods for anything drawn as a proportion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// The zone the prediction is for
    #[serde(default)]
    pub zone: Option<Zone>,
    /// Which model produced the prediction
    #[serde(default)]
    pub model_scope: Option<ModelScope>,
    /// R² of the supply model
    pub supply_r2: f64,
    /// R² of the operations model
    pub ops_r2: f64,
    /// Recommended supply from the Siruvani reservoir (MLD)
    pub siruvani_supply_mld: f64,
    /// Recommended supply from the Pilloor scheme (MLD)
    pub pilloor_supply_mld: f64,
    /// Recommended supply from groundwater (MLD)
    pub groundwater_supply_mld: f64,
    /// Recommended hours of supply per day
    pub supply_hours_per_day: f64,
    /// Recommended pumping capacity (MLD)
    pub pumping_capacity_mld: f64,
}

/// Clamp a value into `[0, 1]` for display as a proportion. NaN is treated as 0.
pub fn clamp_proportion(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl PredictionResult {
    /// The supply model's accuracy as a proportion in `[0, 1]`
    pub fn supply_r2_proportion(&self) -> f64 {
        clamp_proportion(self.supply_r2)
    }

    /// The operations model's accuracy as a proportion in `[0, 1]`
    pub fn ops_r2_proportion(&self) -> f64 {
        clamp_proportion(self.ops_r2)
    }

    /// Total recommended supply across all sources
    pub fn total_supply(&self) -> Mld {
        Mld(self.siruvani_supply_mld + self.pilloor_supply_mld + self.groundwater_supply_mld)
    }

    /// Accuracy scores outside `[0, 1]`, by name
    pub fn out_of_range_scores(&self) -> Vec<(&'static str, f64)> {
        [("supply_r2", self.supply_r2), ("ops_r2", self.ops_r2)]
            .into_iter()
            .filter(|(_, score)| !(0.0..=1.0).contains(score))
            .collect()
    }

    /// Check the result against the request it answers
    pub fn validate(&self, requested: Zone) -> Result<()> {
        if let Some(zone) = self.zone {
            ensure!(
                zone == requested,
                "prediction is for zone {zone} but {requested} was requested"
            );
        }

        Ok(())
    }
}
