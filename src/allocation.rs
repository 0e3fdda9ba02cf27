//! Priority-weighted allocation of the available supply between zones.
//!
//! Each zone receives at most its demand and at most what its infrastructure can deliver, and the
//! allocations together may not exceed the supply available. Within those limits the total of
//! `priority weight × allocation` is maximised. There is only one constraint coupling the zones
//! (the shared supply), so the optimum is reached by serving zones in descending priority order,
//! each up to its own limit, until the supply runs out.
use crate::scenario::PriorityLevel;
use crate::units::Mld;
use crate::zone::Zone;
use anyhow::{Result, ensure};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::Display;

/// Deficit below which a zone is considered fully served
const OPTIMAL_DEFICIT: Mld = Mld(1.0);

/// Fraction of demand above which a deficit is critical
const CRITICAL_DEFICIT_FRACTION: f64 = 0.2;

impl PriorityLevel {
    /// Weight of the priority level in the allocation objective
    pub fn weight(self) -> u32 {
        match self {
            PriorityLevel::High => 5,
            PriorityLevel::Medium => 3,
            PriorityLevel::Low => 1,
        }
    }
}

/// Demand and deliverable capacity for one zone
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneRequirement {
    /// The zone
    pub zone: Zone,
    /// Total demand of the zone
    #[serde(rename = "total_demand_mld")]
    pub demand: Mld,
    /// The most the zone's infrastructure can deliver
    #[serde(rename = "effective_deliverable_capacity_mld")]
    pub capacity: Mld,
    /// Supply priority of the zone
    pub priority_level: PriorityLevel,
}

/// How well a zone is served by an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum AllocationStatus {
    /// Deficit under 1 MLD
    Optimal,
    /// Some deficit, but no more than 20% of demand
    Stressed,
    /// Deficit over 20% of demand
    Critical,
}

impl AllocationStatus {
    /// Classify a zone by its deficit
    pub fn classify(demand: Mld, deficit: Mld) -> Self {
        if deficit < OPTIMAL_DEFICIT {
            Self::Optimal
        } else if deficit > demand * CRITICAL_DEFICIT_FRACTION {
            Self::Critical
        } else {
            Self::Stressed
        }
    }
}

/// The supply allocated to one zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneAllocation {
    /// The zone
    pub zone: Zone,
    /// Total demand of the zone
    pub demand: Mld,
    /// Supply allocated to the zone
    pub allocated: Mld,
    /// Demand left unserved
    pub deficit: Mld,
    /// How well the zone is served
    pub status: AllocationStatus,
}

/// Allocate `supply` between zones.
///
/// # Arguments
///
/// * `requirements` - Demand, capacity and priority for each zone. Each zone may appear once.
/// * `supply` - Total supply available
///
/// # Returns
///
/// One allocation per zone, in the same order as `requirements`
pub fn allocate(requirements: &[ZoneRequirement], supply: Mld) -> Result<Vec<ZoneAllocation>> {
    ensure!(
        supply.value() >= 0.0,
        "Available supply must not be negative"
    );

    let mut seen = HashSet::new();
    for requirement in requirements {
        ensure!(
            seen.insert(requirement.zone),
            "Zone {} appears more than once",
            requirement.zone
        );
        ensure!(
            requirement.demand.value() >= 0.0 && requirement.capacity.value() >= 0.0,
            "Demand and capacity for zone {} must not be negative",
            requirement.zone
        );
    }

    let mut allocated = vec![Mld(0.0); requirements.len()];
    let mut remaining = supply;
    for idx in (0..requirements.len())
        .sorted_by_key(|&idx| std::cmp::Reverse(requirements[idx].priority_level.weight()))
    {
        let requirement = &requirements[idx];
        let amount = requirement.demand.min(requirement.capacity).min(remaining);
        allocated[idx] = amount;
        remaining = (remaining - amount).max(Mld(0.0));
    }

    info!(
        "Allocated {} of {} available",
        supply - remaining,
        supply
    );

    Ok(requirements
        .iter()
        .zip(allocated)
        .map(|(requirement, allocated)| {
            let deficit = requirement.demand - allocated;
            ZoneAllocation {
                zone: requirement.zone,
                demand: requirement.demand,
                allocated,
                deficit,
                status: AllocationStatus::classify(requirement.demand, deficit),
            }
        })
        .collect())
}
