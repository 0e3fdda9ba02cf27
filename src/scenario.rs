//! Scenario inputs for what-if predictions.
//!
//! The operator edits a [`ScenarioForm`], which holds the raw text of each field. A form is only
//! turned into a typed [`ScenarioInput`] when it is validated for submission.
use crate::units::Mld;
use crate::zone::Zone;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// An editable field of a scenario
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ScenarioField {
    /// Population served
    Population,
    /// Supply priority of the zone
    PriorityLevel,
    /// Whether the week has a festival
    FestivalWeek,
    /// Residential demand (MLD)
    ResDemand,
    /// Commercial demand (MLD)
    ComDemand,
    /// Industrial demand (MLD)
    IndDemand,
    /// Season of the year
    Season,
    /// Average temperature (°C)
    TempAvgC,
    /// Weekly rainfall (mm)
    RainfallMm,
}

/// Supply priority of a zone
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum PriorityLevel {
    /// Served first
    #[default]
    High,
    /// Served after high priority zones
    Medium,
    /// Served last
    Low,
}

/// Whether a week includes a festival
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum FestivalWeek {
    /// A festival week
    #[strum(to_string = "Yes", serialize = "true")]
    Yes,
    /// An ordinary week
    #[default]
    #[strum(to_string = "No", serialize = "false")]
    No,
}

/// Season of the year
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Season {
    /// January and February
    Winter,
    /// March to May
    #[default]
    Summer,
    /// South-west monsoon, June to September
    #[serde(rename = "SW_Monsoon")]
    #[strum(serialize = "SW_Monsoon")]
    SwMonsoon,
    /// North-east monsoon, October to December
    #[serde(rename = "NE_Monsoon")]
    #[strum(serialize = "NE_Monsoon")]
    NeMonsoon,
}

/// A validated scenario, ready to be sent for prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    /// Population served
    pub population: u64,
    /// Supply priority of the zone
    pub priority_level: PriorityLevel,
    /// Whether the week has a festival
    pub festival_week: FestivalWeek,
    /// Residential demand (MLD)
    pub res_demand: f64,
    /// Commercial demand (MLD)
    pub com_demand: f64,
    /// Industrial demand (MLD)
    pub ind_demand: f64,
    /// Season of the year
    pub season: Season,
    /// Average temperature (°C)
    pub temp_avg_c: f64,
    /// Weekly rainfall (mm)
    pub rainfall_mm: f64,
    /// The zone the scenario is for
    pub zone: Zone,
}

impl ScenarioInput {
    /// Total demand across all consumer categories, i.e. the recommended total supply
    pub fn total_demand(&self) -> Mld {
        Mld(self.res_demand + self.com_demand + self.ind_demand)
    }
}

/// Baseline values for a zone's scenario, as returned by the backend.
///
/// Any field may be missing, in which case the form keeps its current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioDefaults {
    /// Population served
    pub population: Option<f64>,
    /// Supply priority of the zone
    pub priority_level: Option<PriorityLevel>,
    /// Whether the week has a festival
    pub festival_week: Option<FestivalWeek>,
    /// Residential demand (MLD)
    pub res_demand: Option<f64>,
    /// Commercial demand (MLD)
    pub com_demand: Option<f64>,
    /// Industrial demand (MLD)
    pub ind_demand: Option<f64>,
    /// Season of the year
    pub season: Option<Season>,
    /// Average temperature (°C)
    pub temp_avg_c: Option<f64>,
    /// Weekly rainfall (mm)
    pub rainfall_mm: Option<f64>,
}

impl ScenarioDefaults {
    /// The fields which have a default value, as form text
    fn values(&self) -> impl Iterator<Item = (ScenarioField, String)> {
        let number = |field, value: Option<f64>| value.map(|v| (field, v.to_string()));
        [
            number(ScenarioField::Population, self.population),
            self.priority_level
                .map(|v| (ScenarioField::PriorityLevel, v.to_string())),
            self.festival_week
                .map(|v| (ScenarioField::FestivalWeek, v.to_string())),
            number(ScenarioField::ResDemand, self.res_demand),
            number(ScenarioField::ComDemand, self.com_demand),
            number(ScenarioField::IndDemand, self.ind_demand),
            self.season.map(|v| (ScenarioField::Season, v.to_string())),
            number(ScenarioField::TempAvgC, self.temp_avg_c),
            number(ScenarioField::RainfallMm, self.rainfall_mm),
        ]
        .into_iter()
        .flatten()
    }
}

/// Why a scenario could not be submitted
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// No zone has been selected
    MissingZone,
    /// A field's value is unacceptable
    InvalidField {
        /// The offending field
        field: ScenarioField,
        /// The raw value entered
        value: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingZone => write!(f, "no zone selected"),
            Self::InvalidField {
                field,
                value,
                reason,
            } => write!(f, "invalid value '{value}' for {field}: {reason}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The editable state of a scenario.
///
/// Every field always has a value. Fields which the operator has edited are remembered so that
/// zone defaults arriving later do not overwrite them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioForm {
    zone: Option<Zone>,
    values: IndexMap<ScenarioField, String>,
    edited: HashSet<ScenarioField>,
}

impl Default for ScenarioForm {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ScenarioForm {
    /// Create a form with initial values for the given zone
    pub fn new(zone: Option<Zone>) -> Self {
        let values = ScenarioField::iter()
            .map(|field| (field, initial_value(field).to_string()))
            .collect();

        Self {
            zone,
            values,
            edited: HashSet::new(),
        }
    }

    /// The zone the form is for
    pub fn zone(&self) -> Option<Zone> {
        self.zone
    }

    /// The current text of a field
    pub fn get(&self, field: ScenarioField) -> &str {
        self.values.get(&field).map_or("", String::as_str)
    }

    /// Set a field as the operator
    pub fn set(&mut self, field: ScenarioField, value: impl Into<String>) {
        self.values.insert(field, value.into());
        self.edited.insert(field);
    }

    /// Whether the operator has edited a field
    pub fn is_edited(&self, field: ScenarioField) -> bool {
        self.edited.contains(&field)
    }

    /// Seed the form with zone defaults, keeping any values the operator has already entered
    pub fn apply_defaults(&mut self, defaults: &ScenarioDefaults) {
        for (field, value) in defaults.values() {
            if !self.is_edited(field) {
                self.values.insert(field, value);
            }
        }
    }

    /// Check every field and build the input to submit
    pub fn validate(&self) -> Result<ScenarioInput, ValidationError> {
        let zone = self.zone.ok_or(ValidationError::MissingZone)?;

        Ok(ScenarioInput {
            population: self.parse_count(ScenarioField::Population)?,
            priority_level: self.parse_choice(ScenarioField::PriorityLevel)?,
            festival_week: self.parse_choice(ScenarioField::FestivalWeek)?,
            res_demand: self.parse_amount(ScenarioField::ResDemand)?,
            com_demand: self.parse_amount(ScenarioField::ComDemand)?,
            ind_demand: self.parse_amount(ScenarioField::IndDemand)?,
            season: self.parse_choice(ScenarioField::Season)?,
            temp_avg_c: self.parse_amount(ScenarioField::TempAvgC)?,
            rainfall_mm: self.parse_amount(ScenarioField::RainfallMm)?,
            zone,
        })
    }

    fn invalid(&self, field: ScenarioField, reason: &'static str) -> ValidationError {
        ValidationError::InvalidField {
            field,
            value: self.get(field).to_string(),
            reason,
        }
    }

    /// Parse a field as a non-negative, finite number
    fn parse_amount(&self, field: ScenarioField) -> Result<f64, ValidationError> {
        let value: f64 = self
            .get(field)
            .trim()
            .parse()
            .map_err(|_| self.invalid(field, "not a number"))?;

        if !value.is_finite() {
            return Err(self.invalid(field, "not a finite number"));
        }
        if value < 0.0 {
            return Err(self.invalid(field, "must not be negative"));
        }

        Ok(value)
    }

    /// Parse a field as a non-negative whole number
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn parse_count(&self, field: ScenarioField) -> Result<u64, ValidationError> {
        let value = self.parse_amount(field)?;
        if value.fract() != 0.0 || value > u64::MAX as f64 {
            return Err(self.invalid(field, "must be a whole number"));
        }

        Ok(value as u64)
    }

    fn parse_choice<T: FromStr>(&self, field: ScenarioField) -> Result<T, ValidationError> {
        self.get(field)
            .trim()
            .parse()
            .map_err(|_| self.invalid(field, "not a recognised option"))
    }
}

/// The value of a field before defaults or edits are applied
fn initial_value(field: ScenarioField) -> &'static str {
    match field {
        ScenarioField::Population
        | ScenarioField::ResDemand
        | ScenarioField::ComDemand
        | ScenarioField::IndDemand
        | ScenarioField::RainfallMm => "0",
        ScenarioField::PriorityLevel => "High",
        ScenarioField::FestivalWeek => "No",
        ScenarioField::Season => "Summer",
        ScenarioField::TempAvgC => "28",
    }
}
