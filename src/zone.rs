//! The registry of operating zones.
//!
//! The water network is partitioned into a fixed, closed set of service zones. Zone names coming
//! from the backend are free-form strings, so matching against them is always case-insensitive.
use anyhow::{Result, anyhow};
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};
use unicase::UniCase;

/// One of the five service-area partitions of the network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
pub enum Zone {
    /// North zone
    North,
    /// South zone
    South,
    /// East zone
    East,
    /// West zone
    West,
    /// Central zone
    Central,
}

impl Zone {
    /// The canonical name of this zone (e.g. "North")
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether a zone name from a dataset record refers to this zone
    pub fn matches(self, name: &str) -> bool {
        UniCase::new(self.name()) == UniCase::new(name.trim())
    }

    /// Look up a zone by name, ignoring case.
    ///
    /// # Returns
    ///
    /// The matching zone or `None` if the name is not in the registry
    pub fn lookup(name: &str) -> Option<Zone> {
        Zone::iter().find(|zone| zone.matches(name))
    }

    /// All zones in registry order
    pub fn all() -> impl Iterator<Item = Zone> {
        Zone::iter()
    }
}

impl FromStr for Zone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Zone::lookup(s).ok_or_else(|| {
            anyhow!(
                "Unknown zone '{s}'. Valid zones are: {}",
                Zone::iter().map(Zone::name).collect::<Vec<_>>().join(", ")
            )
        })
    }
}

impl<'de> Deserialize<'de> for Zone {
    fn deserialize<D>(deserialiser: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserialiser)?;
        Zone::lookup(&s).ok_or_else(|| D::Error::custom(format!("Unknown zone '{s}'")))
    }
}

impl Serialize for Zone {
    fn serialize<S>(&self, serialiser: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialiser.serialize_str(self.name())
    }
}
