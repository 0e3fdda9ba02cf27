//! Water supply analytics and what-if predictions for a zoned distribution network.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod aggregate;
pub mod allocation;
pub mod cli;
pub mod client;
pub mod controller;
pub mod dataset;
pub mod defaults;
pub mod input;
pub mod log;
pub mod prediction;
pub mod scenario;
pub mod selection;
pub mod session;
pub mod settings;
pub mod units;
pub mod zone;

#[cfg(test)]
mod fixture;

/// Get config dir for program.
///
/// Falls back to the current directory if the platform has no config dir.
pub fn get_aquasmart_config_dir() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("aquasmart");
    dir
}
