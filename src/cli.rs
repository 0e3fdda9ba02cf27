//! The command line interface for the dashboard.
use crate::aggregate::{DerivedView, NetworkView};
use crate::allocation::{ZoneAllocation, ZoneRequirement, allocate};
use crate::client::{Backend, HttpBackend};
use crate::controller::ScenarioState;
use crate::input::read_vec_from_csv;
use crate::log;
use crate::prediction::PredictionResult;
use crate::scenario::ScenarioField;
use crate::session::{Analytics, Runtime};
use crate::settings::Settings;
use crate::units::Mld;
use crate::zone::Zone;
use ::log::{info, warn};
use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the dashboard.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show supply and demand analytics.
    Dashboard {
        /// Zone to show metrics for.
        #[arg(short, long)]
        zone: Option<Zone>,
    },
    /// Predict supply and operations for a what-if scenario.
    Predict {
        /// Zone the scenario is for.
        #[arg(short, long)]
        zone: Zone,
        /// Override a scenario field, e.g. `--set population=150000`.
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(ScenarioField, String)>,
    },
    /// Allocate the available supply between zones by priority.
    Allocate {
        /// CSV file with demand, capacity and priority for each zone.
        requirements_path: PathBuf,
        /// Total supply available (MLD).
        #[arg(short, long)]
        supply: f64,
        /// Write the allocation to this CSV file as well as to the console.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the zones of the network.
    Zones,
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Dashboard { zone } => handle_dashboard_command(zone, None),
            Self::Predict { zone, assignments } => {
                handle_predict_command(zone, &assignments, None)
            }
            Self::Allocate {
                requirements_path,
                supply,
                output,
            } => handle_allocate_command(&requirements_path, supply, output.as_deref(), None),
            Self::Zones => {
                handle_zones_command();
                Ok(())
            }
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse a `FIELD=VALUE` argument
fn parse_assignment(arg: &str) -> Result<(ScenarioField, String), String> {
    let (field, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{arg}'"))?;
    let field = field
        .trim()
        .parse()
        .map_err(|_| format!("unknown scenario field '{}'", field.trim()))?;

    Ok((field, value.trim().to_string()))
}

/// Parse CLI arguments and start AquaSmart
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ aquasmart --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided, and initialise the logger
fn setup(settings: Option<Settings>) -> Result<Settings> {
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    log::init(Some(&settings.log_level)).context("Failed to initialise logging.")?;

    Ok(settings)
}

/// Connect to the backend named in the settings
fn connect(settings: &Settings) -> Result<Arc<dyn Backend>> {
    let backend = HttpBackend::from_settings(settings).context("Failed to create backend client.")?;
    info!("Using backend at {}", settings.backend_url());

    Ok(Arc::new(backend))
}

/// Format an optional value, showing missing data explicitly rather than as zero
fn or_no_data(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "no data".to_string(), |value| format!("{value:.2} {unit}"))
}

/// What the `dashboard` command shows
#[derive(Debug, Clone, PartialEq)]
pub enum Dashboard {
    /// Network-wide metrics only
    Network(NetworkView),
    /// Metrics for one zone alongside the network-wide ones
    Zone(DerivedView),
}

impl Dashboard {
    /// The network-wide metrics
    pub fn network(&self) -> &NetworkView {
        match self {
            Self::Network(network) => network,
            Self::Zone(view) => &view.network,
        }
    }
}

/// Handle the `dashboard` command.
pub fn handle_dashboard_command(zone: Option<Zone>, settings: Option<Settings>) -> Result<()> {
    let settings = setup(settings)?;
    let dashboard = load_dashboard(connect(&settings)?, zone)?;

    print_network_view(dashboard.network());
    match &dashboard {
        Dashboard::Zone(view) => print_zone_view(view),
        Dashboard::Network(_) => println!("\nSelect a zone with --zone to see zone metrics."),
    }

    Ok(())
}

/// Fetch the dataset and compute the metrics for the network and, if given, `zone`.
///
/// # Returns
///
/// The dashboard, or an error naming the endpoint if the dataset could not be fetched
pub fn load_dashboard(backend: Arc<dyn Backend>, zone: Option<Zone>) -> Result<Dashboard> {
    let mut runtime = Runtime::new(backend);
    if let Some(zone) = zone {
        runtime.select_zone(zone);
    }
    runtime.refresh_dataset();
    runtime.settle();

    match runtime.session_mut().analytics() {
        Analytics::Network(network) => Ok(Dashboard::Network(network.clone())),
        Analytics::Ready(view) => Ok(Dashboard::Zone(view.clone())),
        Analytics::Unavailable(err) => {
            Err(anyhow!(err.clone()).context("Dashboard data is unavailable."))
        }
        Analytics::Loading => bail!("Dashboard data did not arrive."),
    }
}

fn print_network_view(view: &NetworkView) {
    println!(
        "Current week supply: {}",
        or_no_data(view.current_week_supply, "MLD")
    );
    match &view.dominant_status {
        Some(status) => println!(
            "Most common network status: {} ({} weeks)",
            status.system_status, status.count
        ),
        None => println!("Most common network status: no data"),
    }
    println!(
        "Population served: {}",
        or_no_data(
            view.latest_population.as_ref().map(|point| point.population),
            "people"
        )
    );
    match &view.latest_source_mix {
        Some(mix) => println!(
            "Latest source mix: Siruvani {:.2}, Pilloor {:.2}, groundwater {:.2} (MLD)",
            mix.siruvani_supply_mld, mix.pilloor_supply_mld, mix.groundwater_supply_mld
        ),
        None => println!("Latest source mix: no data"),
    }
    match &view.latest_storage {
        Some(storage) => println!(
            "Latest storage: Siruvani {:.1}%, Pilloor {:.1}%",
            storage.siruvani_storage_pct, storage.pilloor_storage_pct
        ),
        None => println!("Latest storage: no data"),
    }

    match &view.weekly_supply {
        Some(weeks) => {
            println!("\nWeek starting  Supply (MLD)  Average (MLD)");
            for week in weeks {
                println!(
                    "{:<13}  {:>12.2}  {:>13.2}",
                    week.record.week_start.to_string(),
                    week.record.total_supply_mld,
                    week.rolling_avg
                );
            }
        }
        None => println!("\nWeekly supply: no data"),
    }

    if !view.zone_distribution.is_empty() {
        println!("\nZone     Average demand (MLD)");
        for zone in &view.zone_distribution {
            println!("{:<7}  {:>20.2}", zone.zone, zone.total_demand_mld);
        }
        println!(
            "Mean across zones: {}",
            or_no_data(view.mean_zone_demand, "MLD")
        );
    }

    if !view.season_supply.is_empty() {
        println!("\nSeason        Supply (MLD)");
        for season in &view.season_supply {
            println!("{:<12}  {:>12.2}", season.season, season.total_supply_mld);
        }
    }

    if !view.status_summary.is_empty() {
        println!("\nStatus     Weeks");
        for status in &view.status_summary {
            println!("{:<9}  {:>5}", status.system_status, status.count);
        }
    }

    if !view.scenario_weeks.is_empty() {
        println!("\nWeek starting  Scenario  Efficiency (%)  Gap (MLD)");
        for week in &view.scenario_weeks {
            println!(
                "{:<13}  {:<8}  {:>14.1}  {:>9.2}",
                week.week_start.to_string(),
                week.sample.scenario_id,
                week.sample.allocation_efficiency_percent,
                week.sample.supply_demand_gap_mld
            );
        }
        println!(
            "Mean efficiency: {}",
            or_no_data(view.mean_scenario_efficiency, "%")
        );
    }
}

fn print_zone_view(view: &DerivedView) {
    println!("\nZone: {}", view.zone);
    println!(
        "Average demand: {}",
        or_no_data(view.zone_average_demand, "MLD")
    );
    println!(
        "Supply hours per day: {}",
        or_no_data(
            view.zone_reliability
                .as_ref()
                .map(|record| record.supply_hours_per_day),
            "h"
        )
    );

    match &view.zone_demand_mix {
        Some(mix) => println!(
            "Demand mix: residential {:.2}, commercial {:.2}, industrial {:.2} (total {})",
            mix.residential_demand_mld,
            mix.commercial_demand_mld,
            mix.industrial_demand_mld,
            mix.total_demand()
        ),
        None => println!("Demand mix: no data"),
    }

    if !view.zone_weekly.is_empty() {
        println!("\nWeek starting  Demand (MLD)  Supply hours");
        for week in &view.zone_weekly {
            println!(
                "{:<13}  {:>12.2}  {:>12.1}",
                week.week_start.to_string(),
                week.total_demand_mld,
                week.supply_hours_per_day
            );
        }
    }
}

/// Handle the `predict` command.
pub fn handle_predict_command(
    zone: Zone,
    assignments: &[(ScenarioField, String)],
    settings: Option<Settings>,
) -> Result<()> {
    let settings = setup(settings)?;
    let result = predict_scenario(connect(&settings)?, zone, assignments)?;
    print_prediction(&result);

    Ok(())
}

/// Seed a scenario for `zone` from the backend's defaults, apply `assignments` and predict it
pub fn predict_scenario(
    backend: Arc<dyn Backend>,
    zone: Zone,
    assignments: &[(ScenarioField, String)],
) -> Result<PredictionResult> {
    let mut runtime = Runtime::new(backend);
    runtime.select_zone(zone);
    runtime.settle();
    if runtime.session().defaults_error().is_some() {
        warn!("Continuing without defaults for {zone}");
    }

    for (field, value) in assignments {
        runtime.edit(*field, value.as_str());
    }
    runtime.submit().context("Invalid scenario.")?;
    runtime.settle();

    let controller = runtime.session().controller();
    match (controller.state(), controller.result(), controller.last_error()) {
        (ScenarioState::Succeeded, Some(result), _) => Ok(result.clone()),
        (_, _, Some(err)) => Err(anyhow!(err.clone()).context("Prediction failed.")),
        (state, _, _) => bail!("Prediction did not complete (state {state:?})"),
    }
}

fn print_prediction(result: &PredictionResult) {
    if let Some(zone) = result.zone {
        println!("Zone: {zone}");
    }
    if let Some(scope) = result.model_scope {
        println!("Model: {scope}");
    }
    println!(
        "Supply model accuracy: {:.0}%",
        result.supply_r2_proportion() * 100.0
    );
    println!(
        "Operations model accuracy: {:.0}%",
        result.ops_r2_proportion() * 100.0
    );
    println!("Siruvani: {:.2} MLD", result.siruvani_supply_mld);
    println!("Pilloor: {:.2} MLD", result.pilloor_supply_mld);
    println!("Groundwater: {:.2} MLD", result.groundwater_supply_mld);
    println!("Total supply: {}", result.total_supply());
    println!("Supply hours per day: {:.1}", result.supply_hours_per_day);
    println!("Pumping capacity: {:.2} MLD", result.pumping_capacity_mld);
}

/// Handle the `allocate` command.
pub fn handle_allocate_command(
    requirements_path: &Path,
    supply: f64,
    output_path: Option<&Path>,
    settings: Option<Settings>,
) -> Result<()> {
    setup(settings)?;

    let requirements: Vec<ZoneRequirement> =
        read_vec_from_csv(requirements_path).context("Failed to load zone requirements.")?;
    let allocations = allocate(&requirements, Mld(supply))?;

    println!("Zone     Demand (MLD)  Allocated (MLD)  Deficit (MLD)  Status");
    for allocation in &allocations {
        println!(
            "{:<7}  {:>12.2}  {:>15.2}  {:>13.2}  {}",
            allocation.zone.name(),
            allocation.demand.value(),
            allocation.allocated.value(),
            allocation.deficit.value(),
            allocation.status
        );
    }

    if let Some(output_path) = output_path {
        write_allocations(output_path, &allocations)?;
        info!("Allocation written to {}", output_path.display());
    }

    Ok(())
}

/// Write allocations to a CSV file
fn write_allocations(file_path: &Path, allocations: &[ZoneAllocation]) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Failed to create {}", file_path.display()))?;
    for allocation in allocations {
        writer.serialize(allocation)?;
    }
    writer.flush()?;

    Ok(())
}

/// Handle the `zones` command.
pub fn handle_zones_command() {
    for zone in Zone::all() {
        println!("{zone}");
    }
}
