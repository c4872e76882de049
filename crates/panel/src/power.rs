use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use panel_bom::MemoryInventory;
use panel_power::{PanelConfig, ScenarioKind, SectionToggles};

use crate::bom::{load_inventory, OutputFormat, DEFAULT_INVENTORY};

pub const DEFAULT_CONFIG: &str = "panel.toml";

#[derive(Args, Debug)]
pub struct PowerArgs {
    #[command(subcommand)]
    command: PowerCommand,
}

#[derive(Subcommand, Debug)]
enum PowerCommand {
    /// Estimate PSU demand for a scenario
    Budget(BudgetArgs),

    /// List the available scenarios
    Scenarios(ScenariosArgs),
}

#[derive(Args, Debug)]
struct BudgetArgs {
    /// Scenario name
    #[arg(value_name = "SCENARIO", default_value = "all-on")]
    scenario: String,

    /// Section id switched on under the custom scenario (repeatable)
    #[arg(long = "on", value_name = "SECTION")]
    on: Vec<String>,

    /// Configuration file (defaults to ./panel.toml when present)
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Inventory file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_INVENTORY, value_hint = clap::ValueHint::FilePath)]
    inventory: PathBuf,

    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ScenariosArgs {
    /// Configuration file (defaults to ./panel.toml when present)
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

pub fn execute(args: PowerArgs) -> Result<()> {
    match args.command {
        PowerCommand::Budget(args) => budget(args),
        PowerCommand::Scenarios(args) => scenarios(args),
    }
}

/// Explicit `--config`, then `./panel.toml`, then built-in defaults
fn load_config(path: Option<&Path>) -> Result<PanelConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if !default.exists() {
                log::debug!("No {DEFAULT_CONFIG} found, using defaults");
                return Ok(PanelConfig::default());
            }
            default
        }
    };
    PanelConfig::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn budget(args: BudgetArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let inventory = MemoryInventory::new(load_inventory(&args.inventory)?);

    let toggles: SectionToggles = args.on.iter().map(|id| (id.clone(), true)).collect();
    if !toggles.is_empty() && !config.scenario_set()?.get(&args.scenario)?.is_custom() {
        log::warn!("--on only applies to the custom scenario; ignoring it for {}", args.scenario);
    }

    let budget = panel_power::power_budget(&inventory, &config, &args.scenario, Some(&toggles))?;

    let mut writer = io::stdout().lock();
    match args.format {
        OutputFormat::Json => writeln!(writer, "{}", serde_json::to_string_pretty(&budget)?)?,
        OutputFormat::Table => budget.write_table(&mut writer)?,
    }
    Ok(())
}

fn scenarios(args: ScenariosArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let set = config.scenario_set()?;

    let mut writer = io::stdout().lock();
    if let OutputFormat::Json = args.format {
        let scenarios: Vec<_> = set.iter().collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&scenarios)?)?;
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);
    table.set_header(vec!["Name", "Label", "Rules"]);

    for scenario in set.iter() {
        let rules = match &scenario.kind {
            ScenarioKind::Custom => "section toggles (--on)".to_string(),
            ScenarioKind::Rules { rules } => rules
                .iter()
                .map(|rule| rule.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        };
        table.add_row(vec![scenario.name.clone(), scenario.label.clone(), rules]);
    }

    writeln!(writer, "{table}")?;
    Ok(())
}
