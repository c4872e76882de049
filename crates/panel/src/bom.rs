use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;
use panel_bom::{BomCalculationResult, FileInventory, InventoryData, MemoryInventory};

pub const DEFAULT_INVENTORY: &str = "inventory.json";

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Args, Debug)]
pub struct BomArgs {
    #[command(subcommand)]
    command: BomCommand,
}

#[derive(Subcommand, Debug)]
enum BomCommand {
    /// Plan pin allocations for every component in a panel section
    #[command(alias = "calc")]
    Calculate(CalculateArgs),

    /// Write a saved plan's pin assignments to the inventory
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
struct CalculateArgs {
    /// Panel section id
    #[arg(value_name = "SECTION")]
    section: String,

    /// Inventory file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_INVENTORY, value_hint = clap::ValueHint::FilePath)]
    inventory: PathBuf,

    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Save the plan as JSON for `panel bom apply`
    #[arg(short, long, value_name = "PLAN", value_hint = clap::ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Plan produced by `panel bom calculate -o`
    #[arg(value_name = "PLAN", value_hint = clap::ValueHint::FilePath)]
    plan: PathBuf,

    /// Inventory file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_INVENTORY, value_hint = clap::ValueHint::FilePath)]
    inventory: PathBuf,

    /// Validate the plan without writing the inventory
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

pub fn execute(args: BomArgs) -> Result<()> {
    match args.command {
        BomCommand::Calculate(args) => calculate(args),
        BomCommand::Apply(args) => apply(args),
    }
}

pub fn load_inventory(path: &Path) -> Result<InventoryData> {
    InventoryData::load(path)
        .with_context(|| format!("Failed to load inventory {}", path.display()))
}

fn calculate(args: CalculateArgs) -> Result<()> {
    let inventory = MemoryInventory::new(load_inventory(&args.inventory)?);
    let result = panel_bom::calculate(&inventory, &args.section)?;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&result)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write plan {}", path.display()))?;
        log::info!("Plan written to {}", path.display());
    }

    let mut writer = io::stdout().lock();
    match args.format {
        OutputFormat::Json => writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?,
        OutputFormat::Table => result.write_table(&mut writer)?,
    }
    Ok(())
}

fn apply(args: ApplyArgs) -> Result<()> {
    let content = fs::read_to_string(&args.plan)
        .with_context(|| format!("Failed to read plan {}", args.plan.display()))?;
    let plan: BomCalculationResult = serde_json::from_str(&content)
        .with_context(|| format!("Invalid plan {}", args.plan.display()))?;

    let result = if args.dry_run {
        let inventory = MemoryInventory::new(load_inventory(&args.inventory)?);
        let result = panel_bom::apply(&inventory, &plan)?;
        eprintln!("{}", "Dry run: inventory not modified".yellow());
        result
    } else {
        // Load, check and save all happen under the inventory's lock file
        let inventory = FileInventory::new(&args.inventory);
        panel_bom::apply(&inventory, &plan).with_context(|| {
            format!("Failed to apply plan to {}", args.inventory.display())
        })?
    };

    let mut writer = io::stdout().lock();
    match args.format {
        OutputFormat::Json => writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?,
        OutputFormat::Table => result.write_table(&mut writer)?,
    }
    Ok(())
}
