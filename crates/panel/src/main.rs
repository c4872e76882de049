use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use panel_bom::BomError;

mod bom;
mod power;

/// Exit code for an apply rejected because the inventory changed underneath the plan
const EXIT_CONFLICT: i32 = 2;

#[derive(Parser)]
#[command(name = "panel")]
#[command(about = "Pin allocation and power budgeting for overhead panels", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true, hide = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and apply pin allocations for a panel section
    Bom(bom::BomArgs),

    /// Estimate PSU demand under an operating scenario
    #[command(alias = "p")]
    Power(power::PowerArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(exit_code(&e));
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug, RUST_LOG overrides
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Bom(args) => bom::execute(args),
        Commands::Power(args) => power::execute(args),
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    let conflict = error
        .chain()
        .any(|cause| cause.downcast_ref::<BomError>().is_some_and(BomError::is_conflict));
    if conflict { EXIT_CONFLICT } else { 1 }
}
