//! Beam-down OELT command-line interface.
//!
//! Build optical efficiency lookup tables from TOML job files:
//! ```sh
//! beamdown run job.toml --set H_tower=80 --set n_row_oelt=7
//! beamdown validate job.toml
//! beamdown params
//! beamdown inspect test/OELT_Solstice.motab --csv grid.csv
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beamdown")]
#[command(about = "Beam-down heliostat field OELT builder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Design the field and write its lookup table, unless the case already has one.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Parameter override, repeatable (overrides the config file).
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Optics service command line (overrides the [optics] section).
        #[arg(long, value_name = "CMD")]
        optics_cmd: Option<String>,
    },
    /// Validate a configuration file without running the optics service.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Parameter override, repeatable.
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// List the recognised design parameters and their defaults.
    Params,
    /// Show the metadata and grid of an existing lookup table.
    Inspect {
        /// Path to a `.motab` file.
        table: PathBuf,
        /// Also export the efficiency grid as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, set, optics_cmd } => {
            println!("Beam-down OELT Builder");
            println!("======================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            runner::run_job(&job, &set, optics_cmd.as_deref())?;
            Ok(())
        }
        Commands::Validate { config, set } => {
            let job = config::load_config(&config)?;
            let overrides = runner::build_overrides(&job, &set)?;
            let params = beamdown_core::validate_and_build(&overrides)?;
            println!("Configuration is valid: {}", config.display());
            println!("Case directory: {}", params.casedir.display());
            Ok(())
        }
        Commands::Params => {
            println!("Design parameters:");
            println!();
            runner::print_parameters();
            Ok(())
        }
        Commands::Inspect { table, csv } => runner::inspect_table(&table, csv.as_deref()),
    }
}
