//! Job runner: ties together parameters, the optics service, and the builder.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;

use beamdown_core::params::PARAMETERS;
use beamdown_core::{
    read_table, validate_and_build, BuildOutcome, CacheDecision, CacheGate, DesignParameters,
    LookupTable, OeltBuilder, Overrides, ParamValue,
};
use beamdown_optics::{ExternalOpticsService, FieldOpticsService};

use crate::config::JobConfig;

/// Merge the job's `[parameters]` with `KEY=VALUE` overrides from the command
/// line. Command-line values win.
pub fn build_overrides(job: &JobConfig, sets: &[String]) -> Result<Overrides> {
    let mut overrides = job.overrides()?;
    for item in sets {
        let (name, value) = item
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", item))?;
        overrides.insert(name.trim().to_string(), ParamValue::parse_cli(value));
    }
    Ok(overrides)
}

/// Create the optics service. A command given on the command line replaces
/// the whole `[optics]` section of the job.
fn create_service(job: &JobConfig, optics_cmd: Option<&str>) -> Result<Arc<dyn FieldOpticsService>> {
    let service = match (optics_cmd, &job.optics) {
        (Some(cmd), _) => {
            let mut words = cmd.split_whitespace();
            let program = words.next().context("Empty --optics-cmd")?;
            ExternalOpticsService::new(program).with_args(words)
        }
        (None, Some(cfg)) => {
            let mut service = ExternalOpticsService::new(cfg.command.as_str()).with_args(&cfg.args);
            if let Some(dir) = &cfg.working_dir {
                service = service.with_working_dir(dir);
            }
            service
        }
        (None, None) => anyhow::bail!(
            "No optics service configured: add an [optics] section to the job file or pass --optics-cmd"
        ),
    };
    println!("Optics service: {}", service.program());
    Ok(Arc::new(service))
}

/// Run one job. A case that already has its table is reported without
/// creating the optics service, so no optics configuration is needed for it.
pub fn run_job(job: &JobConfig, sets: &[String], optics_cmd: Option<&str>) -> Result<BuildOutcome> {
    let overrides = build_overrides(job, sets)?;
    debug!("{} parameter overrides", overrides.len());
    let params = validate_and_build(&overrides)?;

    let outcome = match CacheGate::resolve(&params.casedir)? {
        CacheDecision::Reuse(path) => BuildOutcome::Cached(path),
        CacheDecision::Compute => {
            let service = create_service(job, optics_cmd)?;
            let builder = OeltBuilder::new(service).with_design_dni(job.design.dni);
            builder.run_params(&params)?
        }
    };

    match &outcome {
        BuildOutcome::Cached(path) => {
            println!("Loading existing OELT: {}", path.display());
        }
        BuildOutcome::Written { path, design } => {
            let (rows, cols) = design.grid.shape();
            println!("Heliostats:        {}", design.n_helios);
            println!("Land area:         {:.1} m2", design.grid.land_area);
            println!("Design efficiency: {:.4}", design.grid.design_efficiency);
            if let Some(annual) = design.grid.annual_efficiency() {
                println!("Annual efficiency: {:.4}", annual);
            }
            println!("OELT ({}x{}) written to: {}", rows, cols, path.display());
        }
        BuildOutcome::Infeasible => {
            println!("No valid field geometry for these parameters; no OELT written.");
        }
    }
    Ok(outcome)
}

/// Print every recognised parameter with its default.
pub fn print_parameters() {
    let defaults = DesignParameters::default().to_overrides();
    let width = PARAMETERS.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for p in PARAMETERS {
        let default = defaults
            .get(p.name)
            .map(|v| v.to_string())
            .unwrap_or_default();
        println!("  {:<width$}  {:<14}  {}", p.name, default, p.description, width = width);
    }
}

/// Print a table's metadata and efficiency range, optionally exporting the
/// grid as CSV.
pub fn inspect_table(path: &Path, csv: Option<&Path>) -> Result<()> {
    let table = read_table(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let m = &table.meta;

    println!("Field:             {}", m.field);
    println!("Aiming strategy:   {}", m.aiming);
    println!("Heliostats:        {}", m.n_helios);
    println!("Heliostat area:    {} m2", m.a_helio);
    println!("Design efficiency: {}", m.eff_design);
    println!("Receiver:          {} m x {} m", m.h_rcv, m.w_rcv);
    println!("Tower height:      {} m", m.h_tower);
    println!("Thermal input:     {} W", m.q_in_rcv);
    println!("Land area:         {} m2", m.a_land);

    let (rows, cols) = table.efficiency.dim();
    let max = table.efficiency.iter().copied().fold(0.0_f64, f64::max);
    let lit = table.efficiency.iter().filter(|&&e| e > 0.0).count();
    println!(
        "Grid:              {} declinations x {} hour angles, {} lit cells, peak {:.4}",
        rows, cols, lit, max
    );

    if let Some(csv) = csv {
        write_table_csv(&table, path, csv)?;
    }
    Ok(())
}

/// Write the efficiency grid in long form to a CSV file with a metadata header.
pub fn write_table_csv(table: &LookupTable, source: &Path, path: &Path) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);

    writeln!(file, "# Beam-down OELT: optical efficiency grid")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# Source: {}", source.display())?;
    writeln!(file, "# n_helios: {}, A_land: {} m2", table.meta.n_helios, table.meta.a_land)?;
    writeln!(file, "#")?;
    writeln!(file, "declination_deg,hour_angle_deg,efficiency")?;

    for (i, dec) in table.declinations.iter().enumerate() {
        for (j, hra) in table.hour_angles.iter().enumerate() {
            writeln!(file, "{},{},{:.6}", dec, hra, table.efficiency[[i, j]])?;
        }
    }
    file.flush()?;

    println!("Grid written to: {}", path.display());
    Ok(())
}
