//! TOML configuration deserialisation for OELT jobs.

use std::path::PathBuf;

use beamdown_core::{Overrides, ParamValue, ParameterError};
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    /// Design parameter overrides, keyed by parameter name.
    #[serde(default)]
    pub parameters: toml::Table,
    #[serde(default)]
    pub optics: Option<OpticsConfig>,
    #[serde(default)]
    pub design: DesignConfig,
}

/// How to launch the field optics service.
#[derive(Debug, Deserialize)]
pub struct OpticsConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory of the service process (default: inherited).
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Field design settings that are not case parameters.
#[derive(Debug, Deserialize)]
pub struct DesignConfig {
    /// Design-point DNI in W/m² (default: 900).
    #[serde(default = "default_dni")]
    pub dni: f64,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self { dni: default_dni() }
    }
}

fn default_dni() -> f64 {
    beamdown_core::design::DESIGN_DNI
}

impl JobConfig {
    /// The `[parameters]` table as builder overrides.
    pub fn overrides(&self) -> Result<Overrides, ParameterError> {
        self.parameters
            .iter()
            .map(|(name, value)| Ok((name.clone(), ParamValue::from_toml(name, value)?)))
            .collect()
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: JobConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_job() {
        let job: JobConfig = toml::from_str(
            r#"
            [parameters]
            casedir = "./test"
            H_tower = 75.0
            n_row_oelt = 5
            rim_angle_y = "auto"

            [optics]
            command = "python3"
            args = ["solstice_bridge.py", "--quiet"]

            [design]
            dni = 950.0
            "#,
        )
        .unwrap();

        let o = job.overrides().unwrap();
        assert_eq!(o["casedir"], ParamValue::Text("./test".into()));
        assert_eq!(o["H_tower"], ParamValue::Real(75.0));
        assert_eq!(o["n_row_oelt"], ParamValue::Integer(5));
        assert_eq!(o["rim_angle_y"], ParamValue::Text("auto".into()));

        let optics = job.optics.unwrap();
        assert_eq!(optics.command, "python3");
        assert_eq!(optics.args.len(), 2);
        assert!(optics.working_dir.is_none());
        assert_eq!(job.design.dni, 950.0);
    }

    #[test]
    fn test_minimal_job() {
        let job: JobConfig = toml::from_str("").unwrap();
        assert!(job.overrides().unwrap().is_empty());
        assert!(job.optics.is_none());
        assert_eq!(job.design.dni, 900.0);
    }

    #[test]
    fn test_non_scalar_parameter_rejected() {
        let job: JobConfig = toml::from_str("[parameters]\nW_rcv = [1.0, 2.0]\n").unwrap();
        let err = job.overrides().unwrap_err();
        assert_eq!(err.name(), "W_rcv");
    }
}
