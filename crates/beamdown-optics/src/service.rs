//! Field optics service trait and its request/response messages.
//!
//! The [`FieldOpticsService`] trait abstracts over the ray-tracing engine so
//! that the OELT builder only deals with one synchronous call: scene and
//! sampling grid in, efficiency table and field statistics out. Whatever
//! parallelism the engine uses stays behind this boundary.

use std::path::PathBuf;

use beamdown_geometry::Scene;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors originating from an optics service.
#[derive(Debug, Error)]
pub enum OpticsError {
    #[error("Optics service not available: {0}")]
    Unavailable(String),

    #[error("Failed to launch optics service '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Optics service exited with {status}: {stderr}")]
    ServiceFailed { status: String, stderr: String },

    #[error("Malformed optics service message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("I/O error talking to optics service: {0}")]
    Io(#[from] std::io::Error),

    #[error("Optics engine error: {0}")]
    Engine(String),
}

/// One sun position of the annual sampling grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunPositionSample {
    /// Row index: day sample (declination).
    pub day: usize,
    /// Column index: hour sample (hour angle).
    pub hour: usize,
    /// Solar declination (deg).
    pub declination_deg: f64,
    /// Solar hour angle, zero at solar noon (deg).
    pub hour_angle_deg: f64,
    /// Solar elevation above the horizon (deg).
    pub elevation_deg: f64,
    /// Solar azimuth, clockwise from north (deg).
    pub azimuth_deg: f64,
    /// Weather-derived direct normal irradiance weight (W/m²), once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dni: Option<f64>,
}

impl SunPositionSample {
    pub fn is_daylight(&self) -> bool {
        self.elevation_deg > 0.0
    }
}

/// Everything the optics service needs to design the field and tabulate its
/// annual optical efficiency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualDesignRequest {
    pub scene: Scene,
    /// Site latitude (deg, north positive).
    pub latitude_deg: f64,
    /// Working directory for engine intermediates.
    pub casedir: PathBuf,
    /// Design-point direct normal irradiance used to size the field (W/m²).
    pub dni_design: f64,
    /// Rays traced per sun position.
    pub n_rays: u64,
    /// Number of day samples (table rows).
    pub n_days: usize,
    /// Number of hour samples (table columns).
    pub n_hours: usize,
    /// The `n_days` × `n_hours` sun positions, row-major.
    pub samples: Vec<SunPositionSample>,
    /// Weather time series used to weight the samples by DNI.
    pub weather_file: PathBuf,
    /// Target thermal input at the receiver at the design point (W).
    pub q_in_design: f64,
}

/// What the optics service reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualDesignResponse {
    /// Optical efficiency per sun position, shape (n_days, n_hours).
    pub efficiency: Array2<f64>,
    /// DNI weight per sun position, same shape, when the engine reports it.
    #[serde(default)]
    pub dni: Option<Array2<f64>>,
    /// Ground area occupied by the designed field (m²). Zero when no valid
    /// layout was found.
    pub land_area: f64,
    /// Heliostats kept in the designed field.
    pub n_helios: u32,
    /// Optical efficiency at the design point.
    pub design_efficiency: f64,
    /// Thermal input the designed field delivers at the design point (W).
    pub q_in_rcv: f64,
}

/// Abstraction over field optics engines.
///
/// A single call solves heliostat aim points, traces every sampled sun
/// position and weights the results by the site weather. The call may block
/// for a long time; there is no timeout or cancellation at this level.
pub trait FieldOpticsService: Send + Sync {
    /// Human-readable name of the engine.
    fn name(&self) -> &str;

    /// Design the field and compute its annual optical efficiency table.
    fn design_annual(
        &self,
        request: &AnnualDesignRequest,
    ) -> Result<AnnualDesignResponse, OpticsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_without_dni_deserialises() {
        let json = r#"{
            "efficiency": {"v": 1, "dim": [1, 2], "data": [0.5, 0.6]},
            "land_area": 1200.0,
            "n_helios": 10,
            "design_efficiency": 0.61,
            "q_in_rcv": 4.0e7
        }"#;
        let resp: AnnualDesignResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.efficiency.dim(), (1, 2));
        assert!(resp.dni.is_none());
        assert_eq!(resp.n_helios, 10);
    }

    #[test]
    fn test_sample_daylight() {
        let mut s = SunPositionSample {
            day: 0,
            hour: 0,
            declination_deg: 0.0,
            hour_angle_deg: 0.0,
            elevation_deg: 12.0,
            azimuth_deg: 180.0,
            dni: None,
        };
        assert!(s.is_daylight());
        s.elevation_deg = -3.0;
        assert!(!s.is_daylight());
    }
}
