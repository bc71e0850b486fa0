//! Derived parameters and the optical scene.
//!
//! [`derive`] collapses the "auto" choices of the secondary reflector into the
//! optional values the optics interface takes, and [`EffectiveParameters::scene`]
//! assembles the receiver system, heliostat field and sun shape that are
//! shipped to the optics service. The raw parameters are recorded in the case
//! directory before any expensive work starts.

use std::path::{Path, PathBuf};

use beamdown_geometry::{
    BeamDownReceiver, Cpc, Heliostat, HeliostatField, Receiver, ReceiverKind, ReceiverSystem, Scene,
    SecondaryReflector, SunShape, Tower,
};
use log::{debug, info};
use thiserror::Error;

use crate::params::{
    DesignParameters, FieldParams, Overrides, ParamValue, ParameterError, ReceiverParams,
    ResolutionParams, SiteParams, SunParams,
};

/// File name of the parameter record inside a case directory.
pub const PARAMETER_RECORD_FILE_NAME: &str = "simulated_parameters.toml";

/// Half-extent of the area the field generator may fill, in x and y (m).
pub const FIELD_HALF_EXTENT: f64 = 150.0;

/// Errors while writing or reading the parameter record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error on parameter record: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialise parameter record: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to parse parameter record: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// Secondary reflector and CPC with the auto choices resolved to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSecondary {
    pub cpc_nfaces: u32,
    pub cpc_theta_deg: f64,
    pub cpc_h_ratio: f64,
    pub cpc_nz: u32,
    pub rim_angle_x: f64,
    pub rim_angle_y: Option<f64>,
    pub inv_eccentricity: Option<f64>,
    pub reflectivity: f64,
}

/// Parameters in the form the orchestrator consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveParameters {
    pub casedir: PathBuf,
    pub receiver: ReceiverParams,
    pub secondary: EffectiveSecondary,
    pub field: FieldParams,
    pub sun: SunParams,
    pub resolution: ResolutionParams,
    pub site: SiteParams,
}

/// Resolve the auto choices. This is the only place they are interpreted.
pub fn derive(raw: &DesignParameters) -> EffectiveParameters {
    let s = &raw.secondary;
    let secondary = EffectiveSecondary {
        cpc_nfaces: s.cpc_nfaces,
        cpc_theta_deg: s.cpc_theta_deg,
        cpc_h_ratio: s.cpc_h_ratio,
        cpc_nz: s.cpc_nz,
        rim_angle_x: s.rim_angle_x,
        rim_angle_y: s.rim_angle_y.into_option(),
        inv_eccentricity: s.inv_eccentricity.into_option(),
        reflectivity: s.reflectivity,
    };
    debug!(
        "Secondary reflector: rim_angle_y={:?}, inv_eccentricity={:?}",
        secondary.rim_angle_y, secondary.inv_eccentricity
    );

    EffectiveParameters {
        casedir: raw.casedir.clone(),
        receiver: raw.receiver.clone(),
        secondary,
        field: raw.field.clone(),
        sun: raw.sun.clone(),
        resolution: raw.resolution.clone(),
        site: raw.site.clone(),
    }
}

impl EffectiveParameters {
    /// Assemble the optical scene.
    pub fn scene(&self) -> Scene {
        let receiver = Receiver {
            width: self.receiver.width,
            height: self.receiver.height,
            elevation: self.receiver.elevation,
            absorptance: self.receiver.absorptance,
            grid: self.receiver.n_height,
        };

        let receiver = match self.receiver.kind {
            ReceiverKind::Flat => ReceiverSystem::Flat(receiver),
            ReceiverKind::Cylinder => ReceiverSystem::Cylinder(receiver),
            ReceiverKind::Cavity => ReceiverSystem::Cavity(receiver),
            ReceiverKind::BeamDown => {
                let cpc = Cpc {
                    n_faces: self.secondary.cpc_nfaces,
                    theta_deg: self.secondary.cpc_theta_deg,
                    height_ratio: self.secondary.cpc_h_ratio,
                    n_z: self.secondary.cpc_nz,
                };
                debug!(
                    "CPC: concentration {:.3}, height {:.3} m",
                    cpc.concentration_ratio(),
                    cpc.height(0.5 * receiver.width)
                );
                ReceiverSystem::BeamDown(BeamDownReceiver {
                    receiver,
                    secondary: SecondaryReflector {
                        rim_angle_x_deg: self.secondary.rim_angle_x,
                        rim_angle_y_deg: self.secondary.rim_angle_y,
                        inv_eccentricity: self.secondary.inv_eccentricity,
                        aim_height: self.field.tower_height,
                        reflectivity: self.secondary.reflectivity,
                        slope_error: self.field.slope_error,
                    },
                    cpc,
                })
            }
        };

        let field = HeliostatField {
            layout: self.field.layout.clone(),
            heliostat: Heliostat {
                width: self.field.heliostat_width,
                height: self.field.heliostat_height,
                elevation: self.field.heliostat_elevation,
                reflectivity: self.field.reflectivity,
                slope_error: self.field.slope_error,
            },
            tower: Tower {
                height: self.field.tower_height,
                radius: self.field.tower_radius,
            },
            n_candidates: self.field.n_helios,
            r1: self.field.r1,
            fb: self.field.fb,
            dsep: self.field.dsep,
            x_max: FIELD_HALF_EXTENT,
            y_max: FIELD_HALF_EXTENT,
        };
        debug!(
            "Field: {} candidates, {:.0} m2 of mirror over a {:.0} m2 bounding area",
            field.n_candidates,
            field.candidate_mirror_area(),
            field.bounding_area()
        );

        let sun = SunShape::from_kind(
            self.sun.shape,
            self.sun.csr,
            self.sun.half_angle_deg,
            self.sun.std_dev,
        );

        Scene { receiver, field, sun }
    }
}

/// Record the raw parameters in `casedir`, creating it if needed.
pub fn persist_parameters(raw: &DesignParameters, casedir: &Path) -> Result<PathBuf, RecordError> {
    std::fs::create_dir_all(casedir)?;
    let path = casedir.join(PARAMETER_RECORD_FILE_NAME);

    let body = toml::to_string(&raw.to_overrides())?;
    std::fs::write(&path, format!("# Design parameters of this case\n{}", body))?;

    info!("Parameters recorded in {}", path.display());
    Ok(path)
}

/// Read a parameter record back as overrides.
pub fn read_parameter_record(path: &Path) -> Result<Overrides, RecordError> {
    let content = std::fs::read_to_string(path)?;
    let table: toml::Table = toml::from_str(&content)?;
    let mut overrides = Overrides::new();
    for (name, value) in &table {
        overrides.insert(name.clone(), ParamValue::from_toml(name, value)?);
    }
    Ok(overrides)
}
