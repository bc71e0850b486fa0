//! Sun shape models.
//!
//! The sun is not a point source: rays leave the solar disc with an angular
//! spread that limits how tightly a field can concentrate. Three models are
//! supported by the optics engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SceneError;

/// Which sun shape model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunShapeKind {
    Pillbox,
    Buie,
    Gaussian,
}

impl fmt::Display for SunShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SunShapeKind::Pillbox => "pillbox",
            SunShapeKind::Buie => "buie",
            SunShapeKind::Gaussian => "gaussian",
        })
    }
}

impl FromStr for SunShapeKind {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pillbox" => Ok(SunShapeKind::Pillbox),
            "buie" => Ok(SunShapeKind::Buie),
            "gaussian" => Ok(SunShapeKind::Gaussian),
            _ => Err(SceneError::UnknownSunShape(s.to_string())),
        }
    }
}

/// Angular intensity distribution of the sun, with only the parameters the
/// chosen model reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SunShape {
    /// Uniform disc of the given half-angle.
    Pillbox { half_angle_deg: f64 },
    /// Buie profile parameterised by the circumsolar ratio.
    Buie { csr: f64 },
    /// Gaussian profile with the given standard deviation (mrad).
    Gaussian { std_dev: f64 },
}

impl SunShape {
    /// Select the model and pick its parameter from the full set.
    pub fn from_kind(kind: SunShapeKind, csr: f64, half_angle_deg: f64, std_dev: f64) -> Self {
        match kind {
            SunShapeKind::Pillbox => SunShape::Pillbox { half_angle_deg },
            SunShapeKind::Buie => SunShape::Buie { csr },
            SunShapeKind::Gaussian => SunShape::Gaussian { std_dev },
        }
    }

    pub fn kind(&self) -> SunShapeKind {
        match self {
            SunShape::Pillbox { .. } => SunShapeKind::Pillbox,
            SunShape::Buie { .. } => SunShapeKind::Buie,
            SunShape::Gaussian { .. } => SunShapeKind::Gaussian,
        }
    }
}
