//! Receiver systems.
//!
//! A conventional tower receiver sits at the top of the tower. In the
//! beam-down arrangement the tower instead carries a hyperboloidal secondary
//! reflector that redirects the concentrated light down to a receiver at
//! ground level, behind a compound parabolic concentrator (CPC).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SceneError;

/// Receiver shape family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverKind {
    Flat,
    Cylinder,
    Cavity,
    BeamDown,
}

impl ReceiverKind {
    /// Canonical identifier, as accepted in parameter files.
    pub fn name(&self) -> &'static str {
        match self {
            ReceiverKind::Flat => "flat",
            ReceiverKind::Cylinder => "cylinder",
            ReceiverKind::Cavity => "cavity",
            ReceiverKind::BeamDown => "beam_down",
        }
    }
}

impl fmt::Display for ReceiverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReceiverKind {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(ReceiverKind::Flat),
            "cylinder" => Ok(ReceiverKind::Cylinder),
            "cavity" => Ok(ReceiverKind::Cavity),
            "beam_down" | "beam-down" | "beamdown" => Ok(ReceiverKind::BeamDown),
            _ => Err(SceneError::UnknownReceiver(s.to_string())),
        }
    }
}

/// The absorbing surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Aperture width (m).
    pub width: f64,
    /// Aperture height, or length for a ground-level receiver (m).
    pub height: f64,
    /// Elevation of the aperture centre (m).
    pub elevation: f64,
    /// Surface absorptance in [0, 1].
    pub absorptance: f64,
    /// Number of flux bins along the height.
    pub grid: u32,
}

impl Receiver {
    /// Aperture area (m²).
    pub fn aperture_area(&self) -> f64 {
        self.width * self.height
    }
}

/// Hyperboloidal secondary reflector mounted on the tower.
///
/// `None` for the y rim angle or the inverse eccentricity lets the optics
/// engine size the surface from the field extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryReflector {
    /// Rim angle in the x direction (deg).
    pub rim_angle_x_deg: f64,
    /// Rim angle in the y direction (deg).
    pub rim_angle_y_deg: Option<f64>,
    /// Inverse eccentricity of the hyperboloid.
    pub inv_eccentricity: Option<f64>,
    /// Height of the upper focus, where the heliostats aim (m).
    pub aim_height: f64,
    /// Mirror reflectivity.
    pub reflectivity: f64,
    /// Surface slope error (rad).
    pub slope_error: f64,
}

/// Polygonal compound parabolic concentrator above the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpc {
    /// Number of faces of the polygonal CPC.
    pub n_faces: u32,
    /// Acceptance half-angle (deg).
    pub theta_deg: f64,
    /// Truncation: built height over the ideal full height.
    pub height_ratio: f64,
    /// Number of facets along the height of each face.
    pub n_z: u32,
}

impl Cpc {
    /// Ideal 2-D concentration ratio, $1 / \sin\theta$.
    pub fn concentration_ratio(&self) -> f64 {
        1.0 / self.theta_deg.to_radians().sin()
    }

    /// Entrance half-width for a given exit half-width (m).
    pub fn entrance_half_width(&self, exit_half_width: f64) -> f64 {
        exit_half_width * self.concentration_ratio()
    }

    /// Built height for a given exit half-width (m).
    ///
    /// The ideal CPC height is $(a + a') / \tan\theta$ with entrance
    /// half-width $a$ and exit half-width $a'$; truncation scales it by
    /// `height_ratio`.
    pub fn height(&self, exit_half_width: f64) -> f64 {
        let entrance = self.entrance_half_width(exit_half_width);
        let full = (entrance + exit_half_width) / self.theta_deg.to_radians().tan();
        full * self.height_ratio
    }
}

/// Secondary reflector, CPC and ground receiver of a beam-down system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamDownReceiver {
    pub receiver: Receiver,
    pub secondary: SecondaryReflector,
    pub cpc: Cpc,
}

/// Receiver arrangement handed to the optics service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceiverSystem {
    Flat(Receiver),
    Cylinder(Receiver),
    Cavity(Receiver),
    BeamDown(BeamDownReceiver),
}

impl ReceiverSystem {
    pub fn kind(&self) -> ReceiverKind {
        match self {
            ReceiverSystem::Flat(_) => ReceiverKind::Flat,
            ReceiverSystem::Cylinder(_) => ReceiverKind::Cylinder,
            ReceiverSystem::Cavity(_) => ReceiverKind::Cavity,
            ReceiverSystem::BeamDown(_) => ReceiverKind::BeamDown,
        }
    }

    /// The absorbing surface, whatever optics sit in front of it.
    pub fn receiver(&self) -> &Receiver {
        match self {
            ReceiverSystem::Flat(r) | ReceiverSystem::Cylinder(r) | ReceiverSystem::Cavity(r) => r,
            ReceiverSystem::BeamDown(bd) => &bd.receiver,
        }
    }
}
