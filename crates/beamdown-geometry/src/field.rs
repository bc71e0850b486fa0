//! Heliostat field description.
//!
//! The field is described by rules rather than positions: a layout family,
//! the heliostat module, the tower, and the radial spacing parameters. The
//! optics service expands these into heliostat positions and then trims the
//! field down to the design thermal input. A `.csv` layout file bypasses the
//! generator and supplies positions directly.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SceneError;

/// Layout family of the heliostat field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FieldLayout {
    /// Radial stagger all around the tower.
    Surround,
    /// Radial stagger on the pole-facing side.
    Polar,
    /// Polar field restricted to a half plane.
    PolarHalf,
    /// Several sub-fields, one per receiver aperture.
    MultiAperture,
    /// Heliostat positions read from a CSV file.
    File(PathBuf),
}

impl FieldLayout {
    /// Whether the field comes from a layout file rather than a generator.
    pub fn is_file(&self) -> bool {
        matches!(self, FieldLayout::File(_))
    }
}

impl fmt::Display for FieldLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldLayout::Surround => f.write_str("surround"),
            FieldLayout::Polar => f.write_str("polar"),
            FieldLayout::PolarHalf => f.write_str("polar-half"),
            FieldLayout::MultiAperture => f.write_str("multi-aperture"),
            FieldLayout::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for FieldLayout {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.to_ascii_lowercase().ends_with(".csv") {
            return Ok(FieldLayout::File(PathBuf::from(trimmed)));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "surround" => Ok(FieldLayout::Surround),
            "polar" => Ok(FieldLayout::Polar),
            "polar-half" | "polar_half" => Ok(FieldLayout::PolarHalf),
            "multi-aperture" | "multi_aperture" => Ok(FieldLayout::MultiAperture),
            _ => Err(SceneError::UnknownFieldLayout(s.to_string())),
        }
    }
}

impl From<FieldLayout> for String {
    fn from(layout: FieldLayout) -> Self {
        layout.to_string()
    }
}

impl TryFrom<String> for FieldLayout {
    type Error = SceneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single heliostat module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heliostat {
    /// Mirror width (m).
    pub width: f64,
    /// Mirror height (m).
    pub height: f64,
    /// Pivot elevation above ground (m).
    pub elevation: f64,
    /// Mirror reflectivity.
    pub reflectivity: f64,
    /// Surface slope error (rad).
    pub slope_error: f64,
}

impl Heliostat {
    /// Reflective area of one heliostat (m²).
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// The central tower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tower {
    /// Height (m).
    pub height: f64,
    /// Radius, used for tower shading (m).
    pub radius: f64,
}

/// Heliostat field generation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeliostatField {
    pub layout: FieldLayout,
    pub heliostat: Heliostat,
    pub tower: Tower,
    /// Number of candidate positions generated before trimming.
    pub n_candidates: u32,
    /// Radius of the first heliostat row (m).
    pub r1: f64,
    /// Radial expansion factor between zones.
    pub fb: f64,
    /// Extra separation between neighbouring heliostats (m).
    pub dsep: f64,
    /// Half-extent of the field in x (m).
    pub x_max: f64,
    /// Half-extent of the field in y (m).
    pub y_max: f64,
}

impl HeliostatField {
    /// Mirror area of all candidate positions (m²).
    pub fn candidate_mirror_area(&self) -> f64 {
        self.heliostat.area() * f64::from(self.n_candidates)
    }

    /// Ground area of the bounding rectangle the generator may fill (m²).
    pub fn bounding_area(&self) -> f64 {
        4.0 * self.x_max * self.y_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout_names_round_trip() {
        for layout in [
            FieldLayout::Surround,
            FieldLayout::Polar,
            FieldLayout::PolarHalf,
            FieldLayout::MultiAperture,
        ] {
            let parsed: FieldLayout = layout.to_string().parse().unwrap();
            assert_eq!(parsed, layout);
        }
    }

    #[test]
    fn test_csv_layout_is_a_file() {
        let layout: FieldLayout = "layouts/field_12k.CSV".parse().unwrap();
        assert!(layout.is_file());
        assert_eq!(layout, FieldLayout::File(PathBuf::from("layouts/field_12k.CSV")));
    }

    #[test]
    fn test_unknown_layout_is_rejected() {
        let err = "spiral".parse::<FieldLayout>().unwrap_err();
        assert_eq!(err, SceneError::UnknownFieldLayout("spiral".into()));
    }

    #[test]
    fn test_layout_serialises_as_string() {
        let json = serde_json::to_string(&FieldLayout::PolarHalf).unwrap();
        assert_eq!(json, "\"polar-half\"");
        let back: FieldLayout = serde_json::from_str("\"surround\"").unwrap();
        assert_eq!(back, FieldLayout::Surround);
    }

    #[test]
    fn test_heliostat_area() {
        let h = Heliostat {
            width: 6.1,
            height: 6.1,
            elevation: 0.0,
            reflectivity: 0.9,
            slope_error: 1e-3,
        };
        assert_relative_eq!(h.area(), 37.21, epsilon = 1e-12);
    }

    #[test]
    fn test_field_areas() {
        let field = HeliostatField {
            layout: FieldLayout::Surround,
            heliostat: Heliostat {
                width: 10.0,
                height: 5.0,
                elevation: 0.0,
                reflectivity: 0.9,
                slope_error: 1e-3,
            },
            tower: Tower { height: 75.0, radius: 0.01 },
            n_candidates: 400,
            r1: 15.0,
            fb: 0.7,
            dsep: 0.0,
            x_max: 150.0,
            y_max: 100.0,
        };
        assert_relative_eq!(field.candidate_mirror_area(), 20_000.0);
        assert_relative_eq!(field.bounding_area(), 60_000.0);
    }
}
