//! Design parameters for one beam-down field/receiver run.
//!
//! Parameters arrive as a mapping of recognised names to loosely typed values
//! (from a TOML job file or command-line overrides) and are applied onto the
//! documented defaults of the reference beam-down scenario. The result,
//! [`DesignParameters`], is an immutable, fully typed value: every name has
//! been recognised and every value coerced before anything else runs.
//!
//! The rim angle in y and the inverse eccentricity of the secondary reflector
//! may be left for the optics engine to choose. On input this is spelled as a
//! negative number (or `"auto"`); inside the crate it is [`AutoOr::Auto`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use beamdown_geometry::{FieldLayout, ReceiverKind, SunShapeKind};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Name-to-value overrides applied onto the defaults.
pub type Overrides = BTreeMap<String, ParamValue>;

/// Errors raised while validating parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("Invalid parameter '{name}': not a recognised design parameter")]
    InvalidParameter { name: String },

    #[error("Parameter '{name}' = {value}: expected {expected}")]
    ParameterType {
        name: String,
        value: String,
        expected: &'static str,
    },
}

impl ParameterError {
    fn type_error(name: &str, value: &ParamValue, expected: &'static str) -> Self {
        ParameterError::ParameterType {
            name: name.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    /// Name of the offending parameter.
    pub fn name(&self) -> &str {
        match self {
            ParameterError::InvalidParameter { name } | ParameterError::ParameterType { name, .. } => name,
        }
    }
}

/// A loosely typed parameter value, before coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Real(f64),
    Integer(i64),
    Text(String),
    Bool(bool),
}

impl ParamValue {
    /// Convert a TOML scalar. Arrays, tables and datetimes are rejected.
    pub fn from_toml(name: &str, value: &toml::Value) -> Result<Self, ParameterError> {
        match value {
            toml::Value::Float(v) => Ok(ParamValue::Real(*v)),
            toml::Value::Integer(v) => Ok(ParamValue::Integer(*v)),
            toml::Value::String(v) => Ok(ParamValue::Text(v.clone())),
            toml::Value::Boolean(v) => Ok(ParamValue::Bool(*v)),
            other => Err(ParameterError::ParameterType {
                name: name.to_string(),
                value: other.to_string(),
                expected: "a scalar value",
            }),
        }
    }

    /// Command-line text stays text; each parameter's coercion decides how to
    /// read it, so `casedir=2024` remains a path and `wea_file=001` keeps its
    /// leading zeros.
    pub fn parse_cli(text: &str) -> Self {
        ParamValue::Text(text.trim().to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Real(v) => write!(f, "{}", v),
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "\"{}\"", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Integer(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Integer(i64::from(v))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<&Path> for ParamValue {
    fn from(v: &Path) -> Self {
        ParamValue::Text(v.display().to_string())
    }
}

/// A value that is either given or left for the optics engine to choose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoOr<T> {
    Auto,
    Set(T),
}

impl<T> AutoOr<T> {
    /// `None` for `Auto`: the form the optics interface expects.
    pub fn into_option(self) -> Option<T> {
        match self {
            AutoOr::Auto => None,
            AutoOr::Set(v) => Some(v),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, AutoOr::Auto)
    }
}

impl<T: Serialize> Serialize for AutoOr<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AutoOr::Auto => serializer.serialize_str("auto"),
            AutoOr::Set(v) => v.serialize(serializer),
        }
    }
}

/// Description of one recognised parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Every recognised parameter name.
pub const PARAMETERS: &[ParameterInfo] = &[
    ParameterInfo { name: "casedir", description: "Output directory of the run" },
    ParameterInfo { name: "wea_file", description: "Weather time series (DNI) used to weight sun positions" },
    ParameterInfo { name: "lat", description: "Site latitude (deg, north positive)" },
    ParameterInfo { name: "Q_in_rcv", description: "Design thermal input to the receiver (W)" },
    ParameterInfo { name: "rcv_type", description: "Receiver type: flat, cylinder, cavity, beam_down" },
    ParameterInfo { name: "W_rcv", description: "Receiver width (m)" },
    ParameterInfo { name: "H_rcv", description: "Receiver height (m)" },
    ParameterInfo { name: "Z_rcv", description: "Receiver elevation (m)" },
    ParameterInfo { name: "alpha_rcv", description: "Receiver absorptance" },
    ParameterInfo { name: "n_H_rcv", description: "Receiver flux bins along the height" },
    ParameterInfo { name: "cpc_nfaces", description: "Number of faces of the polygonal CPC" },
    ParameterInfo { name: "cpc_theta_deg", description: "CPC acceptance half-angle (deg)" },
    ParameterInfo { name: "cpc_h_ratio", description: "CPC truncation ratio" },
    ParameterInfo { name: "cpc_nZ", description: "CPC facets along the height of each face" },
    ParameterInfo { name: "rim_angle_x", description: "Secondary reflector rim angle in x (deg)" },
    ParameterInfo { name: "rim_angle_y", description: "Secondary reflector rim angle in y (deg, negative = auto)" },
    ParameterInfo { name: "secref_inv_eccen", description: "Secondary reflector inverse eccentricity (negative = auto)" },
    ParameterInfo { name: "rho_beamdown", description: "Secondary reflector reflectivity" },
    ParameterInfo { name: "field_type", description: "Field layout: surround, polar, polar-half, multi-aperture, or a .csv file" },
    ParameterInfo { name: "rho_helio", description: "Heliostat reflectivity" },
    ParameterInfo { name: "slope_error", description: "Mirror slope error (rad)" },
    ParameterInfo { name: "W_helio", description: "Heliostat width (m)" },
    ParameterInfo { name: "H_helio", description: "Heliostat height (m)" },
    ParameterInfo { name: "Z_helio", description: "Heliostat pivot elevation (m)" },
    ParameterInfo { name: "n_helios", description: "Candidate heliostat positions generated" },
    ParameterInfo { name: "dsep", description: "Extra separation between heliostats (m)" },
    ParameterInfo { name: "H_tower", description: "Tower height (m)" },
    ParameterInfo { name: "R_tower", description: "Tower radius (m)" },
    ParameterInfo { name: "R1", description: "Radius of the first heliostat row (m)" },
    ParameterInfo { name: "fb", description: "Radial expansion factor of the field" },
    ParameterInfo { name: "sunshape", description: "Sun shape: pillbox, buie, gaussian" },
    ParameterInfo { name: "crs", description: "Circumsolar ratio (buie)" },
    ParameterInfo { name: "half_angle_deg", description: "Sun half-angle (deg, pillbox)" },
    ParameterInfo { name: "std_dev", description: "Sun standard deviation (mrad, gaussian)" },
    ParameterInfo { name: "n_rays", description: "Rays traced per sun position" },
    ParameterInfo { name: "n_row_oelt", description: "Day samples (table rows)" },
    ParameterInfo { name: "n_col_oelt", description: "Hour samples (table columns)" },
];

/// Whether `name` is a recognised parameter.
pub fn is_recognised(name: &str) -> bool {
    PARAMETERS.iter().any(|p| p.name == name)
}

/// Receiver geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverParams {
    pub kind: ReceiverKind,
    pub width: f64,
    pub height: f64,
    pub elevation: f64,
    pub absorptance: f64,
    pub n_height: u32,
}

/// Secondary reflector and CPC.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryParams {
    pub cpc_nfaces: u32,
    pub cpc_theta_deg: f64,
    pub cpc_h_ratio: f64,
    pub cpc_nz: u32,
    pub rim_angle_x: f64,
    pub rim_angle_y: AutoOr<f64>,
    pub inv_eccentricity: AutoOr<f64>,
    pub reflectivity: f64,
}

/// Heliostat field and tower.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldParams {
    pub layout: FieldLayout,
    pub reflectivity: f64,
    pub slope_error: f64,
    pub heliostat_width: f64,
    pub heliostat_height: f64,
    pub heliostat_elevation: f64,
    pub n_helios: u32,
    pub dsep: f64,
    pub tower_height: f64,
    pub tower_radius: f64,
    pub r1: f64,
    pub fb: f64,
}

/// Sun shape model.
#[derive(Debug, Clone, PartialEq)]
pub struct SunParams {
    pub shape: SunShapeKind,
    pub csr: f64,
    pub half_angle_deg: f64,
    pub std_dev: f64,
}

/// Simulation resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionParams {
    pub n_rays: u64,
    pub n_days: usize,
    pub n_hours: usize,
}

/// Site and sizing target.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteParams {
    pub latitude: f64,
    pub weather_file: PathBuf,
    pub q_in_rcv: f64,
}

/// The validated configuration of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignParameters {
    pub casedir: PathBuf,
    pub receiver: ReceiverParams,
    pub secondary: SecondaryParams,
    pub field: FieldParams,
    pub sun: SunParams,
    pub resolution: ResolutionParams,
    pub site: SiteParams,
}

impl Default for DesignParameters {
    /// The reference beam-down scenario: a 40 MW surround field at Leinster,
    /// Western Australia, with a 75 m tower and a four-faced CPC.
    fn default() -> Self {
        Self {
            casedir: PathBuf::from("."),
            receiver: ReceiverParams {
                kind: ReceiverKind::BeamDown,
                width: 1.2,
                height: 10.0,
                elevation: 0.0,
                absorptance: 1.0,
                n_height: 10,
            },
            secondary: SecondaryParams {
                cpc_nfaces: 4,
                cpc_theta_deg: 20.0,
                cpc_h_ratio: 1.0,
                cpc_nz: 20,
                rim_angle_x: 80.0,
                rim_angle_y: AutoOr::Set(80.0),
                inv_eccentricity: AutoOr::Set(0.6),
                reflectivity: 0.95,
            },
            field: FieldParams {
                layout: FieldLayout::Surround,
                reflectivity: 0.9,
                slope_error: 1.0e-3,
                heliostat_width: 6.1,
                heliostat_height: 6.1,
                heliostat_elevation: 0.0,
                n_helios: 1000,
                dsep: 0.0,
                tower_height: 75.0,
                tower_radius: 0.01,
                r1: 15.0,
                fb: 0.7,
            },
            sun: SunParams {
                shape: SunShapeKind::Pillbox,
                csr: 0.01,
                half_angle_deg: 0.2664,
                std_dev: 0.2,
            },
            resolution: ResolutionParams {
                n_rays: 5_000_000,
                n_days: 5,
                n_hours: 22,
            },
            site: SiteParams {
                latitude: -27.85,
                weather_file: PathBuf::new(),
                q_in_rcv: 40.0e6,
            },
        }
    }
}

impl DesignParameters {
    /// Start from the defaults.
    pub fn builder() -> DesignParametersBuilder {
        DesignParametersBuilder::default()
    }

    /// Reflective area of one heliostat (m²).
    pub fn heliostat_area(&self) -> f64 {
        self.field.heliostat_width * self.field.heliostat_height
    }

    /// Every parameter as a name/value pair; feeding this back through
    /// [`validate_and_build`] reproduces `self`.
    pub fn to_overrides(&self) -> Overrides {
        let mut m = Overrides::new();
        let mut put = |k: &str, v: ParamValue| {
            m.insert(k.to_string(), v);
        };
        let auto_or = |v: AutoOr<f64>| match v {
            AutoOr::Auto => ParamValue::Text("auto".into()),
            AutoOr::Set(v) => ParamValue::Real(v),
        };

        put("casedir", self.casedir.as_path().into());
        put("wea_file", self.site.weather_file.as_path().into());
        put("lat", self.site.latitude.into());
        put("Q_in_rcv", self.site.q_in_rcv.into());

        put("rcv_type", self.receiver.kind.name().into());
        put("W_rcv", self.receiver.width.into());
        put("H_rcv", self.receiver.height.into());
        put("Z_rcv", self.receiver.elevation.into());
        put("alpha_rcv", self.receiver.absorptance.into());
        put("n_H_rcv", self.receiver.n_height.into());

        put("cpc_nfaces", self.secondary.cpc_nfaces.into());
        put("cpc_theta_deg", self.secondary.cpc_theta_deg.into());
        put("cpc_h_ratio", self.secondary.cpc_h_ratio.into());
        put("cpc_nZ", self.secondary.cpc_nz.into());
        put("rim_angle_x", self.secondary.rim_angle_x.into());
        put("rim_angle_y", auto_or(self.secondary.rim_angle_y));
        put("secref_inv_eccen", auto_or(self.secondary.inv_eccentricity));
        put("rho_beamdown", self.secondary.reflectivity.into());

        put("field_type", self.field.layout.to_string().into());
        put("rho_helio", self.field.reflectivity.into());
        put("slope_error", self.field.slope_error.into());
        put("W_helio", self.field.heliostat_width.into());
        put("H_helio", self.field.heliostat_height.into());
        put("Z_helio", self.field.heliostat_elevation.into());
        put("n_helios", self.field.n_helios.into());
        put("dsep", self.field.dsep.into());
        put("H_tower", self.field.tower_height.into());
        put("R_tower", self.field.tower_radius.into());
        put("R1", self.field.r1.into());
        put("fb", self.field.fb.into());

        put("sunshape", self.sun.shape.to_string().into());
        put("crs", self.sun.csr.into());
        put("half_angle_deg", self.sun.half_angle_deg.into());
        put("std_dev", self.sun.std_dev.into());

        put("n_rays", integer(self.resolution.n_rays));
        put("n_row_oelt", integer(self.resolution.n_days as u64));
        put("n_col_oelt", integer(self.resolution.n_hours as u64));
        m
    }
}

/// Builds [`DesignParameters`] one recognised name at a time.
#[derive(Debug, Clone, Default)]
pub struct DesignParametersBuilder {
    params: DesignParameters,
}

impl DesignParametersBuilder {
    /// Apply one override.
    pub fn set(mut self, name: &str, value: impl Into<ParamValue>) -> Result<Self, ParameterError> {
        self.apply(name, &value.into())?;
        Ok(self)
    }

    pub fn build(self) -> DesignParameters {
        self.params
    }

    fn apply(&mut self, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
        let p = &mut self.params;
        match name {
            "casedir" => p.casedir = path(name, v)?,
            "wea_file" => p.site.weather_file = path_or_empty(name, v)?,
            "lat" => p.site.latitude = latitude(name, v)?,
            "Q_in_rcv" => p.site.q_in_rcv = positive(name, v)?,

            "rcv_type" => p.receiver.kind = named(name, v, "flat, cylinder, cavity or beam_down")?,
            "W_rcv" => p.receiver.width = positive(name, v)?,
            "H_rcv" => p.receiver.height = positive(name, v)?,
            "Z_rcv" => p.receiver.elevation = real(name, v)?,
            "alpha_rcv" => p.receiver.absorptance = fraction(name, v)?,
            "n_H_rcv" => p.receiver.n_height = count(name, v)?,

            "cpc_nfaces" => p.secondary.cpc_nfaces = count(name, v)?,
            "cpc_theta_deg" => p.secondary.cpc_theta_deg = acceptance_angle(name, v)?,
            "cpc_h_ratio" => p.secondary.cpc_h_ratio = positive(name, v)?,
            "cpc_nZ" => p.secondary.cpc_nz = count(name, v)?,
            "rim_angle_x" => p.secondary.rim_angle_x = real(name, v)?,
            "rim_angle_y" => p.secondary.rim_angle_y = auto_or_real(name, v)?,
            "secref_inv_eccen" => p.secondary.inv_eccentricity = auto_or_real(name, v)?,
            "rho_beamdown" => p.secondary.reflectivity = fraction(name, v)?,

            "field_type" => {
                p.field.layout = named(name, v, "surround, polar, polar-half, multi-aperture or a .csv file")?
            }
            "rho_helio" => p.field.reflectivity = fraction(name, v)?,
            "slope_error" => p.field.slope_error = non_negative(name, v)?,
            "W_helio" => p.field.heliostat_width = positive(name, v)?,
            "H_helio" => p.field.heliostat_height = positive(name, v)?,
            "Z_helio" => p.field.heliostat_elevation = real(name, v)?,
            "n_helios" => p.field.n_helios = count(name, v)?,
            "dsep" => p.field.dsep = non_negative(name, v)?,
            "H_tower" => p.field.tower_height = positive(name, v)?,
            "R_tower" => p.field.tower_radius = non_negative(name, v)?,
            "R1" => p.field.r1 = non_negative(name, v)?,
            "fb" => p.field.fb = positive(name, v)?,

            "sunshape" => p.sun.shape = named(name, v, "pillbox, buie or gaussian")?,
            "crs" => p.sun.csr = non_negative(name, v)?,
            "half_angle_deg" => p.sun.half_angle_deg = positive(name, v)?,
            "std_dev" => p.sun.std_dev = positive(name, v)?,

            "n_rays" => p.resolution.n_rays = count(name, v)?,
            "n_row_oelt" => p.resolution.n_days = grid_axis(name, v)?,
            "n_col_oelt" => p.resolution.n_hours = grid_axis(name, v)?,

            _ => {
                return Err(ParameterError::InvalidParameter {
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// Apply `overrides` onto the defaults.
///
/// All names are checked before any value is coerced, so a misspelt name is
/// reported even when another entry also has a bad value.
pub fn validate_and_build(overrides: &Overrides) -> Result<DesignParameters, ParameterError> {
    if let Some(name) = overrides.keys().find(|k| !is_recognised(k)) {
        return Err(ParameterError::InvalidParameter { name: name.clone() });
    }
    overrides
        .iter()
        .try_fold(DesignParameters::builder(), |b, (name, value)| b.set(name, value.clone()))
        .map(DesignParametersBuilder::build)
}

// ── coercion ────────────────────────────────────────────────────────

fn real(name: &str, v: &ParamValue) -> Result<f64, ParameterError> {
    let x = match v {
        ParamValue::Real(x) => *x,
        ParamValue::Integer(i) => *i as f64,
        ParamValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ParameterError::type_error(name, v, "a finite real number"))?,
        ParamValue::Bool(_) => return Err(ParameterError::type_error(name, v, "a finite real number")),
    };
    if x.is_finite() {
        Ok(x)
    } else {
        Err(ParameterError::type_error(name, v, "a finite real number"))
    }
}

fn positive(name: &str, v: &ParamValue) -> Result<f64, ParameterError> {
    match real(name, v)? {
        x if x > 0.0 => Ok(x),
        _ => Err(ParameterError::type_error(name, v, "a positive real number")),
    }
}

fn non_negative(name: &str, v: &ParamValue) -> Result<f64, ParameterError> {
    match real(name, v)? {
        x if x >= 0.0 => Ok(x),
        _ => Err(ParameterError::type_error(name, v, "a non-negative real number")),
    }
}

fn fraction(name: &str, v: &ParamValue) -> Result<f64, ParameterError> {
    match real(name, v)? {
        x if (0.0..=1.0).contains(&x) => Ok(x),
        _ => Err(ParameterError::type_error(name, v, "a real number in [0, 1]")),
    }
}

fn latitude(name: &str, v: &ParamValue) -> Result<f64, ParameterError> {
    match real(name, v)? {
        x if (-90.0..=90.0).contains(&x) => Ok(x),
        _ => Err(ParameterError::type_error(name, v, "a latitude in [-90, 90] degrees")),
    }
}

fn acceptance_angle(name: &str, v: &ParamValue) -> Result<f64, ParameterError> {
    match real(name, v)? {
        x if x > 0.0 && x < 90.0 => Ok(x),
        _ => Err(ParameterError::type_error(name, v, "an angle in (0, 90) degrees")),
    }
}

fn auto_or_real(name: &str, v: &ParamValue) -> Result<AutoOr<f64>, ParameterError> {
    if let ParamValue::Text(s) = v {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(AutoOr::Auto);
        }
    }
    let x = real(name, v)?;
    Ok(if x < 0.0 { AutoOr::Auto } else { AutoOr::Set(x) })
}

/// Largest number of samples along either axis of the sun-position grid.
pub const MAX_GRID_AXIS: usize = 1000;

/// Integer parameter value. Counts never exceed `i64::MAX`, so this is exact.
fn integer(n: u64) -> ParamValue {
    ParamValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Integral real in [1, i64::MAX].
fn integral(x: f64) -> Option<u64> {
    // i64::MAX as f64 rounds up to 2^63, which is excluded.
    if x.is_finite() && x.fract() == 0.0 && x >= 1.0 && x < i64::MAX as f64 {
        Some(x as u64)
    } else {
        None
    }
}

/// Positive integer no larger than `i64::MAX`, so that it survives the
/// parameter record. Reals are accepted when integral, since TOML writes
/// `5e6` as a float.
fn count<T: TryFrom<u64>>(name: &str, v: &ParamValue) -> Result<T, ParameterError> {
    const EXPECTED: &str = "a positive integer";
    let n: Option<u64> = match v {
        ParamValue::Integer(i) if *i >= 1 => Some(*i as u64),
        ParamValue::Real(x) => integral(*x),
        ParamValue::Text(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) if i >= 1 => Some(i as u64),
                Ok(_) => None,
                Err(_) => s.parse::<f64>().ok().and_then(integral),
            }
        }
        _ => None,
    };
    n.and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| ParameterError::type_error(name, v, EXPECTED))
}

fn grid_axis(name: &str, v: &ParamValue) -> Result<usize, ParameterError> {
    match count::<usize>(name, v)? {
        n if n <= MAX_GRID_AXIS => Ok(n),
        _ => Err(ParameterError::type_error(name, v, "an integer in [1, 1000]")),
    }
}

fn named<T: FromStr>(name: &str, v: &ParamValue, expected: &'static str) -> Result<T, ParameterError> {
    match v {
        ParamValue::Text(s) => s.parse().map_err(|_| ParameterError::type_error(name, v, expected)),
        _ => Err(ParameterError::type_error(name, v, expected)),
    }
}

fn path(name: &str, v: &ParamValue) -> Result<PathBuf, ParameterError> {
    match v {
        ParamValue::Text(s) if !s.trim().is_empty() => Ok(PathBuf::from(s)),
        _ => Err(ParameterError::type_error(name, v, "a non-empty path")),
    }
}

fn path_or_empty(name: &str, v: &ParamValue) -> Result<PathBuf, ParameterError> {
    match v {
        ParamValue::Text(s) => Ok(PathBuf::from(s)),
        _ => Err(ParameterError::type_error(name, v, "a path")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, ParamValue)]) -> Overrides {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_defaults_when_no_overrides() {
        let p = validate_and_build(&Overrides::new()).unwrap();
        assert_eq!(p, DesignParameters::default());
    }

    #[test]
    fn test_override_wins_and_rest_default() {
        let p = validate_and_build(&overrides(&[
            ("H_tower", 90.0.into()),
            ("n_row_oelt", 7.into()),
            ("field_type", "polar".into()),
        ]))
        .unwrap();
        let d = DesignParameters::default();
        assert_eq!(p.field.tower_height, 90.0);
        assert_eq!(p.resolution.n_days, 7);
        assert_eq!(p.field.layout, FieldLayout::Polar);
        assert_eq!(p.field.heliostat_width, d.field.heliostat_width);
        assert_eq!(p.receiver, d.receiver);
        assert_eq!(p.site, d.site);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = validate_and_build(&overrides(&[("not_a_real_param", 1.0.into())])).unwrap_err();
        assert_eq!(
            err,
            ParameterError::InvalidParameter { name: "not_a_real_param".into() }
        );
    }

    #[test]
    fn test_unknown_name_reported_before_bad_value() {
        // "H_tower" sorts before "h_tower" but its bad value must not mask the typo.
        let err = validate_and_build(&overrides(&[
            ("H_tower", "tall".into()),
            ("h_tower", 75.0.into()),
        ]))
        .unwrap_err();
        assert_eq!(err.name(), "h_tower");
        assert!(matches!(err, ParameterError::InvalidParameter { .. }));
    }

    #[test]
    fn test_type_error_names_key_and_value() {
        let err = validate_and_build(&overrides(&[("W_helio", "wide".into())])).unwrap_err();
        match err {
            ParameterError::ParameterType { name, value, .. } => {
                assert_eq!(name, "W_helio");
                assert_eq!(value, "\"wide\"");
            }
            other => panic!("expected ParameterType, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let p = validate_and_build(&overrides(&[("H_tower", "82.5".into())])).unwrap();
        assert_eq!(p.field.tower_height, 82.5);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(validate_and_build(&overrides(&[("Z_rcv", f64::NAN.into())])).is_err());
        assert!(validate_and_build(&overrides(&[("lat", f64::INFINITY.into())])).is_err());
    }

    #[test]
    fn test_counts_accept_integral_reals_only() {
        let p = validate_and_build(&overrides(&[("n_rays", 5e6.into())])).unwrap();
        assert_eq!(p.resolution.n_rays, 5_000_000);

        let err = validate_and_build(&overrides(&[("n_col_oelt", 2.5.into())])).unwrap_err();
        assert!(matches!(err, ParameterError::ParameterType { .. }));

        let err = validate_and_build(&overrides(&[("n_helios", 0.into())])).unwrap_err();
        assert!(matches!(err, ParameterError::ParameterType { .. }));
    }

    #[test]
    fn test_count_overflow_rejected() {
        let err = validate_and_build(&overrides(&[("cpc_nfaces", ParamValue::Integer(1 << 40))]))
            .unwrap_err();
        assert_eq!(err.name(), "cpc_nfaces");
    }

    #[test]
    fn test_negative_means_auto() {
        let p = validate_and_build(&overrides(&[
            ("rim_angle_y", (-1.0).into()),
            ("secref_inv_eccen", (-0.5).into()),
        ]))
        .unwrap();
        assert!(p.secondary.rim_angle_y.is_auto());
        assert!(p.secondary.inv_eccentricity.is_auto());
    }

    #[test]
    fn test_auto_text_and_zero() {
        let p = validate_and_build(&overrides(&[
            ("rim_angle_y", "auto".into()),
            ("secref_inv_eccen", 0.into()),
        ]))
        .unwrap();
        assert_eq!(p.secondary.rim_angle_y, AutoOr::Auto);
        assert_eq!(p.secondary.inv_eccentricity, AutoOr::Set(0.0));
    }

    #[test]
    fn test_enumerations() {
        let p = validate_and_build(&overrides(&[
            ("rcv_type", "cavity".into()),
            ("sunshape", "BUIE".into()),
            ("field_type", "fields/layout.csv".into()),
        ]))
        .unwrap();
        assert_eq!(p.receiver.kind, ReceiverKind::Cavity);
        assert_eq!(p.sun.shape, SunShapeKind::Buie);
        assert!(p.field.layout.is_file());

        let err = validate_and_build(&overrides(&[("rcv_type", 3.into())])).unwrap_err();
        assert_eq!(err.name(), "rcv_type");
    }

    #[test]
    fn test_range_checks() {
        assert!(validate_and_build(&overrides(&[("lat", 91.0.into())])).is_err());
        assert!(validate_and_build(&overrides(&[("rho_helio", 1.2.into())])).is_err());
        assert!(validate_and_build(&overrides(&[("cpc_theta_deg", 90.0.into())])).is_err());
        assert!(validate_and_build(&overrides(&[("W_rcv", 0.0.into())])).is_err());
    }

    #[test]
    fn test_builder_chaining() {
        let p = DesignParameters::builder()
            .set("W_helio", 4.0)
            .and_then(|b| b.set("H_helio", 3.0))
            .unwrap()
            .build();
        assert_eq!(p.heliostat_area(), 12.0);
        assert!(DesignParameters::builder().set("nope", 1.0).is_err());
    }

    #[test]
    fn test_to_overrides_round_trips() {
        let p = validate_and_build(&overrides(&[
            ("rim_angle_y", (-1.0).into()),
            ("casedir", "runs/case_7".into()),
            ("sunshape", "gaussian".into()),
            ("field_type", "multi-aperture".into()),
        ]))
        .unwrap();
        let again = validate_and_build(&p.to_overrides()).unwrap();
        assert_eq!(again, p);
    }

    #[test]
    fn test_every_recognised_name_appears_in_overrides() {
        let all = DesignParameters::default().to_overrides();
        for info in PARAMETERS {
            assert!(all.contains_key(info.name), "missing {}", info.name);
        }
        assert_eq!(all.len(), PARAMETERS.len());
    }

    #[test]
    fn test_parse_cli_keeps_text() {
        assert_eq!(ParamValue::parse_cli(" 22 "), ParamValue::Text("22".into()));
        assert_eq!(ParamValue::parse_cli("001"), ParamValue::Text("001".into()));
        assert_eq!(ParamValue::parse_cli("surround"), ParamValue::Text("surround".into()));
    }

    #[test]
    fn test_command_line_text_coerces_per_parameter() {
        let cli = |pairs: &[(&str, &str)]| -> Overrides {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), ParamValue::parse_cli(v)))
                .collect()
        };
        let p = validate_and_build(&cli(&[
            ("casedir", "2024"),
            ("wea_file", "001"),
            ("n_rays", "5e6"),
            ("n_row_oelt", "7"),
            ("H_tower", "82.5"),
            ("rim_angle_y", "-1"),
        ]))
        .unwrap();
        assert_eq!(p.casedir, PathBuf::from("2024"));
        assert_eq!(p.site.weather_file, PathBuf::from("001"));
        assert_eq!(p.resolution.n_rays, 5_000_000);
        assert_eq!(p.resolution.n_days, 7);
        assert_eq!(p.field.tower_height, 82.5);
        assert_eq!(p.secondary.rim_angle_y, AutoOr::Auto);

        for bad in ["2.5", "0", "-3", "many"] {
            let err = validate_and_build(&cli(&[("n_rays", bad)])).unwrap_err();
            assert_eq!(err.name(), "n_rays", "{}", bad);
        }
    }

    #[test]
    fn test_huge_ray_count_rejected() {
        let err = validate_and_build(&overrides(&[("n_rays", 1e19.into())])).unwrap_err();
        assert!(matches!(err, ParameterError::ParameterType { .. }));

        let p = validate_and_build(&overrides(&[("n_rays", ParamValue::Integer(i64::MAX))])).unwrap();
        assert_eq!(p.to_overrides()["n_rays"], ParamValue::Integer(i64::MAX));
        assert_eq!(validate_and_build(&p.to_overrides()).unwrap(), p);
    }

    #[test]
    fn test_grid_axes_are_bounded() {
        let p = validate_and_build(&overrides(&[
            ("n_row_oelt", ParamValue::Integer(1000)),
            ("n_col_oelt", ParamValue::Integer(1000)),
        ]))
        .unwrap();
        assert_eq!((p.resolution.n_days, p.resolution.n_hours), (1000, 1000));

        for name in ["n_row_oelt", "n_col_oelt"] {
            let err = validate_and_build(&overrides(&[(name, ParamValue::Integer(1001))])).unwrap_err();
            assert_eq!(err.name(), name);
            let err = validate_and_build(&overrides(&[(name, ParamValue::Integer(i64::MAX))])).unwrap_err();
            assert_eq!(err.name(), name);
        }
    }
}
