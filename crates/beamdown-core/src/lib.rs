//! # Beam-Down Core
//!
//! Builds the optical efficiency lookup table (OELT) of a beam-down
//! heliostat field: the field is designed once at the design-point DNI and its
//! optical efficiency is tabulated over a declination × hour-angle grid of
//! sun positions, ready for an annual plant simulation to interpolate.
//!
//! ## Architecture
//!
//! [`OeltBuilder`] runs the whole pipeline for one case directory. The ray
//! tracing itself sits behind the
//! [`FieldOpticsService`](beamdown_optics::FieldOpticsService) trait and is
//! called exactly once per computed table.
//!
//! ## Modules
//!
//! - [`params`]: design parameters, defaults and override validation.
//! - [`cache`]: skips case directories that already hold a table.
//! - [`derive`]: auto choices, optical scene and the parameter record.
//! - [`sun`]: annual sun-position grid.
//! - [`design`]: the optics service call and response checks.
//! - [`table`]: `.motab` writer, reader and interpolation.
//! - [`builder`]: the pipeline tying them together.

pub mod builder;
pub mod cache;
pub mod derive;
pub mod design;
pub mod params;
pub mod sun;
pub mod table;

pub use builder::{BuildError, BuildOutcome, OeltBuilder};
pub use cache::{CacheDecision, CacheGate, TABLE_FILE_NAME};
pub use derive::{EffectiveParameters, RecordError, PARAMETER_RECORD_FILE_NAME};
pub use design::{AnnualOeltOrchestrator, DesignError, FieldDesign, OeltGrid};
pub use params::{
    validate_and_build, AutoOr, DesignParameters, Overrides, ParamValue, ParameterError,
};
pub use sun::SunGrid;
pub use table::{read_table, write_table, DesignMetadata, LookupTable, TableError};
