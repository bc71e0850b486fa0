//! # Beam-Down Geometry
//!
//! Scene description for a beam-down concentrating solar field. This crate
//! provides:
//!
//! - **Receiver systems** ([`receiver`]): Flat, cylindrical and cavity
//!   receivers, and the beam-down arrangement of a secondary reflector feeding
//!   a ground-level compound parabolic concentrator (CPC).
//! - **Heliostat fields** ([`field`]): Layout family, heliostat module, tower
//!   and spacing rules.
//! - **Sun shapes** ([`sun`]): Angular intensity models of the solar disc.
//!
//! All types are plain serde data: the scene is assembled by the OELT builder
//! and shipped unchanged to the field optics service.

pub mod field;
pub mod receiver;
pub mod sun;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use field::{FieldLayout, Heliostat, HeliostatField, Tower};
pub use receiver::{BeamDownReceiver, Cpc, Receiver, ReceiverKind, ReceiverSystem, SecondaryReflector};
pub use sun::{SunShape, SunShapeKind};

/// Errors when interpreting scene identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("Unknown receiver type '{0}'. Valid types: flat, cylinder, cavity, beam_down")]
    UnknownReceiver(String),

    #[error("Unknown field type '{0}'. Valid types: surround, polar, polar-half, multi-aperture, or a .csv layout file")]
    UnknownFieldLayout(String),

    #[error("Unknown sun shape '{0}'. Valid shapes: pillbox, buie, gaussian")]
    UnknownSunShape(String),
}

/// A complete optical scene: what the field optics service traces rays through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub receiver: ReceiverSystem,
    pub field: HeliostatField,
    pub sun: SunShape,
}
