//! # Beam-Down Optics
//!
//! Boundary to the field optics service. This crate provides a
//! [`FieldOpticsService`](service::FieldOpticsService) trait that isolates the
//! OELT builder from whichever ray tracer actually designs the field.
//!
//! ## Available services
//!
//! | Service | Feature flag | Transport |
//! |---------|-------------|-----------|
//! | External process | `external` (default) | JSON over stdin/stdout |
//!
//! Tests and embedding applications implement the trait directly.

pub mod service;

#[cfg(feature = "external")]
pub mod external;

pub use service::{
    AnnualDesignRequest, AnnualDesignResponse, FieldOpticsService, OpticsError, SunPositionSample,
};

#[cfg(feature = "external")]
pub use external::ExternalOpticsService;
