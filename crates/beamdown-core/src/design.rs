//! Annual OELT orchestration.
//!
//! One call to the field optics service designs the field at the design-point
//! DNI and tabulates its optical efficiency over the annual sun-position grid.
//! This module prepares that call, checks what comes back, and packages it as
//! a [`FieldDesign`].

use std::sync::Arc;

use beamdown_optics::{AnnualDesignRequest, AnnualDesignResponse, FieldOpticsService, OpticsError};
use log::{info, warn};
use ndarray::Array2;
use thiserror::Error;

use crate::derive::EffectiveParameters;
use crate::sun::SunGrid;

/// Design-point direct normal irradiance used to size the field (W/m²).
pub const DESIGN_DNI: f64 = 900.0;

/// Errors from the orchestration step.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("Field design found no valid heliostat layout (land area is zero)")]
    NoValidGeometry,

    #[error("Optics service returned a {}x{} grid, expected {}x{}", .got.0, .got.1, .expected.0, .expected.1)]
    GridShape {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Invalid optics service response: {0}")]
    InvalidResponse(String),

    #[error("Optics service '{service}' failed: {source}")]
    Optics {
        service: String,
        #[source]
        source: OpticsError,
    },
}

/// Optical efficiency over the sampled sun positions plus field aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct OeltGrid {
    /// Row axis: solar declination per day sample (deg).
    pub declinations: Vec<f64>,
    /// Column axis: hour angle per hour sample (deg).
    pub hour_angles: Vec<f64>,
    /// Collected over incident power, shape (rows, columns).
    pub efficiency: Array2<f64>,
    /// DNI weight per cell (W/m²), when the optics service reports it.
    pub dni: Option<Array2<f64>>,
    /// Ground area of the field (m²).
    pub land_area: f64,
    /// Efficiency at the design point.
    pub design_efficiency: f64,
}

impl OeltGrid {
    pub fn shape(&self) -> (usize, usize) {
        self.efficiency.dim()
    }

    /// DNI-weighted mean efficiency over the year, when weights are known.
    pub fn annual_efficiency(&self) -> Option<f64> {
        let dni = self.dni.as_ref()?;
        let total: f64 = dni.sum();
        if total <= 0.0 {
            return None;
        }
        let weighted: f64 = self.efficiency.iter().zip(dni.iter()).map(|(e, w)| e * w).sum();
        Some(weighted / total)
    }
}

/// Everything the orchestration produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesign {
    pub grid: OeltGrid,
    /// The sampled sun positions, with DNI weights filled in when reported.
    pub sun: SunGrid,
    /// Heliostats kept in the designed field.
    pub n_helios: u32,
    /// Thermal input the field delivers at the design point (W).
    pub q_in_rcv: f64,
}

/// Drives the optics service for one annual design.
pub struct AnnualOeltOrchestrator {
    service: Arc<dyn FieldOpticsService>,
    dni_design: f64,
}

impl AnnualOeltOrchestrator {
    pub fn new(service: Arc<dyn FieldOpticsService>) -> Self {
        Self {
            service,
            dni_design: DESIGN_DNI,
        }
    }

    /// Size the field for a different design-point DNI.
    pub fn with_design_dni(mut self, dni_design: f64) -> Self {
        self.dni_design = dni_design;
        self
    }

    /// The request that [`build`](Self::build) sends.
    pub fn request(&self, params: &EffectiveParameters, sun: &SunGrid) -> AnnualDesignRequest {
        AnnualDesignRequest {
            scene: params.scene(),
            latitude_deg: params.site.latitude,
            casedir: params.casedir.clone(),
            dni_design: self.dni_design,
            n_rays: params.resolution.n_rays,
            n_days: params.resolution.n_days,
            n_hours: params.resolution.n_hours,
            samples: sun.samples.clone(),
            weather_file: params.site.weather_file.clone(),
            q_in_design: params.site.q_in_rcv,
        }
    }

    /// Design the field and tabulate its annual optical efficiency.
    pub fn build(&self, params: &EffectiveParameters) -> Result<FieldDesign, DesignError> {
        let expected = (params.resolution.n_days, params.resolution.n_hours);
        let mut sun = SunGrid::annual(params.site.latitude, expected.0, expected.1);
        let request = self.request(params, &sun);

        if !params.site.weather_file.is_file() {
            warn!(
                "Weather file '{}' not found locally; relying on the optics service to resolve it",
                params.site.weather_file.display()
            );
        }

        info!(
            "Annual design with '{}': {}x{} sun positions ({} in daylight), {} rays each",
            self.service.name(),
            expected.0,
            expected.1,
            sun.daylight_count(),
            params.resolution.n_rays
        );
        let response = self
            .service
            .design_annual(&request)
            .map_err(|source| DesignError::Optics {
                service: self.service.name().to_string(),
                source,
            })?;

        check_response(&response, expected)?;

        if let Some(dni) = &response.dni {
            for s in &mut sun.samples {
                s.dni = Some(dni[[s.day, s.hour]]);
            }
        }

        let grid = OeltGrid {
            declinations: sun.declinations.clone(),
            hour_angles: sun.hour_angles.clone(),
            efficiency: response.efficiency,
            dni: response.dni,
            land_area: response.land_area,
            design_efficiency: response.design_efficiency,
        };
        info!(
            "Field designed: {} heliostats, land area {} m2, design efficiency {}",
            response.n_helios, grid.land_area, grid.design_efficiency
        );
        if let Some(annual) = grid.annual_efficiency() {
            info!("DNI-weighted annual optical efficiency: {:.4}", annual);
        }

        Ok(FieldDesign {
            grid,
            sun,
            n_helios: response.n_helios,
            q_in_rcv: response.q_in_rcv,
        })
    }
}

fn check_response(response: &AnnualDesignResponse, expected: (usize, usize)) -> Result<(), DesignError> {
    if !response.land_area.is_finite() || response.land_area < 0.0 {
        return Err(DesignError::InvalidResponse(format!(
            "land area must be finite and non-negative, got {}",
            response.land_area
        )));
    }
    if response.land_area == 0.0 {
        return Err(DesignError::NoValidGeometry);
    }

    let got = response.efficiency.dim();
    if got != expected {
        return Err(DesignError::GridShape { expected, got });
    }
    if let Some(dni) = &response.dni {
        if dni.dim() != expected {
            return Err(DesignError::InvalidResponse(format!(
                "DNI weights have shape {:?}, expected {:?}",
                dni.dim(),
                expected
            )));
        }
        if let Some(((i, j), w)) = dni.indexed_iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(DesignError::InvalidResponse(format!(
                "DNI weight at ({}, {}) is {}",
                i, j, w
            )));
        }
    }

    if let Some(((i, j), v)) = response.efficiency.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(DesignError::InvalidResponse(format!(
            "efficiency at ({}, {}) is {}",
            i, j, v
        )));
    }
    let outside = response
        .efficiency
        .iter()
        .filter(|v| !(0.0..=1.0).contains(*v))
        .count();
    if outside > 0 {
        warn!("{} efficiency values lie outside [0, 1]", outside);
    }

    for (label, v) in [
        ("design efficiency", response.design_efficiency),
        ("design thermal input", response.q_in_rcv),
    ] {
        if !v.is_finite() {
            return Err(DesignError::InvalidResponse(format!("{} is {}", label, v)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::derive;
    use crate::params::{validate_and_build, Overrides, ParamValue};
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::sync::Mutex;

    /// Returns a fixed response and remembers the last request.
    struct FixedOptics {
        response: AnnualDesignResponse,
        last: Mutex<Option<AnnualDesignRequest>>,
    }

    impl FixedOptics {
        fn new(response: AnnualDesignResponse) -> Arc<Self> {
            Arc::new(Self { response, last: Mutex::new(None) })
        }
    }

    impl FieldOpticsService for FixedOptics {
        fn name(&self) -> &str {
            "fixed"
        }

        fn design_annual(&self, request: &AnnualDesignRequest) -> Result<AnnualDesignResponse, OpticsError> {
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(self.response.clone())
        }
    }

    struct FailingOptics;

    impl FieldOpticsService for FailingOptics {
        fn name(&self) -> &str {
            "failing"
        }

        fn design_annual(&self, _: &AnnualDesignRequest) -> Result<AnnualDesignResponse, OpticsError> {
            Err(OpticsError::Engine("ray budget exhausted".into()))
        }
    }

    fn params_2x3() -> EffectiveParameters {
        let mut o = Overrides::new();
        o.insert("n_row_oelt".into(), ParamValue::Integer(2));
        o.insert("n_col_oelt".into(), ParamValue::Integer(3));
        o.insert("rim_angle_y".into(), ParamValue::Real(-1.0));
        derive(&validate_and_build(&o).unwrap())
    }

    fn response_2x3() -> AnnualDesignResponse {
        AnnualDesignResponse {
            efficiency: array![[0.0, 0.5, 0.0], [0.1, 0.7, 0.1]],
            dni: Some(array![[0.0, 800.0, 0.0], [0.0, 1000.0, 0.0]]),
            land_area: 250_000.0,
            n_helios: 1800,
            design_efficiency: 0.62,
            q_in_rcv: 40.1e6,
        }
    }

    #[test]
    fn test_request_carries_parameters() {
        let service = FixedOptics::new(response_2x3());
        let orch = AnnualOeltOrchestrator::new(service.clone());
        orch.build(&params_2x3()).unwrap();

        let req = service.last.lock().unwrap().clone().unwrap();
        assert_eq!(req.dni_design, DESIGN_DNI);
        assert_eq!((req.n_days, req.n_hours), (2, 3));
        assert_eq!(req.samples.len(), 6);
        assert_eq!(req.n_rays, 5_000_000);
        assert_eq!(req.q_in_design, 40.0e6);
        match req.scene.receiver {
            beamdown_geometry::ReceiverSystem::BeamDown(bd) => {
                assert_eq!(bd.secondary.rim_angle_y_deg, None)
            }
            other => panic!("expected beam-down receiver, got {:?}", other),
        }
    }

    #[test]
    fn test_design_dni_override() {
        let service = FixedOptics::new(response_2x3());
        let orch = AnnualOeltOrchestrator::new(service.clone()).with_design_dni(1000.0);
        orch.build(&params_2x3()).unwrap();
        assert_eq!(service.last.lock().unwrap().as_ref().unwrap().dni_design, 1000.0);
    }

    #[test]
    fn test_grid_and_aggregates() {
        let orch = AnnualOeltOrchestrator::new(FixedOptics::new(response_2x3()));
        let design = orch.build(&params_2x3()).unwrap();

        assert_eq!(design.grid.shape(), (2, 3));
        assert_eq!(design.grid.declinations, vec![-23.45, 23.45]);
        assert_eq!(design.grid.hour_angles, vec![-180.0, 0.0, 180.0]);
        assert_eq!(design.n_helios, 1800);
        assert_eq!(design.q_in_rcv, 40.1e6);
        assert_eq!(design.sun.sample(1, 1).unwrap().dni, Some(1000.0));

        // (0.5 * 800 + 0.7 * 1000) / 1800
        assert_relative_eq!(design.grid.annual_efficiency().unwrap(), 1100.0 / 1800.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_land_area_is_no_valid_geometry() {
        let mut resp = response_2x3();
        resp.land_area = 0.0;
        resp.efficiency = Array2::zeros((0, 0));
        resp.dni = None;
        let orch = AnnualOeltOrchestrator::new(FixedOptics::new(resp));
        assert!(matches!(orch.build(&params_2x3()), Err(DesignError::NoValidGeometry)));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let mut resp = response_2x3();
        resp.efficiency = Array2::zeros((3, 2));
        resp.dni = None;
        let orch = AnnualOeltOrchestrator::new(FixedOptics::new(resp));
        match orch.build(&params_2x3()) {
            Err(DesignError::GridShape { expected, got }) => {
                assert_eq!(expected, (2, 3));
                assert_eq!(got, (3, 2));
            }
            other => panic!("expected GridShape, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_land_area_and_nan_cells_rejected() {
        let mut resp = response_2x3();
        resp.land_area = -5.0;
        let orch = AnnualOeltOrchestrator::new(FixedOptics::new(resp));
        assert!(matches!(orch.build(&params_2x3()), Err(DesignError::InvalidResponse(_))));

        let mut resp = response_2x3();
        resp.efficiency[[1, 2]] = f64::NAN;
        let orch = AnnualOeltOrchestrator::new(FixedOptics::new(resp));
        assert!(matches!(orch.build(&params_2x3()), Err(DesignError::InvalidResponse(_))));
    }

    #[test]
    fn test_bad_dni_weights_rejected() {
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let mut resp = response_2x3();
            if let Some(dni) = resp.dni.as_mut() {
                dni[[0, 1]] = bad;
            }
            let orch = AnnualOeltOrchestrator::new(FixedOptics::new(resp));
            match orch.build(&params_2x3()) {
                Err(DesignError::InvalidResponse(msg)) => assert!(msg.contains("DNI weight"), "{}", msg),
                other => panic!("expected InvalidResponse for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_service_error_is_wrapped() {
        let orch = AnnualOeltOrchestrator::new(Arc::new(FailingOptics));
        match orch.build(&params_2x3()) {
            Err(DesignError::Optics { service, .. }) => assert_eq!(service, "failing"),
            other => panic!("expected Optics error, got {:?}", other),
        }
    }

    #[test]
    fn test_annual_efficiency_without_weights() {
        let mut resp = response_2x3();
        resp.dni = None;
        let design = AnnualOeltOrchestrator::new(FixedOptics::new(resp))
            .build(&params_2x3())
            .unwrap();
        assert!(design.grid.annual_efficiency().is_none());
        assert!(design.sun.samples.iter().all(|s| s.dni.is_none()));
    }
}
