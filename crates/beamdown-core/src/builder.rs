//! The OELT build pipeline.
//!
//! | Step | Module | Failure |
//! |------|--------|---------|
//! | Validation | [`params`](crate::params) | [`BuildError::Parameter`] |
//! | Cache check | [`cache`](crate::cache) | [`BuildError::Table`] if the table path is not a file; a hit returns immediately |
//! | Derivation | [`derive`](crate::derive) | none |
//! | Parameter record | [`derive`](crate::derive) | [`BuildError::Record`] |
//! | Annual design | [`design`](crate::design) | [`BuildError::Design`], or [`BuildOutcome::Infeasible`] |
//! | Table publish | [`table`](crate::table) | [`BuildError::Table`] |
//!
//! Validation runs before anything touches the case directory, so a rejected
//! parameter set leaves no trace on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use beamdown_optics::FieldOpticsService;
use log::{info, warn};
use thiserror::Error;

use crate::cache::{CacheDecision, CacheGate};
use crate::derive::{derive, persist_parameters, RecordError};
use crate::design::{AnnualOeltOrchestrator, DesignError, FieldDesign};
use crate::params::{validate_and_build, DesignParameters, Overrides, ParameterError};
use crate::table::{write_table, DesignMetadata, TableError};

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Design(DesignError),

    #[error(transparent)]
    Table(TableError),
}

/// How a build ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// A table was already present; nothing was computed.
    Cached(PathBuf),
    /// A new table was written.
    Written { path: PathBuf, design: FieldDesign },
    /// The field design found no valid layout; no table was written.
    Infeasible,
}

impl BuildOutcome {
    /// Path of the table backing this outcome, if any.
    pub fn table_path(&self) -> Option<&Path> {
        match self {
            BuildOutcome::Cached(path) | BuildOutcome::Written { path, .. } => Some(path.as_path()),
            BuildOutcome::Infeasible => None,
        }
    }
}

/// Builds one optical efficiency lookup table per case directory.
pub struct OeltBuilder {
    orchestrator: AnnualOeltOrchestrator,
}

impl OeltBuilder {
    pub fn new(service: Arc<dyn FieldOpticsService>) -> Self {
        Self {
            orchestrator: AnnualOeltOrchestrator::new(service),
        }
    }

    /// Size fields for a different design-point DNI (W/m²).
    pub fn with_design_dni(mut self, dni_design: f64) -> Self {
        self.orchestrator = self.orchestrator.with_design_dni(dni_design);
        self
    }

    /// Validate `overrides` against the defaults and build.
    pub fn run(&self, overrides: &Overrides) -> Result<BuildOutcome, BuildError> {
        let params = validate_and_build(overrides)?;
        self.run_params(&params)
    }

    /// Build from already validated parameters.
    pub fn run_params(&self, params: &DesignParameters) -> Result<BuildOutcome, BuildError> {
        let casedir = params.casedir.as_path();
        let target = match CacheGate::resolve(casedir).map_err(BuildError::Table)? {
            CacheDecision::Reuse(path) => return Ok(BuildOutcome::Cached(path)),
            CacheDecision::Compute => CacheGate::table_path(casedir),
        };

        let effective = derive(params);
        persist_parameters(params, casedir)?;

        info!("Designing field in {}", casedir.display());
        let design = match self.orchestrator.build(&effective) {
            Ok(design) => design,
            Err(DesignError::NoValidGeometry) => {
                warn!("No valid field geometry for {}; no table written", casedir.display());
                return Ok(BuildOutcome::Infeasible);
            }
            Err(e) => return Err(BuildError::Design(e)),
        };

        let meta = DesignMetadata::from_design(&effective, &design);
        match write_table(&design.grid, &meta, &target) {
            Ok(()) => Ok(BuildOutcome::Written { path: target, design }),
            Err(TableError::AlreadyExists(path)) if path.is_file() => {
                info!("Another run published {} first; keeping it", path.display());
                Ok(BuildOutcome::Cached(path))
            }
            Err(TableError::AlreadyExists(path)) => Err(BuildError::Table(TableError::NotAFile(path))),
            Err(e) => Err(BuildError::Table(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamdown_optics::{AnnualDesignRequest, AnnualDesignResponse, OpticsError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Unreachable {
        calls: AtomicUsize,
    }

    impl FieldOpticsService for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn design_annual(&self, _: &AnnualDesignRequest) -> Result<AnnualDesignResponse, OpticsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OpticsError::Unavailable("no engine in unit tests".into()))
        }
    }

    #[test]
    fn test_table_path() {
        let p = PathBuf::from("case/OELT_Solstice.motab");
        assert_eq!(BuildOutcome::Cached(p.clone()).table_path(), Some(p.as_path()));
        assert_eq!(BuildOutcome::Infeasible.table_path(), None);
    }

    #[test]
    fn test_optics_failure_is_a_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let params = DesignParameters::builder()
            .set("casedir", dir.path())
            .unwrap()
            .build();

        let optics = Arc::new(Unreachable::default());
        let err = OeltBuilder::new(optics.clone()).run_params(&params).unwrap_err();
        assert!(matches!(err, BuildError::Design(DesignError::Optics { .. })));
        assert_eq!(optics.calls.load(Ordering::SeqCst), 1);
        assert!(!CacheGate::table_path(dir.path()).exists());
    }

    #[test]
    fn test_directory_at_table_path_fails_before_optics() {
        let dir = tempfile::tempdir().unwrap();
        let table = CacheGate::table_path(dir.path());
        std::fs::create_dir(&table).unwrap();
        let params = DesignParameters::builder()
            .set("casedir", dir.path())
            .unwrap()
            .build();

        let optics = Arc::new(Unreachable::default());
        match OeltBuilder::new(optics.clone()).run_params(&params) {
            Err(BuildError::Table(TableError::NotAFile(path))) => assert_eq!(path, table),
            other => panic!("expected NotAFile, got {:?}", other),
        }
        assert_eq!(optics.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join(crate::derive::PARAMETER_RECORD_FILE_NAME).exists());
    }
}
