//! Optics service running as a child process.
//!
//! The child receives one [`AnnualDesignRequest`] as JSON on stdin and must
//! print one [`AnnualDesignResponse`] as JSON on stdout before exiting with
//! status zero. This keeps the ray tracer (typically a Python wrapper around
//! a Monte-Carlo engine) out of process.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::service::{AnnualDesignRequest, AnnualDesignResponse, FieldOpticsService, OpticsError};

/// Optics service that shells out to an external program.
#[derive(Debug, Clone)]
pub struct ExternalOpticsService {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ExternalOpticsService {
    /// Create a service that runs `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append command-line arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the child in `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl FieldOpticsService for ExternalOpticsService {
    fn name(&self) -> &str {
        &self.program
    }

    fn design_annual(
        &self,
        request: &AnnualDesignRequest,
    ) -> Result<AnnualDesignResponse, OpticsError> {
        let payload = serde_json::to_vec(request)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        info!(
            "Launching optics service '{}' ({} sun positions, {} rays each)",
            self.program,
            request.samples.len(),
            request.n_rays
        );
        let mut child = command.spawn().map_err(|source| OpticsError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Feed stdin from a separate thread so a chatty child cannot deadlock
        // on a full stdout pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OpticsError::Unavailable("child stdin was not captured".into()))?;
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            stdin.write_all(&payload)?;
            stdin.flush()
        });

        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(result) => {
                // A child that exits without reading its input closes the pipe;
                // its exit status is the more useful diagnostic.
                if let Err(e) = result {
                    debug!("Optics service closed stdin early: {}", e);
                }
            }
            Err(_) => {
                return Err(OpticsError::Unavailable("stdin writer thread panicked".into()));
            }
        }

        if !output.status.success() {
            return Err(OpticsError::ServiceFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let response: AnnualDesignResponse = serde_json::from_slice(&output.stdout)?;
        debug!(
            "Optics service returned {:?} efficiency grid, land area {} m2",
            response.efficiency.dim(),
            response.land_area
        );
        Ok(response)
    }
}
