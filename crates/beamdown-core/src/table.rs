//! Optical efficiency lookup table files.
//!
//! Tables are written in the plain-text `.motab` layout read by Modelica
//! 2-D table blocks: a block of `#` comment lines carrying the design
//! metadata, then one matrix whose first row holds the hour angles, whose
//! first column holds the declinations, and whose interior holds the
//! efficiencies:
//!
//! ```text
//! #1
//! #Field type: surround
//! ...
//! #METADATA,<n_helios>,<A_helio>,<eff_design>,<H_rcv>,<W_rcv>,<H_tower>,<Q_in_rcv>,<A_land>
//! double optics(<rows + 1>, <columns + 1>)
//! 0 <hra_1> ... <hra_n>
//! <dec_1> <eff_11> ... <eff_1n>
//! ```
//!
//! Numbers are printed with the shortest representation that parses back to
//! the same `f64`, so metadata survives a write/read cycle exactly.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use beamdown_geometry::FieldLayout;
use log::info;
use ndarray::Array2;
use thiserror::Error;

use crate::derive::EffectiveParameters;
use crate::design::{FieldDesign, OeltGrid};

/// Aiming strategy tag written by this builder: every heliostat aims at the
/// single upper focus of the secondary reflector.
pub const AIMING_SINGLE: &str = "single";

const TABLE_NAME: &str = "optics";

const METALABELS: &str = "#METALABELS,n_helios,A_helio,eff_design,H_rcv,W_rcv,H_tower,Q_in_rcv,A_land";
const METAUNITS: &str = "##METAUNITS,integer,m2,real,m,m,m,W,m2";

/// Errors while writing or reading a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Table already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Table path is occupied by something other than a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Parse error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Table has no data")]
    Empty,
}

/// Header metadata of a lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMetadata {
    pub field: FieldLayout,
    pub aiming: String,
    pub n_helios: u32,
    /// Reflective area of one heliostat (m²).
    pub a_helio: f64,
    pub eff_design: f64,
    pub h_rcv: f64,
    pub w_rcv: f64,
    pub h_tower: f64,
    /// Thermal input achieved at the design point (W).
    pub q_in_rcv: f64,
    pub a_land: f64,
}

impl DesignMetadata {
    pub fn from_design(params: &EffectiveParameters, design: &FieldDesign) -> Self {
        Self {
            field: params.field.layout.clone(),
            aiming: AIMING_SINGLE.to_string(),
            n_helios: design.n_helios,
            a_helio: params.field.heliostat_width * params.field.heliostat_height,
            eff_design: design.grid.design_efficiency,
            h_rcv: params.receiver.height,
            w_rcv: params.receiver.width,
            h_tower: params.field.tower_height,
            q_in_rcv: design.q_in_rcv,
            a_land: design.grid.land_area,
        }
    }
}

/// Write the header and grid to any sink.
pub fn write_motab<W: Write>(out: &mut W, grid: &OeltGrid, meta: &DesignMetadata) -> io::Result<()> {
    writeln!(out, "#1")?;
    match &meta.field {
        FieldLayout::File(path) => writeln!(out, "#Field file: {}", path.display())?,
        layout => writeln!(out, "#Field type: {}", layout)?,
    }
    writeln!(out, "#Aiming Strategy: {}", meta.aiming)?;
    writeln!(out, "#Number of Heliostats: {}", meta.n_helios)?;
    writeln!(out, "#Heliostat Area: {} m2", meta.a_helio)?;
    writeln!(out, "#Field Design Efficiency: {}", meta.eff_design)?;
    writeln!(out, "#Receiver Height: {} m", meta.h_rcv)?;
    writeln!(out, "#Receiver Width: {} m", meta.w_rcv)?;
    writeln!(out, "#Tower Height: {} m", meta.h_tower)?;
    writeln!(out, "#Receiver Thermal Input: {} W", meta.q_in_rcv)?;
    writeln!(out, "#Land Area: {} m2", meta.a_land)?;
    writeln!(out, "{}", METALABELS)?;
    writeln!(out, "{}", METAUNITS)?;
    writeln!(
        out,
        "#METADATA,{},{},{},{},{},{},{},{}",
        meta.n_helios,
        meta.a_helio,
        meta.eff_design,
        meta.h_rcv,
        meta.w_rcv,
        meta.h_tower,
        meta.q_in_rcv,
        meta.a_land
    )?;

    let (rows, cols) = grid.shape();
    writeln!(out, "double {}({}, {})", TABLE_NAME, rows + 1, cols + 1)?;

    write!(out, "0")?;
    for hra in &grid.hour_angles {
        write!(out, " {}", hra)?;
    }
    writeln!(out)?;

    for (dec, row) in grid.declinations.iter().zip(grid.efficiency.rows()) {
        write!(out, "{}", dec)?;
        for eff in row {
            write!(out, " {}", eff)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Publish a table at `target`.
///
/// The content goes to a temporary file in the same directory, which is
/// synced and then linked into place only if `target` does not exist yet. A
/// failed write leaves nothing at `target`; a lost race returns
/// [`TableError::AlreadyExists`] and keeps the other writer's table.
pub fn write_table(grid: &OeltGrid, meta: &DesignMetadata, target: &Path) -> Result<(), TableError> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".oelt-")
        .suffix(".partial")
        .tempfile_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write_motab(&mut out, grid, meta)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            TableError::AlreadyExists(target.to_path_buf())
        } else {
            TableError::Io(e.error)
        }
    })?;

    info!("Lookup table written to {}", target.display());
    Ok(())
}

/// A lookup table read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    pub meta: DesignMetadata,
    pub declinations: Vec<f64>,
    pub hour_angles: Vec<f64>,
    pub efficiency: Array2<f64>,
}

impl LookupTable {
    /// Bilinear interpolation of the efficiency, clamped to the table edges.
    pub fn efficiency_at(&self, declination_deg: f64, hour_angle_deg: f64) -> f64 {
        let (i0, i1, ti) = bracket(&self.declinations, declination_deg);
        let (j0, j1, tj) = bracket(&self.hour_angles, hour_angle_deg);

        let e00 = self.efficiency[[i0, j0]];
        let e01 = self.efficiency[[i0, j1]];
        let e10 = self.efficiency[[i1, j0]];
        let e11 = self.efficiency[[i1, j1]];

        (1.0 - ti) * ((1.0 - tj) * e00 + tj * e01) + ti * ((1.0 - tj) * e10 + tj * e11)
    }
}

/// Enclosing interval of `x` in the increasing axis `xs`, with the fractional
/// position inside it. Outside the axis the nearest end is used.
fn bracket(xs: &[f64], x: f64) -> (usize, usize, f64) {
    let n = xs.len();
    if n == 1 || x <= xs[0] {
        return (0, 0, 0.0);
    }
    if x >= xs[n - 1] {
        return (n - 1, n - 1, 0.0);
    }

    let mut lo = 0;
    let mut hi = n - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if xs[mid] > x {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (lo, hi, (x - xs[lo]) / (xs[hi] - xs[lo]))
}

/// Parse a table file written by [`write_table`].
pub fn read_table(path: &Path) -> Result<LookupTable, TableError> {
    let content = fs::read_to_string(path)?;
    parse_motab(&content)
}

/// Parse `.motab` content.
pub fn parse_motab(content: &str) -> Result<LookupTable, TableError> {
    let mut field: Option<FieldLayout> = None;
    let mut aiming = String::new();
    let mut metadata: Option<Vec<&str>> = None;
    let mut dims: Option<(usize, usize, usize)> = None;

    let lines: Vec<&str> = content.lines().collect();
    for (idx, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        let lineno = idx + 1;
        if let Some(v) = line.strip_prefix("#Field type:") {
            field = Some(v.trim().parse().map_err(|e| TableError::Format {
                line: lineno,
                message: format!("{}", e),
            })?);
        } else if let Some(v) = line.strip_prefix("#Field file:") {
            field = Some(FieldLayout::File(PathBuf::from(v.trim())));
        } else if let Some(v) = line.strip_prefix("#Aiming Strategy:") {
            aiming = v.trim().to_string();
        } else if let Some(v) = line.strip_prefix("#METADATA,") {
            metadata = Some(v.split(',').map(str::trim).collect());
        } else if line.starts_with("double ") {
            let (rows, cols) = parse_dims(line).ok_or_else(|| TableError::Format {
                line: lineno,
                message: format!("Expected 'double {}(rows, cols)', got '{}'", TABLE_NAME, line),
            })?;
            dims = Some((idx + 1, rows, cols));
            break;
        }
    }

    let (start, rows, cols) = dims.ok_or(TableError::Empty)?;
    if rows < 2 || cols < 2 {
        return Err(TableError::Format {
            line: start,
            message: format!("Table needs at least 2x2 entries, got {}x{}", rows, cols),
        });
    }

    let meta_values = metadata.ok_or_else(|| TableError::Format {
        line: start,
        message: "Missing #METADATA line".into(),
    })?;
    if meta_values.len() != 8 {
        return Err(TableError::Format {
            line: start,
            message: format!("#METADATA has {} values, expected 8", meta_values.len()),
        });
    }
    let real = |k: usize| -> Result<f64, TableError> {
        meta_values[k].parse().map_err(|_| TableError::Format {
            line: start,
            message: format!("Invalid metadata value '{}'", meta_values[k]),
        })
    };
    let meta = DesignMetadata {
        field: field.ok_or_else(|| TableError::Format {
            line: start,
            message: "Missing field type".into(),
        })?,
        aiming,
        n_helios: meta_values[0].parse().map_err(|_| TableError::Format {
            line: start,
            message: format!("Invalid heliostat count '{}'", meta_values[0]),
        })?,
        a_helio: real(1)?,
        eff_design: real(2)?,
        h_rcv: real(3)?,
        w_rcv: real(4)?,
        h_tower: real(5)?,
        q_in_rcv: real(6)?,
        a_land: real(7)?,
    };

    let data_lines: Vec<(usize, &str)> = lines
        .iter()
        .enumerate()
        .skip(start)
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .take(rows)
        .collect();
    if data_lines.len() != rows {
        return Err(TableError::Format {
            line: start,
            message: format!("Header says {} rows but found {}", rows, data_lines.len()),
        });
    }

    let mut matrix = Vec::with_capacity(rows * cols);
    for (lineno, line) in &data_lines {
        let values: Vec<f64> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>().map_err(|_| TableError::Format {
                    line: *lineno,
                    message: format!("Invalid number '{}'", s),
                })
            })
            .collect::<Result<_, _>>()?;
        if values.len() != cols {
            return Err(TableError::Format {
                line: *lineno,
                message: format!("Expected {} values, got {}", cols, values.len()),
            });
        }
        matrix.extend(values);
    }

    let hour_angles = matrix[1..cols].to_vec();
    let declinations: Vec<f64> = (1..rows).map(|i| matrix[i * cols]).collect();
    let efficiency = Array2::from_shape_fn((rows - 1, cols - 1), |(i, j)| matrix[(i + 1) * cols + j + 1]);

    Ok(LookupTable {
        meta,
        declinations,
        hour_angles,
        efficiency,
    })
}

fn parse_dims(line: &str) -> Option<(usize, usize)> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    let mut parts = line.get(open + 1..close)?.split(',');
    let rows = parts.next()?.trim().parse().ok()?;
    let cols = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((rows, cols))
}
