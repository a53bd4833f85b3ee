//! Reader for the simulator's track file (`evolve.dat`).
//!
//! # File Format
//!
//! ```text
//!  Time  stage  M0  M  log10(L)  log10(R)  log10(Teff)  Mc  Menv  epoch  spin
//!  0.0000  1  5.000  5.000  2.7430  0.4304  4.2370 ...
//!  ...
//! ```
//!
//! The first non-blank line that is not a `#` comment names the columns; every
//! following non-blank line holds one numeric cell per column.

use std::path::Path;
use thiserror::Error;

/// Column plotted on the x axis of the HR diagram.
pub const TEFF_COLUMN: &str = "log10(Teff)";
/// Column plotted on the y axis of the HR diagram.
pub const LUMINOSITY_COLUMN: &str = "log10(L)";

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Line {line} has {actual} cells, expected {expected}")]
    Ragged {
        line: usize,
        actual: usize,
        expected: usize,
    },

    #[error("Track file contains no data")]
    Empty,

    #[error("Track file has no column named {0}")]
    MissingColumn(String),
}

/// Ordered table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl TrackTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the named column in row order.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, TrackError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TrackError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// (x, y) pairs for an HR diagram.
    pub fn hr_points(&self) -> Result<Vec<(f64, f64)>, TrackError> {
        let x = self.column(TEFF_COLUMN)?;
        let y = self.column(LUMINOSITY_COLUMN)?;
        Ok(x.into_iter().zip(y).collect())
    }
}

pub fn parse_track(text: &str) -> Result<TrackTable, TrackError> {
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let cells: Vec<&str> = trimmed.split_whitespace().collect();
        let Some(header) = columns.as_ref() else {
            columns = Some(cells.iter().map(|c| c.to_string()).collect());
            continue;
        };
        if cells.len() != header.len() {
            return Err(TrackError::Ragged {
                line: line_no,
                actual: cells.len(),
                expected: header.len(),
            });
        }
        let row = cells
            .iter()
            .map(|c| {
                c.parse::<f64>().map_err(|e| TrackError::Parse {
                    line: line_no,
                    message: format!("{c:?}: {e}"),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }

    match columns {
        Some(columns) if !rows.is_empty() => Ok(TrackTable { columns, rows }),
        _ => Err(TrackError::Empty),
    }
}

pub fn read_track(path: &Path) -> Result<TrackTable, TrackError> {
    let text = std::fs::read_to_string(path)?;
    parse_track(&text)
}
