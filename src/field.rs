use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use log::{debug, warn};
use thiserror::Error;

/// Overflow markers written by the simulation when a value does not fit the
/// Fortran edit descriptor (10 to 19 asterisks).
const OVERFLOW_MARKER_MIN: usize = 10;
const OVERFLOW_MARKER_MAX: usize = 19;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: row {row}, column {column}: cannot parse {value:?} as a number")]
    NotNumeric {
        path: String,
        row: usize,
        column: usize,
        value: String,
    },

    #[error("{path}: row {row} has {found} columns, expected {expected}")]
    Ragged {
        path: String,
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Time series of field snapshots: one row per output step, one column per
/// grid cell (or per species for the tabulated diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSeries {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FieldSeries {
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self, String> {
        if values.len() != rows * cols {
            return Err(format!(
                "{} values do not fill a {rows}x{cols} series",
                values.len()
            ));
        }
        Ok(Self { rows, cols, values })
    }

    #[cfg(test)]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    /// Build from a sample function `f(t, x)`.
    #[cfg(test)]
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(rows * cols);
        for t in 0..rows {
            for x in 0..cols {
                values.push(f(t, x));
            }
        }
        Self { rows, cols, values }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, t: usize, x: usize) -> f64 {
        self.values[t * self.cols + x]
    }

    pub fn row(&self, t: usize) -> &[f64] {
        &self.values[t * self.cols..(t + 1) * self.cols]
    }

    pub fn column(&self, x: usize) -> Vec<f64> {
        (0..self.rows).map(|t| self.get(t, x)).collect()
    }

    pub fn min(&self) -> f64 {
        self.values.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Strided window `rows[t0..t1; dt_step] x cols[x0..x1; dx_step]`.
    /// Bounds are clamped to the series shape.
    pub fn subsample(
        &self,
        (t0, t1, t_step): (usize, usize, usize),
        (x0, x1, x_step): (usize, usize, usize),
    ) -> Self {
        let t1 = t1.min(self.rows);
        let x1 = x1.min(self.cols);
        let t_step = t_step.max(1);
        let x_step = x_step.max(1);
        let row_idx: Vec<usize> = (t0.min(t1)..t1).step_by(t_step).collect();
        let col_idx: Vec<usize> = (x0.min(x1)..x1).step_by(x_step).collect();
        let mut values = Vec::with_capacity(row_idx.len() * col_idx.len());
        for &t in &row_idx {
            for &x in &col_idx {
                values.push(self.get(t, x));
            }
        }
        Self {
            rows: row_idx.len(),
            cols: col_idx.len(),
            values,
        }
    }
}

fn is_overflow_marker(cell: &str) -> bool {
    (OVERFLOW_MARKER_MIN..=OVERFLOW_MARKER_MAX).contains(&cell.len()) && cell.bytes().all(|b| b == b'*')
}

/// Parse headerless numeric CSV text. Overflow markers become `0.0`; the
/// returned flag reports whether any were replaced.
pub fn parse_csv<R: Read>(reader: R, label: &str) -> Result<(FieldSeries, bool), LoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut values = Vec::new();
    let mut rows = 0usize;
    let mut cols: Option<usize> = None;
    let mut replaced = false;

    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|source| LoadError::Csv {
            path: label.to_string(),
            source,
        })?;
        // Fortran writers may leave a trailing separator
        let mut fields: Vec<&str> = record.iter().collect();
        if fields.len() > 1 && fields.last().map_or(false, |f| f.is_empty()) {
            fields.pop();
        }
        if fields.len() == 1 && fields[0].is_empty() {
            continue;
        }
        let expected = *cols.get_or_insert(fields.len());
        if fields.len() != expected {
            return Err(LoadError::Ragged {
                path: label.to_string(),
                row: row + 1,
                found: fields.len(),
                expected,
            });
        }
        for (column, cell) in fields.iter().enumerate() {
            let value = if is_overflow_marker(cell) {
                replaced = true;
                0.0
            } else {
                cell.parse::<f64>().map_err(|_| LoadError::NotNumeric {
                    path: label.to_string(),
                    row: row + 1,
                    column: column + 1,
                    value: cell.to_string(),
                })?
            };
            values.push(value);
        }
        rows += 1;
    }

    let series = FieldSeries {
        rows,
        cols: cols.unwrap_or(0),
        values,
    };
    Ok((series, replaced))
}

pub fn load_csv(path: &Path) -> Result<FieldSeries, LoadError> {
    let label = path.display().to_string();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: label.clone(),
        source,
    })?;
    let (series, replaced) = parse_csv(file, &label)?;
    if replaced {
        warn!("[{label}] overflow markers \"*+\" found, replaced with 0");
    }
    debug!("loaded {label}: {}x{}", series.rows(), series.cols());
    Ok(series)
}
