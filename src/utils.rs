use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use num_complex::Complex;
use rayon::prelude::*;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};

pub type DynError = Box<dyn Error + Send + Sync>;

/// Forward 2-D DFT of a real, row-major `rows x cols` array.
///
/// Rows are transformed with a real-to-complex plan, the half spectrum is then
/// transformed along columns, and the negative-wavenumber half is rebuilt from
/// Hermitian symmetry.
pub struct Fft2Helper {
    rows: usize,
    cols: usize,
    forward_r2c: Arc<dyn RealToComplex<f64>>,
    forward_c2c: Arc<dyn Fft<f64>>,
}

impl Fft2Helper {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut planner_r2c = RealFftPlanner::new();
        let mut planner_c2c = FftPlanner::new();

        let forward_r2c = planner_r2c.plan_fft_forward(cols);
        let forward_c2c = planner_c2c.plan_fft_forward(rows);

        Self {
            rows,
            cols,
            forward_r2c,
            forward_c2c,
        }
    }

    fn half_len(&self) -> usize {
        self.cols / 2 + 1
    }

    /// Full (unshifted) spectrum, row-major, same shape as the input.
    pub fn forward(&self, data: &[f64]) -> Result<Vec<Complex<f64>>, DynError> {
        if data.len() != self.rows * self.cols {
            return Err(format!(
                "Input length {} does not match FFT shape {}x{}",
                data.len(),
                self.rows,
                self.cols
            )
            .into());
        }
        if self.rows == 0 || self.cols == 0 {
            return Ok(Vec::new());
        }

        let rows = self.rows;
        let cols = self.cols;
        let half = self.half_len();

        // Step 1: real FFT along space for every time row
        let mut half_spec = vec![Complex::new(0.0, 0.0); rows * half];
        data.par_chunks(cols)
            .zip(half_spec.par_chunks_mut(half))
            .try_for_each(|(row, out)| {
                let mut input = row.to_vec();
                self.forward_r2c.process(&mut input, out)
            })?;

        // Step 2: complex FFT along time for every retained wavenumber
        let mut columns = vec![Complex::new(0.0, 0.0); half * rows];
        for t in 0..rows {
            for k in 0..half {
                columns[k * rows + t] = half_spec[t * half + k];
            }
        }
        columns
            .par_chunks_mut(rows)
            .for_each(|column| self.forward_c2c.process(column));

        // Step 3: F(f, k) = conj(F(-f, -k)) for the missing half
        let mut spectrum = vec![Complex::new(0.0, 0.0); rows * cols];
        for t in 0..rows {
            for k in 0..cols {
                spectrum[t * cols + k] = if k < half {
                    columns[k * rows + t]
                } else {
                    columns[(cols - k) * rows + (rows - t) % rows].conj()
                };
            }
        }
        Ok(spectrum)
    }
}

/// Cyclic shift of both axes by `n / 2` so the zero bin sits at the center.
pub fn fftshift_2d<T: Copy>(values: &[T], rows: usize, cols: usize) -> Vec<T> {
    debug_assert_eq!(values.len(), rows * cols);
    let mut shifted = values.to_vec();
    for t in 0..rows {
        let dest_t = (t + rows / 2) % rows;
        for x in 0..cols {
            let dest_x = (x + cols / 2) % cols;
            shifted[dest_t * cols + dest_x] = values[t * cols + x];
        }
    }
    shifted
}

/// Sample frequencies of an `n`-point DFT with spacing `d`, in shifted order
/// (index 0 is the most negative frequency).
pub fn centered_fftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    let offset = (n / 2) as f64;
    (0..n).map(|i| (i as f64 - offset) * scale).collect()
}

/// `n` evenly spaced points over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

pub fn path_to_str(path: &Path) -> Result<&str, DynError> {
    path.to_str()
        .ok_or_else(|| format!("Path is not valid UTF-8: {}", path.display()).into())
}

/// Fractional bound `[start, end)` of `len` as an index range, clamped so an
/// inverted or out-of-range window yields an empty range instead of a panic.
pub fn fraction_range(start: f64, end: f64, len: usize) -> (usize, usize) {
    let to_index = |frac: f64| -> usize {
        let idx = (frac * len as f64).floor();
        if idx.is_nan() || idx <= 0.0 {
            0
        } else {
            (idx as usize).min(len)
        }
    };
    let lo = to_index(start);
    let hi = to_index(end);
    if hi <= lo {
        (lo, lo)
    } else {
        (lo, hi)
    }
}
