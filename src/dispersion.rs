//! Wavenumber-frequency spectrum of a field snapshot series.
//!
//! The space-time DFT of `data[t, x]` is centered with a cyclic shift, turned
//! into a normalized amplitude map and cropped to a fractional window of the
//! centered map. The window therefore selects a band of frequencies and
//! wavenumbers, not a sub-range of the recorded time or space domain.
//!
//! ```text
//!          w ^
//!            |
//!  ----------+----------> k
//!     (0, 0) |
//!            |
//! ```

use std::f64::consts::PI;

use crate::config::SimulationConfig;
use crate::field::FieldSeries;
use crate::plasma::PlasmaParameters;
use crate::utils::{centered_fftfreq, fftshift_2d, fraction_range, DynError, Fft2Helper};

/// Fractional crop bounds over the centered spectrum, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropWindow {
    pub xstart: f64,
    pub xend: f64,
    pub tstart: f64,
    pub tend: f64,
}

impl CropWindow {
    #[cfg(test)]
    pub const FULL: CropWindow = CropWindow {
        xstart: 0.0,
        xend: 1.0,
        tstart: 0.0,
        tend: 1.0,
    };

    /// `(t_start, t_end, x_start, x_end)` index bounds for a `rows x cols` map.
    pub fn index_bounds(&self, rows: usize, cols: usize) -> (usize, usize, usize, usize) {
        let (t0, t1) = fraction_range(self.tstart, self.tend, rows);
        let (x0, x1) = fraction_range(self.xstart, self.xend, cols);
        (t0, t1, x0, x1)
    }
}

impl Default for CropWindow {
    /// Non-negative frequencies and wavenumbers only.
    fn default() -> Self {
        CropWindow {
            xstart: 0.5,
            xend: 1.0,
            tstart: 0.5,
            tend: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispersionSpectrum {
    /// Normalized amplitude, rows = frequency bins, columns = wavenumber bins
    pub amplitude: FieldSeries,
    /// Angular wavenumber (rad/m), one entry per column
    pub k: Vec<f64>,
    /// Angular frequency divided by `wpe`, one entry per row
    pub w: Vec<f64>,
    /// Electron plasma wave `w/wpe` at each `k`
    pub electron: Vec<f64>,
    /// Ion-acoustic wave `w/wpe` at each `k`
    pub ion: Vec<f64>,
}

/// Centered amplitude map `|F| / (T/2) / (X/2)` of the full input.
pub fn centered_amplitude(data: &FieldSeries) -> Result<FieldSeries, DynError> {
    let (nt, nx) = data.shape();
    if nt == 0 || nx == 0 {
        return Err(format!("Cannot transform an empty {nt}x{nx} field series").into());
    }
    let helper = Fft2Helper::new(nt, nx);
    let spectrum = helper.forward(data.values())?;
    let shifted = fftshift_2d(&spectrum, nt, nx);
    let norm = (nt as f64 / 2.0) * (nx as f64 / 2.0);
    let amplitude: Vec<f64> = shifted.iter().map(|z| z.norm() / norm).collect();
    Ok(FieldSeries::new(nt, nx, amplitude)?)
}

/// Angular wavenumber/frequency axis of an `n`-point transform, centered.
pub fn angular_axis(n: usize, spacing: f64) -> Vec<f64> {
    centered_fftfreq(n, spacing)
        .into_iter()
        .map(|f| f * 2.0 * PI)
        .collect()
}

pub fn compute_dispersion(
    data: &FieldSeries,
    dx: f64,
    dt: f64,
    window: CropWindow,
    plasma: &PlasmaParameters,
) -> Result<DispersionSpectrum, DynError> {
    let amp = centered_amplitude(data)?;
    let (nt, nx) = amp.shape();
    let (t0, t1, x0, x1) = window.index_bounds(nt, nx);
    let amplitude = amp.subsample((t0, t1, 1), (x0, x1, 1));

    let wpe = plasma.wpe();
    let k: Vec<f64> = angular_axis(nx, dx)[x0..x1].to_vec();
    let w: Vec<f64> = angular_axis(nt, dt)[t0..t1]
        .iter()
        .map(|w| w / wpe)
        .collect();

    let electron = k.iter().map(|&k| plasma.electron_dispersion(k) / wpe).collect();
    let ion = k.iter().map(|&k| plasma.ion_dispersion(k) / wpe).collect();

    Ok(DispersionSpectrum {
        amplitude,
        k,
        w,
        electron,
        ion,
    })
}

/// Row and column strides used to thin the recorded field before the
/// transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleStrides {
    pub t_start: usize,
    pub t_end: usize,
    pub t_step: usize,
    pub x_end: usize,
    pub x_step: usize,
}

impl SampleStrides {
    /// Rows `[t_first, min(output_steps, rows))` thinned to about
    /// `nsamples_t` rows; columns `[0, min(ngrid, cols))` thinned to about
    /// `nsamples_x` columns.
    pub fn new(
        (rows, cols): (usize, usize),
        output_steps: usize,
        ngrid: usize,
        t_first: usize,
        nsamples_t: usize,
        nsamples_x: usize,
    ) -> Result<Self, DynError> {
        let t_end = output_steps.min(rows);
        if t_first >= t_end {
            return Err(format!(
                "First row {t_first} leaves no samples: only {t_end} rows are available"
            )
            .into());
        }
        let x_end = ngrid.min(cols);
        if x_end == 0 {
            return Err("Field has no grid columns".into());
        }
        let t_step = ((t_end - t_first) / nsamples_t.max(1)).max(1);
        let nsamples_x = nsamples_x.clamp(1, x_end);
        let x_step = (x_end / nsamples_x).max(1);
        Ok(Self {
            t_start: t_first,
            t_end,
            t_step,
            x_end,
            x_step,
        })
    }

    pub fn apply(&self, data: &FieldSeries) -> FieldSeries {
        data.subsample(
            (self.t_start, self.t_end, self.t_step),
            (0, self.x_end, self.x_step),
        )
    }

    /// `(dx, dt)` between neighbouring samples of the thinned series.
    pub fn spacings(&self, cfg: &SimulationConfig) -> (f64, f64) {
        (
            cfg.dx * self.x_step as f64,
            cfg.sample_dt() * self.t_step as f64,
        )
    }
}
