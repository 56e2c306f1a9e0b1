use std::path::Path;

use log::{info, warn};
use plotters::prelude::*;

use crate::config::SimulationConfig;
use crate::field::{load_csv, FieldSeries};
use crate::plot::{draw_stacked_panels, series_color, Area, LinePanel, FIGURE_SIZE};
use crate::utils::{path_to_str, DynError};

pub const PHI_CSV: &str = "phi.csv";
pub const EX_CSV: &str = "ex.csv";

pub fn density_csv(ispec: usize) -> String {
    format!("rho{}.csv", ispec + 1)
}

/// Species densities, potential and electric field of one run, with the
/// fixed y range of each panel.
pub struct FieldFrames {
    rhos: Vec<FieldSeries>,
    phi: FieldSeries,
    ex: FieldSeries,
    rows: usize,
    grid: Vec<f64>,
}

impl FieldFrames {
    pub fn new(rhos: Vec<FieldSeries>, phi: FieldSeries, ex: FieldSeries) -> Result<Self, DynError> {
        if rhos.is_empty() {
            return Err("At least one species density is required".into());
        }
        let cols = phi.cols();
        if ex.cols() != cols || rhos.iter().any(|r| r.cols() != cols) {
            return Err("Density, potential and field files differ in grid size".into());
        }
        let rows = rhos
            .iter()
            .map(|r| r.rows())
            .chain([phi.rows(), ex.rows()])
            .min()
            .unwrap_or(0);
        let longest = rhos
            .iter()
            .map(|r| r.rows())
            .chain([phi.rows(), ex.rows()])
            .max()
            .unwrap_or(0);
        if rows != longest {
            warn!("field files differ in length; using the first {rows} rows");
        }
        let grid = (0..cols).map(|x| x as f64).collect();
        Ok(Self {
            rhos,
            phi,
            ex,
            rows,
            grid,
        })
    }

    pub fn load(datadir: &Path, nspec: usize) -> Result<Self, DynError> {
        let rhos = (0..nspec)
            .map(|ispec| load_csv(&datadir.join(density_csv(ispec))))
            .collect::<Result<Vec<_>, _>>()?;
        let phi = load_csv(&datadir.join(PHI_CSV))?;
        let ex = load_csv(&datadir.join(EX_CSV))?;
        Self::new(rhos, phi, ex)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn density_range(&self) -> (f64, f64) {
        let lo = self.rhos.iter().map(|r| r.min()).fold(f64::INFINITY, f64::min);
        let hi = self.rhos.iter().map(|r| r.max()).fold(f64::NEG_INFINITY, f64::max);
        (lo, hi)
    }

    pub fn draw_frame(&self, area: &Area<'_>, row: usize, title: &str) -> Result<(), DynError> {
        if row >= self.rows {
            return Err(format!("Row {row} is beyond the {} recorded rows", self.rows).into());
        }
        let densities = self
            .rhos
            .iter()
            .enumerate()
            .map(|(ispec, rho)| (rho.row(row), series_color(ispec), format!("rho{}", ispec + 1)))
            .collect();
        let panels = [
            LinePanel {
                x_vals: &self.grid,
                series: densities,
                caption: None,
                x_label: "grid",
                y_label: "rho",
                y_range: Some(self.density_range()),
            },
            LinePanel {
                x_vals: &self.grid,
                series: vec![(self.phi.row(row), series_color(0), "phi".to_string())],
                caption: None,
                x_label: "grid",
                y_label: "phi",
                y_range: Some((self.phi.min(), self.phi.max())),
            },
            LinePanel {
                x_vals: &self.grid,
                series: vec![(self.ex.row(row), series_color(0), "ex".to_string())],
                caption: None,
                x_label: "grid",
                y_label: "ex",
                y_range: Some((self.ex.min(), self.ex.max())),
            },
        ];
        draw_stacked_panels(area, &panels, Some(title))
    }
}

/// Rows drawn for a given stride; a trailing partial stride is dropped.
pub fn frame_rows(rows: usize, skips: usize) -> Vec<usize> {
    let skips = skips.max(1);
    (0..rows / skips).map(|i| i * skips).collect()
}

/// Frame title: elapsed time and simulation step of an output row.
pub fn frame_title(cfg: &SimulationConfig, row: usize) -> String {
    let istep = row * cfg.output_skips();
    let t = row as f64 * cfg.output_dt();
    format!("{t:16.8} s ({istep} steps)")
}

pub fn run_animation(
    cfg: &SimulationConfig,
    datadir: &Path,
    skips: usize,
    output: &Path,
    delay_ms: u32,
) -> Result<(), DynError> {
    if skips == 0 {
        return Err("skips must be at least 1".into());
    }
    let frames = FieldFrames::load(datadir, cfg.nspec)?;
    let rows = frame_rows(frames.rows(), skips);
    if rows.is_empty() {
        return Err(format!("No frames: {} rows with stride {skips}", frames.rows()).into());
    }
    info!("[fields] {} frames from {} rows", rows.len(), frames.rows());

    let root = BitMapBackend::gif(path_to_str(output)?, FIGURE_SIZE, delay_ms)?.into_drawing_area();
    for (n, &row) in rows.iter().enumerate() {
        frames.draw_frame(&root, row, &frame_title(cfg, row))?;
        root.present()?;
        log::debug!("frame {}/{}", n + 1, rows.len());
    }
    info!("[plot] Wrote {}", output.display());
    Ok(())
}

pub fn run_snapshot(
    cfg: &SimulationConfig,
    datadir: &Path,
    row: usize,
    output: &Path,
) -> Result<(), DynError> {
    let frames = FieldFrames::load(datadir, cfg.nspec)?;
    let root = BitMapBackend::new(path_to_str(output)?, FIGURE_SIZE).into_drawing_area();
    frames.draw_frame(&root, row, &frame_title(cfg, row))?;
    root.present()?;
    info!("[plot] Wrote {}", output.display());
    Ok(())
}
