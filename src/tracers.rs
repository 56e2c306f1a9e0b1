use std::path::{Path, PathBuf};

use log::info;

use crate::config::SimulationConfig;
use crate::field::{load_csv, FieldSeries};
use crate::plot::{plot_stacked_panels, series_color, LinePanel};
use crate::utils::{linspace, path_to_str, DynError};

pub const DISTANCE_CSV: &str = "distance_between_tracers.csv";
pub const DEFAULT_OUTPUT: &str = "distance.png";

pub fn default_output(datadir: &Path) -> PathBuf {
    datadir.join(DEFAULT_OUTPUT)
}

/// Tracer separation per species in units of the grid spacing.
pub fn separation_in_cells(distance: &FieldSeries, dx: f64, nspec: usize) -> Result<Vec<Vec<f64>>, DynError> {
    if distance.cols() < nspec {
        return Err(format!(
            "{DISTANCE_CSV} has {} columns but the run has {nspec} species",
            distance.cols()
        )
        .into());
    }
    Ok((0..nspec)
        .map(|ispec| distance.column(ispec).into_iter().map(|d| d / dx).collect())
        .collect())
}

pub fn run(cfg: &SimulationConfig, datadir: &Path, output: &Path) -> Result<(), DynError> {
    let distance = load_csv(&datadir.join(DISTANCE_CSV))?;
    let per_species = separation_in_cells(&distance, cfg.dx, cfg.nspec)?;
    let nt = distance.rows();
    let t = linspace(0.0, cfg.output_dt() * nt as f64, nt);
    info!("[distance] {nt} samples for {} species", cfg.nspec);

    let panels: Vec<LinePanel<'_>> = per_species
        .iter()
        .enumerate()
        .map(|(ispec, column)| LinePanel {
            x_vals: &t,
            series: vec![(column.as_slice(), series_color(0), format!("p{}", ispec + 1))],
            caption: None,
            x_label: "t [s]",
            y_label: "mean distance / grid width",
            y_range: None,
        })
        .collect();
    let height = 300 * panels.len().max(1) as u32;
    plot_stacked_panels(path_to_str(output)?, (1000, height.max(600)), &panels, None)
}
