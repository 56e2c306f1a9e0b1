use std::path::Path;

use log::info;

use crate::config::SimulationConfig;
use crate::field::{load_csv, FieldSeries};
use crate::plot::{plot_stacked_panels, series_color, LinePanel, RGBColor};
use crate::utils::{linspace, path_to_str, DynError};

pub const KINETIC_CSV: &str = "kinetic_energy.csv";
pub const ELECTROSTATIC_CSV: &str = "es_energy.csv";
pub const DEFAULT_OUTPUT: &str = "energy.png";
const FIGURE_SIZE: (u32, u32) = (1000, 900);

/// Element-wise sum with a single column broadcast across the other operand.
pub fn broadcast_sum(a: &FieldSeries, b: &FieldSeries) -> Result<FieldSeries, DynError> {
    if a.rows() != b.rows() {
        return Err(format!(
            "Energy histories differ in length: {} vs {} rows",
            a.rows(),
            b.rows()
        )
        .into());
    }
    let cols = match (a.cols(), b.cols()) {
        (x, y) if x == y => x,
        (1, y) => y,
        (x, 1) => x,
        (x, y) => {
            return Err(format!("Cannot broadcast {x} columns against {y} columns").into())
        }
    };
    let pick = |s: &FieldSeries, t: usize, x: usize| s.get(t, if s.cols() == 1 { 0 } else { x });
    let mut values = Vec::with_capacity(a.rows() * cols);
    for t in 0..a.rows() {
        for x in 0..cols {
            values.push(pick(a, t, x) + pick(b, t, x));
        }
    }
    Ok(FieldSeries::new(a.rows(), cols, values)?)
}

fn column_series<'a>(
    columns: &'a [Vec<f64>],
    name: &str,
) -> Vec<(&'a [f64], RGBColor, String)> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let label = if columns.len() == 1 {
                name.to_string()
            } else {
                format!("{name}{}", idx + 1)
            };
            (column.as_slice(), series_color(idx), label)
        })
        .collect()
}

fn columns_of(series: &FieldSeries) -> Vec<Vec<f64>> {
    (0..series.cols()).map(|x| series.column(x)).collect()
}

pub fn run(cfg: &SimulationConfig, datadir: &Path, output: &Path) -> Result<(), DynError> {
    let kinetic = load_csv(&datadir.join(KINETIC_CSV))?;
    let electrostatic = load_csv(&datadir.join(ELECTROSTATIC_CSV))?;
    let total = broadcast_sum(&kinetic, &electrostatic)?;

    let nt = kinetic.rows();
    if nt == 0 {
        return Err(format!("{} has no rows", datadir.join(KINETIC_CSV).display()).into());
    }
    let t = linspace(0.0, cfg.output_dt() * nt as f64, nt);
    info!("[energy] {nt} samples, dt = {:.6e} s", cfg.output_dt());

    let total_cols = columns_of(&total);
    let kinetic_cols = columns_of(&kinetic);
    let es_cols = columns_of(&electrostatic);
    let panel = |series| LinePanel {
        x_vals: &t,
        series,
        caption: None,
        x_label: "t [s]",
        y_label: "energy [J]",
        y_range: None,
    };
    let panels = [
        panel(column_series(&total_cols, "sum")),
        panel(column_series(&kinetic_cols, "kinetic")),
        panel(column_series(&es_cols, "electrostatic")),
    ];
    plot_stacked_panels(path_to_str(output)?, FIGURE_SIZE, &panels, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_matching_columns() {
        let a = FieldSeries::from_fn(3, 2, |t, x| (t + x) as f64);
        let b = FieldSeries::from_fn(3, 2, |_, _| 1.0);
        let s = broadcast_sum(&a, &b).unwrap();
        assert_eq!(s.values(), &[1.0, 2.0, 2.0, 3.0, 3.0, 4.0]);
    }

    #[test]
    fn broadcasts_single_column() {
        let kinetic = FieldSeries::from_fn(2, 3, |t, x| (10 * t + x) as f64);
        let es = FieldSeries::from_fn(2, 1, |t, _| 100.0 * (t + 1) as f64);
        let s = broadcast_sum(&kinetic, &es).unwrap();
        assert_eq!(s.shape(), (2, 3));
        assert_eq!(s.row(1), &[210.0, 211.0, 212.0]);
        assert_eq!(broadcast_sum(&es, &kinetic).unwrap(), s);
    }

    #[test]
    fn rejects_incompatible_shapes() {
        let a = FieldSeries::zeros(4, 2);
        assert!(broadcast_sum(&a, &FieldSeries::zeros(3, 2)).is_err());
        assert!(broadcast_sum(&a, &FieldSeries::zeros(4, 3)).is_err());
    }

    #[test]
    fn labels_columns_per_species() {
        let cols = vec![vec![1.0], vec![2.0]];
        let series = column_series(&cols, "kinetic");
        assert_eq!(series[0].2, "kinetic1");
        assert_eq!(series[1].2, "kinetic2");
        let single = column_series(&cols[..1], "sum");
        assert_eq!(single[0].2, "sum");
    }

    #[test]
    fn run_plots_histories_from_datadir() {
        let text = "&simulation\n dt = 1.0e-9\n nsteps = 100\n dx = 0.01\n ngrid = 4\n/\n\
                    &output\n output_steps = 10\n/\n";
        let cfg = SimulationConfig::from_namelist(crate::namelist::Namelist::parse(text).unwrap()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(KINETIC_CSV),
            "1.0,2.0\n1.5,1.8\n2.0,1.6\n2.5,1.4\n3.0,1.2\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(ELECTROSTATIC_CSV), "0.5\n0.4\n0.3\n0.2\n0.1\n").unwrap();

        let output = dir.path().join("energy.png");
        run(&cfg, dir.path(), &output).unwrap();
        assert!(output.exists());

        std::fs::remove_file(dir.path().join(ELECTROSTATIC_CSV)).unwrap();
        assert!(run(&cfg, dir.path(), &output).is_err());
    }
}
