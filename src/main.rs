mod args;
mod colorbound;
mod config;
mod dispersion;
mod energy;
mod field;
mod fields;
mod namelist;
mod plasma;
mod plot;
mod simplex;
mod tracers;
mod utils;

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use env_logger::Env;
use log::{debug, info};

use args::{Args, Command, DispersionArgs};
use colorbound::{mean, resolve_range, ColorBound};
use config::{resolve_namelist_path, SimulationConfig};
use dispersion::{compute_dispersion, SampleStrides};
use field::load_csv;
use plot::{plot_pcolormesh, Overlay, RED, WHITE, YELLOW};
use utils::{path_to_str, DynError};

const DEFAULT_DISPERSION_PNG: &str = "dispersion.png";

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run_dispersion(cfg: &SimulationConfig, datadir: &Path, opts: &DispersionArgs) -> Result<(), DynError> {
    let window = opts.window()?;
    let plasma = cfg.plasma()?;
    debug!(
        "[dispersion] wpe = {:.6e} rad/s, wpi = {:.6e} rad/s",
        plasma.wpe(),
        plasma.wpi()
    );

    let path = datadir.join(format!("{}.csv", opts.field));
    let field = load_csv(&path)?;
    info!(
        "[dispersion] {} loaded: {} rows x {} columns",
        path.display(),
        field.rows(),
        field.cols()
    );

    let strides = SampleStrides::new(
        field.shape(),
        cfg.output_steps,
        cfg.ngrid,
        opts.t_first,
        opts.nsamples_t,
        opts.nsamples_x,
    )?;
    info!(
        "[dispersion] rows {}..{} every {}, columns 0..{} every {}",
        strides.t_start, strides.t_end, strides.t_step, strides.x_end, strides.x_step
    );
    let data = strides.apply(&field);
    let (dx, dt) = strides.spacings(cfg);
    debug!("[dispersion] effective dx = {dx:.6e} m, dt = {dt:.6e} s");

    let spectrum = compute_dispersion(&data, dx, dt, window, &plasma)?;
    let values = spectrum.amplitude.values();
    if values.is_empty() {
        return Err("Crop window selects no spectrum bins".into());
    }
    let (vmin_bound, vmax_bound) = opts.color_bounds();
    let (vmin, vmax) = resolve_range(vmin_bound, vmax_bound, values, opts.nsigma);
    let describe = |bound: Option<ColorBound>| {
        bound.map_or_else(|| format!("mean +/- {} * variance", opts.nsigma), |b| b.to_string())
    };
    info!(
        "[dispersion] map {}x{}: min {:.6e}, max {:.6e}, mean {:.6e}",
        spectrum.amplitude.rows(),
        spectrum.amplitude.cols(),
        spectrum.amplitude.min(),
        spectrum.amplitude.max(),
        mean(values)
    );
    info!(
        "[dispersion] color range {} .. {} -> {vmin:.6e} .. {vmax:.6e}",
        describe(vmin_bound),
        describe(vmax_bound)
    );

    let mut overlays = Vec::new();
    if !opts.notheory {
        let pairs = |curve: &[f64]| -> Vec<(f64, f64)> {
            spectrum.k.iter().copied().zip(curve.iter().copied()).collect()
        };
        overlays.push(Overlay {
            points: pairs(&spectrum.electron),
            color: RED,
            label: "electron plasma wave",
        });
        overlays.push(Overlay {
            points: pairs(&spectrum.ion),
            color: YELLOW,
            label: "ion sound wave",
        });
        let wpe_line = vec![1.0; spectrum.k.len()];
        overlays.push(Overlay {
            points: pairs(&wpe_line),
            color: WHITE,
            label: "wpe",
        });
    }

    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DISPERSION_PNG));
    plot_pcolormesh(
        path_to_str(&output)?,
        &spectrum.k,
        &spectrum.w,
        &spectrum.amplitude,
        (vmin, vmax),
        &overlays,
        &opts.field,
        "k",
        "w / wpe",
    )
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = Args::parse();
    init_logging(args.verbose);

    let namelist_path = resolve_namelist_path(args.input.as_deref(), &args.datadir);
    let cfg = SimulationConfig::load(&namelist_path)?;
    info!(
        "[config] {}: dt = {:.6e} s, nsteps = {}, output_steps = {}, dx = {:.6e} m, ngrid = {}, nspec = {}",
        namelist_path.display(),
        cfg.dt,
        cfg.nsteps,
        cfg.output_steps,
        cfg.dx,
        cfg.ngrid,
        cfg.nspec
    );

    let datadir = args.datadir.as_path();
    match &args.command {
        Command::Dispersion(opts) => run_dispersion(&cfg, datadir, opts),
        Command::Energy { output } => {
            let output = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(energy::DEFAULT_OUTPUT));
            energy::run(&cfg, datadir, &output)
        }
        Command::Fields {
            skips,
            output,
            delay,
        } => fields::run_animation(&cfg, datadir, *skips, output, *delay),
        Command::Snapshot { step, output } => {
            let output = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("snapshot_{step:06}.png")));
            fields::run_snapshot(&cfg, datadir, *step, &output)
        }
        Command::Distance { output } => {
            let output = output
                .clone()
                .unwrap_or_else(|| tracers::default_output(datadir));
            tracers::run(&cfg, datadir, &output)
        }
        Command::Simplex { outdir } => {
            let outdir = outdir
                .clone()
                .unwrap_or_else(|| simplex::default_outdir(datadir));
            simplex::run(&cfg, datadir, &outdir)
        }
    }
}
