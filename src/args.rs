use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::colorbound::ColorBound;
use crate::dispersion::CropWindow;
use crate::utils::DynError;

pub const DEFAULT_NSAMPLES_T: usize = 1000;
pub const DEFAULT_NSAMPLES_X: usize = 4096;
/// Rows skipped at the start of the run before the dispersion window
pub const DEFAULT_T_FIRST: usize = 2000;
pub const DEFAULT_NSIGMA: f64 = 1e2;
pub const DEFAULT_GIF: &str = "output.gif";
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Diagnostic plots for particle-in-cell plasma simulation output",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  pic_plot -d run01 dispersion --xs 0.5 --xe 0.75 -o disp.png\n  pic_plot -i run01/plasma.in -d run01 energy -o energy.png\n  pic_plot -d run01 fields 10 -o run01.gif\n  pic_plot -d run01 simplex\n"
)]
pub struct Args {
    /// Directory containing the simulation CSV output
    #[arg(long, short = 'd', default_value = ".", global = true)]
    pub datadir: PathBuf,

    /// Simulation namelist (default: <datadir>/plasma.in)
    #[arg(long, short = 'i', global = true)]
    pub input: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Wavenumber-frequency spectrum with electron/ion dispersion curves
    Dispersion(DispersionArgs),

    /// Total, kinetic and electrostatic energy history
    Energy {
        /// Output image (default: energy.png)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Animated GIF of species density, potential and electric field
    Fields {
        /// Keep every N-th output row as a frame
        #[arg(default_value_t = 5)]
        skips: usize,

        /// Output animation
        #[arg(long, short = 'o', default_value = DEFAULT_GIF)]
        output: PathBuf,

        /// Delay between frames in milliseconds
        #[arg(long, default_value_t = DEFAULT_FRAME_DELAY_MS)]
        delay: u32,
    },

    /// Single frame of density, potential and electric field
    Snapshot {
        /// Output row index to draw
        #[arg(long, default_value_t = 0)]
        step: usize,

        /// Output image (default: snapshot_<step>.png)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Mean tracer separation per species over time
    Distance {
        /// Output image (default: <datadir>/distance.png)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Periodic-domain plots of tracer pairs, one image per recorded time
    Simplex {
        /// Output directory (default: <datadir>/simplex)
        #[arg(long, short = 'o')]
        outdir: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct DispersionArgs {
    /// Start of the wavenumber window as a fraction of the centered spectrum
    #[arg(long, visible_alias = "xs", default_value_t = 0.5, value_parser = parse_fraction)]
    pub xstart: f64,

    /// End of the wavenumber window
    #[arg(long, visible_alias = "xe", default_value_t = 1.0, value_parser = parse_fraction)]
    pub xend: f64,

    /// Start of the frequency window as a fraction of the centered spectrum
    #[arg(long, visible_alias = "ts", default_value_t = 0.5, value_parser = parse_fraction)]
    pub tstart: f64,

    /// End of the frequency window
    #[arg(long, visible_alias = "te", default_value_t = 1.0, value_parser = parse_fraction)]
    pub tend: f64,

    /// Number of time samples taken from the recorded rows
    #[arg(long = "nsamples-t", visible_alias = "nt", default_value_t = DEFAULT_NSAMPLES_T)]
    pub nsamples_t: usize,

    /// Number of grid samples taken from each row
    #[arg(long = "nsamples-x", visible_alias = "nx", default_value_t = DEFAULT_NSAMPLES_X)]
    pub nsamples_x: usize,

    /// First output row used (earlier rows are the start-up transient)
    #[arg(long = "t-first", default_value_t = DEFAULT_T_FIRST)]
    pub t_first: usize,

    /// Field CSV stem inside the data directory
    #[arg(long, default_value = "ex")]
    pub field: String,

    /// Lower color bound: number, "fit" or "tileNN" (default: tile50)
    #[arg(long, allow_hyphen_values = true)]
    pub vmin: Option<ColorBound>,

    /// Upper color bound: number, "fit" or "tileNN" (default: tile100)
    #[arg(long, allow_hyphen_values = true)]
    pub vmax: Option<ColorBound>,

    /// Use mean -/+ nsigma * variance for any bound not given explicitly
    #[arg(long = "auto-scale")]
    pub auto_scale: bool,

    /// Variance multiplier for --auto-scale
    #[arg(long, default_value_t = DEFAULT_NSIGMA)]
    pub nsigma: f64,

    /// Do not overlay the theoretical dispersion curves
    #[arg(long)]
    pub notheory: bool,

    /// Output image (default: dispersion.png)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl DispersionArgs {
    pub fn window(&self) -> Result<CropWindow, DynError> {
        if self.xstart >= self.xend {
            return Err(format!("--xstart ({}) must be below --xend ({})", self.xstart, self.xend).into());
        }
        if self.tstart >= self.tend {
            return Err(format!("--tstart ({}) must be below --tend ({})", self.tstart, self.tend).into());
        }
        Ok(CropWindow {
            xstart: self.xstart,
            xend: self.xend,
            tstart: self.tstart,
            tend: self.tend,
        })
    }

    /// Bounds handed to the color scale; `None` means mean -/+ nsigma * variance.
    pub fn color_bounds(&self) -> (Option<ColorBound>, Option<ColorBound>) {
        if self.auto_scale {
            (self.vmin, self.vmax)
        } else {
            (
                self.vmin.or(Some(ColorBound::Percentile(50.0))),
                self.vmax.or(Some(ColorBound::Percentile(100.0))),
            )
        }
    }
}

fn parse_fraction(text: &str) -> Result<f64, String> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| format!("{text:?} is not a number"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{value} is outside 0..=1"));
    }
    Ok(value)
}
