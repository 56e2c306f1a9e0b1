//! Tracer pairs drawn on the periodic domain `[0, L)`.
//!
//! Each block of `simplex{n}.csv` starts with a `Time <step>` line followed by
//! one `px1,px2` line per pair. Positions are unwrapped, so a pair whose
//! members sit in different periods is drawn through the boundary.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::info;

use crate::config::SimulationConfig;
use crate::plot::{plot_segment_rows, RGBColor, SegmentRow, BLUE, GREEN, RED};
use crate::utils::{path_to_str, DynError};

pub fn simplex_csv(ispec: usize) -> String {
    format!("simplex{}.csv", ispec + 1)
}

pub fn default_outdir(datadir: &Path) -> PathBuf {
    datadir.join("simplex")
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplexBlock {
    pub step: u64,
    pub pairs: Vec<(f64, f64)>,
}

pub fn parse_simplex<R: BufRead>(reader: R, label: &str) -> Result<Vec<SimplexBlock>, DynError> {
    let mut blocks: Vec<SimplexBlock> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("Time") {
            let step = rest
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("{label}:{}: bad time step {rest:?}", idx + 1))?;
            blocks.push(SimplexBlock {
                step,
                pairs: Vec::new(),
            });
            continue;
        }
        let block = blocks
            .last_mut()
            .ok_or_else(|| format!("{label}:{}: pair before the first Time line", idx + 1))?;
        let values = line
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("{label}:{}: {e}", idx + 1))?;
        match values.as_slice() {
            [a, b] => block.pairs.push((*a, *b)),
            _ => {
                return Err(format!(
                    "{label}:{}: expected 2 positions, found {}",
                    idx + 1,
                    values.len()
                )
                .into())
            }
        }
    }
    Ok(blocks)
}

/// How many whole periods separate the two members of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separation {
    SamePeriod,
    OnePeriod,
    Farther,
}

impl Separation {
    pub fn color(self) -> RGBColor {
        match self {
            Separation::SamePeriod => BLUE,
            Separation::OnePeriod => GREEN,
            Separation::Farther => RED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairLayout {
    /// Positions folded into `[0, L)`
    pub local: [f64; 2],
    /// Horizontal segments joining the pair inside `[0, L]`
    pub segments: Vec<(f64, f64)>,
    pub separation: Separation,
}

pub fn layout_pair(px1: f64, px2: f64, length: f64) -> PairLayout {
    let period1 = (px1 / length).floor();
    let period2 = (px2 / length).floor();
    let local1 = px1.rem_euclid(length);
    let local2 = px2.rem_euclid(length);

    let gap = (px1 - px2).abs();
    let separation = match (gap / length).floor() as u64 {
        0 => Separation::SamePeriod,
        1 => Separation::OnePeriod,
        _ => Separation::Farther,
    };

    let segments = if period1 == period2 {
        vec![(local1, local2)]
    } else if gap > length {
        vec![(0.0, length)]
    } else if px1 < px2 {
        vec![(local1, length), (0.0, local2)]
    } else {
        vec![(local2, length), (0.0, local1)]
    };

    PairLayout {
        local: [local1, local2],
        segments,
        separation,
    }
}

fn block_rows(block: &SimplexBlock, length: f64) -> Vec<SegmentRow> {
    block
        .pairs
        .iter()
        .enumerate()
        .map(|(i, &(px1, px2))| {
            let layout = layout_pair(px1, px2, length);
            SegmentRow {
                y: (i + 1) as f64,
                points: layout.local,
                segments: layout.segments,
                color: layout.separation.color(),
            }
        })
        .collect()
}

pub fn run(cfg: &SimulationConfig, datadir: &Path, outdir: &Path) -> Result<(), DynError> {
    let length = cfg.domain_length();
    if length <= 0.0 {
        return Err("Domain length dx * ngrid must be positive".into());
    }
    fs::create_dir_all(outdir)?;

    for ispec in 0..cfg.nspec {
        let path = datadir.join(simplex_csv(ispec));
        let label = path.display().to_string();
        let file = File::open(&path).map_err(|e| format!("{label}: {e}"))?;
        let blocks = parse_simplex(BufReader::new(file), &label)?;
        for block in &blocks {
            let output = outdir.join(format!("simplex{}_{:04}.png", ispec + 1, block.step));
            let title = format!("simplex{} {}steps", ispec + 1, block.step);
            plot_segment_rows(
                path_to_str(&output)?,
                &block_rows(block, length),
                (0.0, length),
                &title,
            )?;
        }
        info!(
            "[simplex] species {}: wrote {} images to {}",
            ispec + 1,
            blocks.len(),
            outdir.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blocks() {
        let text = "Time 0\n0.1,0.2\n0.3, 0.9\n\nTime 100\n1.5,0.2\n";
        let blocks = parse_simplex(text.as_bytes(), "s").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].step, 0);
        assert_eq!(blocks[0].pairs, vec![(0.1, 0.2), (0.3, 0.9)]);
        assert_eq!(blocks[1].step, 100);
        assert_eq!(blocks[1].pairs, vec![(1.5, 0.2)]);
    }

    #[test]
    fn rejects_orphan_pairs_and_bad_lines() {
        assert!(parse_simplex("0.1,0.2\n".as_bytes(), "s").is_err());
        assert!(parse_simplex("Time x\n".as_bytes(), "s").is_err());
        assert!(parse_simplex("Time 1\n0.1,0.2,0.3\n".as_bytes(), "s").is_err());
    }

    #[test]
    fn same_period_pair_is_one_segment() {
        let layout = layout_pair(1.2, 1.8, 1.0);
        assert_eq!(layout.separation, Separation::SamePeriod);
        assert_eq!(layout.segments.len(), 1);
        let (a, b) = layout.segments[0];
        assert!((a - 0.2).abs() < 1e-12 && (b - 0.8).abs() < 1e-12);
    }

    #[test]
    fn neighbouring_periods_wrap_through_boundary() {
        let forward = layout_pair(0.9, 1.1, 1.0);
        assert_eq!(forward.separation, Separation::SamePeriod);
        assert_eq!(forward.segments.len(), 2);
        assert!((forward.segments[0].0 - 0.9).abs() < 1e-12);
        assert_eq!(forward.segments[0].1, 1.0);
        assert_eq!(forward.segments[1].0, 0.0);
        assert!((forward.segments[1].1 - 0.1).abs() < 1e-12);

        let backward = layout_pair(1.1, 0.9, 1.0);
        assert!((backward.segments[0].0 - 0.9).abs() < 1e-12);
        assert!((backward.segments[1].1 - 0.1).abs() < 1e-12);
    }

    #[test]
    fn distant_pair_spans_domain() {
        let layout = layout_pair(0.5, 1.7, 1.0);
        assert_eq!(layout.separation, Separation::OnePeriod);
        assert_eq!(layout.segments, vec![(0.0, 1.0)]);
        assert_eq!(layout_pair(0.0, 3.5, 1.0).separation, Separation::Farther);
        assert_eq!(Separation::Farther.color(), RED);
    }

    #[test]
    fn negative_positions_fold_into_domain() {
        let layout = layout_pair(-0.25, 0.25, 1.0);
        assert!((layout.local[0] - 0.75).abs() < 1e-12);
        assert_eq!(layout.segments.len(), 2);
    }

    #[test]
    fn rows_are_numbered_from_one() {
        let block = SimplexBlock {
            step: 3,
            pairs: vec![(0.1, 0.2), (0.3, 0.4)],
        };
        let rows = block_rows(&block, 1.0);
        assert_eq!(rows[0].y, 1.0);
        assert_eq!(rows[1].y, 2.0);
    }

    #[test]
    fn run_writes_one_image_per_block() {
        let text = "&simulation\n dt = 1.0e-9\n nsteps = 100\n dx = 0.25\n ngrid = 4\n/\n\
                    &output\n output_steps = 10\n/\n";
        let cfg = SimulationConfig::from_namelist(crate::namelist::Namelist::parse(text).unwrap()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(simplex_csv(0)),
            "Time 0\n0.1,0.2\n0.9,1.1\nTime 100\n0.5,1.7\n-0.25,0.25\n",
        )
        .unwrap();

        let outdir = default_outdir(dir.path());
        run(&cfg, dir.path(), &outdir).unwrap();
        assert!(outdir.join("simplex1_0000.png").exists());
        assert!(outdir.join("simplex1_0100.png").exists());
    }
}
