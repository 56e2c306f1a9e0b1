use std::path::{Path, PathBuf};

use crate::namelist::{Namelist, NamelistError};
use crate::plasma::PlasmaParameters;
use crate::utils::DynError;

pub const DEFAULT_NAMELIST: &str = "plasma.in";

/// Grid and output cadence of a simulation run, read from its namelist.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Simulation time step (s)
    pub dt: f64,
    pub nsteps: usize,
    /// Number of rows written to each CSV over the run
    pub output_steps: usize,
    /// Grid spacing (m)
    pub dx: f64,
    pub ngrid: usize,
    pub nspec: usize,
    namelist: Namelist,
}

impl SimulationConfig {
    pub fn from_namelist(namelist: Namelist) -> Result<Self, DynError> {
        let dt = namelist.get_f64("simulation", "dt")?;
        let nsteps = namelist.get_usize("simulation", "nsteps")?;
        let dx = namelist.get_f64("simulation", "dx")?;
        let ngrid = namelist.get_usize("simulation", "ngrid")?;
        let output_steps = namelist.get_usize("output", "output_steps")?;
        let nspec = namelist.get_usize_or("plasma", "nspec", 1)?;
        if output_steps == 0 {
            return Err("output.output_steps must be at least 1".into());
        }
        if dt <= 0.0 || dx <= 0.0 {
            return Err("simulation.dt and simulation.dx must be positive".into());
        }
        Ok(Self {
            dt,
            nsteps,
            output_steps,
            dx,
            ngrid,
            nspec,
            namelist,
        })
    }

    pub fn load(path: &Path) -> Result<Self, DynError> {
        let namelist = Namelist::from_path(path)
            .map_err(|e| format!("{}: {e}", path.display()))?;
        Self::from_namelist(namelist)
    }

    /// Simulation steps between two consecutive CSV rows.
    pub fn output_skips(&self) -> usize {
        self.nsteps / self.output_steps
    }

    /// Physical time between two CSV rows, using the integer output skip.
    pub fn output_dt(&self) -> f64 {
        self.dt * self.output_skips() as f64
    }

    /// Physical time between two CSV rows without truncating the skip.
    pub fn sample_dt(&self) -> f64 {
        self.dt * self.nsteps as f64 / self.output_steps as f64
    }

    /// Length of the periodic domain.
    pub fn domain_length(&self) -> f64 {
        self.dx * self.ngrid as f64
    }

    pub fn plasma(&self) -> Result<PlasmaParameters, NamelistError> {
        PlasmaParameters::from_namelist(&self.namelist)
    }
}

/// Namelist path: explicit `--input`, else `<datadir>/plasma.in`.
pub fn resolve_namelist_path(input: Option<&Path>, datadir: &Path) -> PathBuf {
    match input {
        Some(path) => path.to_path_buf(),
        None => datadir.join(DEFAULT_NAMELIST),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = "\
&simulation
  dt = 2.0e-11
  nsteps = 30000
  dx = 5.0e-4
  ngrid = 256
/
&output
  output_steps = 4000
/
&plasma
  nspec = 2
  lambda = 1.0e-3
  Ts = 10000.0, 1000.0
  m_ratio = 1.0, 100.0
/
";

    #[test]
    fn derives_output_cadence() {
        let cfg = SimulationConfig::from_namelist(Namelist::parse(RUN).unwrap()).unwrap();
        assert_eq!(cfg.output_skips(), 7);
        assert!((cfg.output_dt() - 1.4e-10).abs() < 1e-22);
        assert!((cfg.sample_dt() - 1.5e-10).abs() < 1e-22);
        assert!((cfg.domain_length() - 0.128).abs() < 1e-12);
        assert_eq!(cfg.nspec, 2);
    }

    #[test]
    fn nspec_defaults_to_one() {
        let text = "&simulation\n dt=1.0\n nsteps=10\n dx=1.0\n ngrid=8\n/\n&output\n output_steps=10\n/\n";
        let cfg = SimulationConfig::from_namelist(Namelist::parse(text).unwrap()).unwrap();
        assert_eq!(cfg.nspec, 1);
        assert!(cfg.plasma().is_err());
    }

    #[test]
    fn zero_output_steps_is_rejected() {
        let text = RUN.replace("output_steps = 4000", "output_steps = 0");
        assert!(SimulationConfig::from_namelist(Namelist::parse(&text).unwrap()).is_err());
    }

    #[test]
    fn namelist_path_falls_back_to_datadir() {
        let dir = Path::new("runs/a");
        assert_eq!(resolve_namelist_path(None, dir), dir.join("plasma.in"));
        assert_eq!(
            resolve_namelist_path(Some(Path::new("x.in")), dir),
            PathBuf::from("x.in")
        );
    }
}
