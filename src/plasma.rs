use crate::namelist::{Namelist, NamelistError};

pub const K_BOLTZMANN: f64 = 1.380_649e-23; // J/K
pub const ELECTRON_MASS: f64 = 9.109_383_56e-31; // kg
/// Adiabatic index used for both dispersion relations
pub const GAMMA: f64 = 3.0;

/// Species parameters that enter the electron-plasma and ion-acoustic
/// dispersion relations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlasmaParameters {
    /// Debye length (m)
    pub debye: f64,
    /// Electron temperature (K)
    pub te: f64,
    /// Ion temperature (K)
    pub ti: f64,
    /// Ion mass (kg)
    pub mi: f64,
}

impl PlasmaParameters {
    /// Electrons are species 1 and ions species 2 of the `&plasma` group.
    pub fn from_namelist(namelist: &Namelist) -> Result<Self, NamelistError> {
        let debye = namelist.get_f64("plasma", "lambda")?;
        let temperatures = namelist.get_f64_array("plasma", "Ts")?;
        let mass_ratios = namelist.get_f64_array("plasma", "m_ratio")?;
        let species = |values: &[f64], idx: usize, key: &str| -> Result<f64, NamelistError> {
            values.get(idx).copied().ok_or_else(|| NamelistError::MissingKey {
                group: "plasma".to_string(),
                key: format!("{key}({})", idx + 1),
            })
        };
        Ok(Self {
            debye,
            te: species(&temperatures, 0, "ts")?,
            ti: species(&temperatures, 1, "ts")?,
            mi: ELECTRON_MASS * species(&mass_ratios, 1, "m_ratio")?,
        })
    }

    /// Electron plasma frequency (rad/s).
    pub fn wpe(&self) -> f64 {
        (K_BOLTZMANN * self.te / ELECTRON_MASS).sqrt() / self.debye
    }

    /// Ion plasma frequency (rad/s).
    pub fn wpi(&self) -> f64 {
        (K_BOLTZMANN * self.ti / self.mi).sqrt() / self.debye
    }

    /// Bohm-Gross electron plasma wave, `wpe * sqrt(1 + 3 k^2 lambda_D^2)`.
    pub fn electron_dispersion(&self, k: f64) -> f64 {
        self.wpe() * (1.0 + GAMMA * k * k * self.debye * self.debye).sqrt()
    }

    /// Ion-acoustic wave with warm ions and Debye-length correction.
    pub fn ion_dispersion(&self, k: f64) -> f64 {
        let k2 = k * k;
        let shielding = 1.0 + GAMMA * k2 * self.debye * self.debye;
        (GAMMA * k2 * self.ti * K_BOLTZMANN / self.mi
            + GAMMA * k2 * self.te * K_BOLTZMANN / self.mi / shielding)
            .sqrt()
    }
}
