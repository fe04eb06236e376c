// Tabulated microscopic cross sections

use serde::{Deserialize, Serialize};

use crate::error::{CollisionError, Result};
use crate::interpolation::Interpolation;

/// Ordered (energy, value) pairs for one reaction. Energies in MeV, values in
/// barns. Validated once at construction and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCrossSection")]
pub struct CrossSectionTable {
    energy: Vec<f64>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawCrossSection {
    energy: Vec<f64>,
    values: Vec<f64>,
}

impl TryFrom<RawCrossSection> for CrossSectionTable {
    type Error = CollisionError;

    fn try_from(raw: RawCrossSection) -> Result<Self> {
        CrossSectionTable::new(raw.energy, raw.values)
    }
}

impl CrossSectionTable {
    pub fn new(energy: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if energy.len() != values.len() {
            return Err(CollisionError::invalid_table(format!(
                "cross section has {} energies but {} values",
                energy.len(),
                values.len()
            )));
        }
        if energy.len() < 2 {
            return Err(CollisionError::invalid_table(
                "cross section needs at least two grid points",
            ));
        }
        if let Some(w) = energy.windows(2).find(|w| !(w[1] > w[0])) {
            return Err(CollisionError::invalid_table(format!(
                "energy grid not strictly increasing at {} -> {}",
                w[0], w[1]
            )));
        }
        if let Some(v) = values.iter().find(|v| !(**v >= 0.0) || !v.is_finite()) {
            return Err(CollisionError::invalid_table(format!(
                "negative or non-finite cross section value {}",
                v
            )));
        }
        Ok(Self { energy, values })
    }

    /// Constant cross section over `[min_energy, max_energy]`.
    pub fn constant(min_energy: f64, max_energy: f64, value: f64) -> Result<Self> {
        Self::new(vec![min_energy, max_energy], vec![value, value])
    }

    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn min_energy(&self) -> f64 {
        self.energy[0]
    }

    pub fn max_energy(&self) -> f64 {
        self.energy[self.energy.len() - 1]
    }

    pub fn contains(&self, energy: f64) -> bool {
        energy >= self.min_energy() && energy <= self.max_energy()
    }

    /// Cross section at `energy`. No extrapolation beyond the grid.
    pub fn evaluate(&self, energy: f64, interpolation: Interpolation) -> Result<f64> {
        interpolation.evaluate_table(&self.energy, &self.values, energy)
    }
}
