//! Tabulated one- and two-dimensional distributions sampled by inverse CDF.
//!
//! [`TabularCdf`] is a continuous distribution over a grid, [`DiscreteCdf`] a
//! set of point masses, and [`ConditionalTable`] a family of continuous
//! distributions indexed by incoming energy.

use serde::{Deserialize, Serialize};

use crate::error::{CollisionError, Result};
use crate::interpolation::{find_interval, Interpolation};
use crate::random_stream::RandomStream;

/// How a sample is drawn between the two conditional distributions that
/// bracket the incoming energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TwoDSampling {
    /// Pick the lower or upper distribution with probability given by the
    /// interpolation fraction and sample it directly.
    #[serde(rename = "stochastic")]
    Stochastic,
    /// Stochastic pick, then map the sample onto bounds interpolated between
    /// the two distributions so that the support moves smoothly with energy.
    #[serde(rename = "unit-base")]
    #[default]
    UnitBase,
}

/// Continuous distribution stored as a normalised CDF on a strictly
/// increasing grid. Values between grid points are linear in the CDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularCdf {
    x: Vec<f64>,
    cdf: Vec<f64>,
}

impl TabularCdf {
    /// Build from an un-normalised CDF starting at zero.
    pub fn new(x: Vec<f64>, cdf: Vec<f64>) -> Result<Self> {
        check_grid(&x, cdf.len())?;
        if cdf[0] != 0.0 {
            return Err(CollisionError::invalid_table(format!(
                "CDF must start at 0, got {}",
                cdf[0]
            )));
        }
        if let Some(w) = cdf.windows(2).find(|w| !(w[1] >= w[0])) {
            return Err(CollisionError::invalid_table(format!(
                "CDF decreases from {} to {}",
                w[0], w[1]
            )));
        }
        let total = cdf[cdf.len() - 1];
        if !(total > 0.0) || !total.is_finite() {
            return Err(CollisionError::invalid_table(format!(
                "distribution integral must be positive, got {}",
                total
            )));
        }

        let n = cdf.len();
        let mut normalised: Vec<f64> = cdf.iter().map(|c| c / total).collect();
        normalised[n - 1] = 1.0;
        Ok(Self { x, cdf: normalised })
    }

    /// Build from PDF values at the grid points, integrated with the
    /// trapezoid rule.
    pub fn from_pdf(x: Vec<f64>, pdf: Vec<f64>) -> Result<Self> {
        check_grid(&x, pdf.len())?;
        if let Some(p) = pdf.iter().find(|p| !(**p >= 0.0)) {
            return Err(CollisionError::invalid_table(format!(
                "negative PDF value {}",
                p
            )));
        }
        let mut cdf = Vec::with_capacity(x.len());
        cdf.push(0.0);
        for i in 1..x.len() {
            let area = 0.5 * (pdf[i] + pdf[i - 1]) * (x[i] - x[i - 1]);
            cdf.push(cdf[i - 1] + area);
        }
        Self::new(x, cdf)
    }

    /// Uniform distribution on `[min, max]`.
    pub fn uniform(min: f64, max: f64) -> Result<Self> {
        Self::new(vec![min, max], vec![0.0, 1.0])
    }

    pub fn min(&self) -> f64 {
        self.x[0]
    }

    pub fn max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    pub fn grid(&self) -> &[f64] {
        &self.x
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    /// Inverse-CDF sample for a deviate `xi` in [0, 1).
    pub fn sample(&self, xi: f64) -> Result<f64> {
        self.sample_scaled(xi, Interpolation::LinLin)
    }

    /// Inverse-CDF sample where the CDF is linear in the processed
    /// independent axis of `interpolation` (ln x for log-x policies).
    pub fn sample_scaled(&self, xi: f64, interpolation: Interpolation) -> Result<f64> {
        if !(0.0..=1.0).contains(&xi) {
            return Err(CollisionError::Domain(format!(
                "random number {} outside [0, 1]",
                xi
            )));
        }
        let n = self.cdf.len();
        let upper = self.cdf.partition_point(|c| *c <= xi);
        let i = upper.saturating_sub(1).min(n - 2);

        let policy = if interpolation.log_x() {
            Interpolation::LinLog
        } else {
            Interpolation::LinLin
        };
        policy.invert(self.x[i], self.x[i + 1], self.cdf[i], self.cdf[i + 1], xi)
    }

    /// Position of `value` within the support, 0 at `min` and 1 at `max`.
    pub fn unit_position(&self, value: f64) -> f64 {
        (value - self.min()) / (self.max() - self.min())
    }

    /// Mean value of the distribution.
    pub fn mean(&self) -> f64 {
        self.x
            .windows(2)
            .zip(self.cdf.windows(2))
            .map(|(x, c)| 0.5 * (x[0] + x[1]) * (c[1] - c[0]))
            .sum()
    }
}

fn check_grid(x: &[f64], n_values: usize) -> Result<()> {
    if x.len() != n_values {
        return Err(CollisionError::invalid_table(format!(
            "distribution grid has {} points but {} values",
            x.len(),
            n_values
        )));
    }
    if x.len() < 2 {
        return Err(CollisionError::invalid_table(
            "distribution needs at least two grid points",
        ));
    }
    if let Some(w) = x.windows(2).find(|w| !(w[1] > w[0])) {
        return Err(CollisionError::invalid_table(format!(
            "distribution grid not strictly increasing at {} -> {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Set of point masses, e.g. the moment-preserving cosines of a hybrid
/// elastic distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteCdf {
    values: Vec<f64>,
    cdf: Vec<f64>,
}

impl DiscreteCdf {
    pub fn new(values: Vec<f64>, weights: Vec<f64>) -> Result<Self> {
        if values.is_empty() || values.len() != weights.len() {
            return Err(CollisionError::invalid_table(format!(
                "discrete distribution has {} values and {} weights",
                values.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !(**w >= 0.0)) {
            return Err(CollisionError::invalid_table(format!(
                "negative discrete weight {}",
                w
            )));
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(CollisionError::invalid_table(
                "discrete weights must sum to a positive value",
            ));
        }

        let mut running = 0.0;
        let mut cdf: Vec<f64> = weights
            .iter()
            .map(|w| {
                running += w / total;
                running
            })
            .collect();
        let last = cdf.len() - 1;
        cdf[last] = 1.0;
        Ok(Self { values, cdf })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sample(&self, xi: f64) -> f64 {
        let i = self.cdf.partition_point(|c| *c <= xi);
        self.values[i.min(self.values.len() - 1)]
    }
}

/// Result of [`ConditionalTable::sample_indexed`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedSample {
    pub value: f64,
    /// Sample on the chosen distribution's own grid
    pub raw: f64,
    /// Index of the chosen distribution
    pub index: usize,
}

/// Continuous distributions of an outgoing variable tabulated at a set of
/// incoming energies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalTable {
    energies: Vec<f64>,
    distributions: Vec<TabularCdf>,
}

impl ConditionalTable {
    pub fn new(energies: Vec<f64>, distributions: Vec<TabularCdf>) -> Result<Self> {
        if energies.is_empty() || energies.len() != distributions.len() {
            return Err(CollisionError::invalid_table(format!(
                "{} incoming energies for {} distributions",
                energies.len(),
                distributions.len()
            )));
        }
        if let Some(w) = energies.windows(2).find(|w| !(w[1] > w[0])) {
            return Err(CollisionError::invalid_table(format!(
                "incoming energy grid not strictly increasing at {} -> {}",
                w[0], w[1]
            )));
        }
        Ok(Self {
            energies,
            distributions,
        })
    }

    /// Same distribution at every incoming energy in `[min_energy, max_energy]`.
    pub fn energy_independent(
        min_energy: f64,
        max_energy: f64,
        distribution: TabularCdf,
    ) -> Result<Self> {
        Self::new(
            vec![min_energy, max_energy],
            vec![distribution.clone(), distribution],
        )
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn distributions(&self) -> &[TabularCdf] {
        &self.distributions
    }

    pub fn min_energy(&self) -> f64 {
        self.energies[0]
    }

    pub fn max_energy(&self) -> f64 {
        self.energies[self.energies.len() - 1]
    }

    /// Bracketing index and interpolation fraction for `energy`.
    pub(crate) fn bracket(
        &self,
        energy: f64,
        interpolation: Interpolation,
    ) -> Result<(usize, f64)> {
        if self.energies.len() == 1 {
            return if energy == self.energies[0] {
                Ok((0, 0.0))
            } else {
                Err(self.out_of_range(energy))
            };
        }
        let i = find_interval(&self.energies, energy).ok_or_else(|| self.out_of_range(energy))?;
        let f = interpolation.fraction(self.energies[i], self.energies[i + 1], energy)?;
        Ok((i, f))
    }

    fn out_of_range(&self, energy: f64) -> CollisionError {
        CollisionError::EnergyOutOfRange {
            energy,
            min: self.min_energy(),
            max: self.max_energy(),
        }
    }

    /// Sample the outgoing variable at `energy`. Consumes exactly two
    /// deviates: one for the bracketing pick, one for the inverse CDF.
    pub fn sample<S: RandomStream + ?Sized>(
        &self,
        energy: f64,
        stream: &mut S,
        interpolation: Interpolation,
        two_d: TwoDSampling,
    ) -> Result<f64> {
        self.sample_indexed(energy, stream, interpolation, two_d)
            .map(|sample| sample.value)
    }

    /// Like [`ConditionalTable::sample`], also reporting which distribution
    /// was drawn from and the value before unit-base mapping.
    pub fn sample_indexed<S: RandomStream + ?Sized>(
        &self,
        energy: f64,
        stream: &mut S,
        interpolation: Interpolation,
        two_d: TwoDSampling,
    ) -> Result<IndexedSample> {
        let (i, f) = self.bracket(energy, interpolation)?;
        let pick = if stream.next() < f { i + 1 } else { i };
        let chosen = &self.distributions[pick];
        // log scaling of the outgoing axis only applies to positive supports
        let inner = if chosen.min() > 0.0 {
            interpolation
        } else {
            Interpolation::LinLin
        };
        let raw = chosen.sample_scaled(stream.next(), inner)?;

        if f == 0.0 || two_d == TwoDSampling::Stochastic {
            return Ok(IndexedSample {
                value: raw,
                raw,
                index: pick,
            });
        }

        let lower = &self.distributions[i];
        let upper = &self.distributions[i + 1];
        let min = interpolate_bound(lower.min(), upper.min(), f, interpolation);
        let max = interpolate_bound(lower.max(), upper.max(), f, interpolation);
        let u = chosen.unit_position(raw);
        Ok(IndexedSample {
            value: min + u * (max - min),
            raw,
            index: pick,
        })
    }
}

/// Support bound between two distributions, log-scaled for log-y policies
/// when both bounds are positive.
fn interpolate_bound(lower: f64, upper: f64, f: f64, interpolation: Interpolation) -> f64 {
    if interpolation.log_y() && lower > 0.0 && upper > 0.0 {
        lower * (upper / lower).powf(f)
    } else {
        lower + f * (upper - lower)
    }
}
