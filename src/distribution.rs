//! Scattering distributions: outgoing energy and direction cosine for a
//! single reaction.
//!
//! Every law is a variant of the closed [`ScatteringLaw`] enum and is sampled
//! through [`ScatteringDistribution::sample`] (forward) or
//! [`ScatteringDistribution::sample_adjoint`]. Outgoing values are checked
//! before they leave this module: a cosine outside [-1, 1], a negative energy
//! or an energy on the wrong side of the incoming energy is a
//! [`CollisionError::PhysicsInvariant`]. Values within round-off of a bound
//! are snapped onto it.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CollisionError, Result};
use crate::interpolation::Interpolation;
use crate::particle::ELECTRON_REST_MASS_MEV;
use crate::random_stream::RandomStream;
use crate::reaction::TransportDirection;
use crate::tabular::{ConditionalTable, DiscreteCdf, TwoDSampling};

/// Absolute tolerance, scaled by the magnitude of the bound for energies.
pub const ROUNDOFF_TOLERANCE: f64 = 1e-12;

/// Cosine tables and hybrid cutoff ratios are interpolated lin-lin
/// whatever the reaction's energy policy.
const COSINE_INTERPOLATION: Interpolation = Interpolation::LinLin;

/// Frame in which tabulated outgoing quantities are given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ScatteringFrame {
    #[default]
    Lab,
    /// Two-body centre-of-mass frame with a target at rest. `awr` is the
    /// target mass in units of the projectile mass.
    CenterOfMass { awr: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScatteringLaw {
    /// Energy unchanged, cosine uniform on [-1, 1].
    Isotropic,
    /// No outgoing particle (capture, photoelectric absorption).
    Absorption,
    /// Elastic scattering with a tabulated cosine distribution.
    AnalogElastic {
        cosines: ConditionalTable,
        frame: ScatteringFrame,
    },
    /// Continuous cutoff distribution on [-1, cutoff_mu] mixed with discrete
    /// moment-preserving cosines above the cutoff. `cutoff_ratios[i]` is the
    /// fraction of the elastic cross section below the cutoff at the i-th
    /// incoming energy of `cutoff`.
    HybridElastic {
        cutoff: ConditionalTable,
        discrete: Vec<DiscreteCdf>,
        cutoff_ratios: Vec<f64>,
        cutoff_mu: f64,
    },
    /// Deterministic tabulated energy loss, direction unchanged.
    AtomicExcitation {
        energy: Vec<f64>,
        energy_loss: Vec<f64>,
    },
    /// Electron loses the sampled photon energy, direction unchanged.
    Bremsstrahlung { photon_energy: ConditionalTable },
    /// Primary electron loses the subshell binding energy plus the sampled
    /// knock-on energy.
    Electroionization {
        binding_energy: f64,
        knock_on_energy: ConditionalTable,
    },
    /// Discrete level excitation of the target, isotropic in the centre of
    /// mass.
    LevelInelastic { q_value: f64, awr: f64 },
    /// Tabulated outgoing energy with an optional independent cosine table;
    /// isotropic when no cosines are given.
    TabulatedEnergy {
        outgoing_energy: ConditionalTable,
        cosines: Option<ConditionalTable>,
        frame: ScatteringFrame,
    },
    /// Kalbach-Mann correlated energy-angle distribution. `precompound` and
    /// `slope` hold r and a on the outgoing-energy grid of each distribution.
    KalbachMann {
        outgoing_energy: ConditionalTable,
        precompound: Vec<Vec<f64>>,
        slope: Vec<Vec<f64>>,
        frame: ScatteringFrame,
    },
    /// Compton scattering with a tabulated ratio of outgoing to incoming
    /// photon energy; the cosine follows from the Compton relation.
    Incoherent { energy_ratio: ConditionalTable },
    /// Positron annihilation at rest: one photon at the electron rest mass
    /// energy, isotropic.
    Annihilation,
}

/// A scattering law together with the interpolation policy and two-D
/// sampling scheme applied to its tables. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatteringDistribution {
    law: ScatteringLaw,
    interpolation: Interpolation,
    two_d: TwoDSampling,
}

impl ScatteringDistribution {
    pub fn new(law: ScatteringLaw, interpolation: Interpolation) -> Self {
        Self {
            law,
            interpolation,
            two_d: TwoDSampling::default(),
        }
    }

    pub fn with_two_d_sampling(mut self, two_d: TwoDSampling) -> Self {
        self.two_d = two_d;
        self
    }

    pub fn isotropic() -> Self {
        Self::new(ScatteringLaw::Isotropic, Interpolation::LinLin)
    }

    pub fn absorption() -> Self {
        Self::new(ScatteringLaw::Absorption, Interpolation::LinLin)
    }

    pub fn law(&self) -> &ScatteringLaw {
        &self.law
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn two_d_sampling(&self) -> TwoDSampling {
        self.two_d
    }

    pub fn is_absorption(&self) -> bool {
        matches!(self.law, ScatteringLaw::Absorption)
    }

    /// Forward sample: returns `(outgoing_energy, outgoing_cosine)`.
    pub fn sample<S: RandomStream + ?Sized>(
        &self,
        incoming_energy: f64,
        stream: &mut S,
    ) -> Result<(f64, f64)> {
        self.sample_directed(incoming_energy, TransportDirection::Forward, stream)
    }

    /// Adjoint sample: energy-loss channels gain energy instead.
    pub fn sample_adjoint<S: RandomStream + ?Sized>(
        &self,
        incoming_energy: f64,
        stream: &mut S,
    ) -> Result<(f64, f64)> {
        self.sample_directed(incoming_energy, TransportDirection::Adjoint, stream)
    }

    pub fn sample_directed<S: RandomStream + ?Sized>(
        &self,
        incoming_energy: f64,
        direction: TransportDirection,
        stream: &mut S,
    ) -> Result<(f64, f64)> {
        if !(incoming_energy > 0.0) || !incoming_energy.is_finite() {
            return Err(CollisionError::Domain(format!(
                "incoming energy must be positive, got {}",
                incoming_energy
            )));
        }
        let adjoint = direction == TransportDirection::Adjoint;
        let (energy, mu) = self.sample_raw(incoming_energy, adjoint, stream)?;
        self.check_outgoing(incoming_energy, energy, mu, adjoint)
    }

    fn sample_raw<S: RandomStream + ?Sized>(
        &self,
        e_in: f64,
        adjoint: bool,
        stream: &mut S,
    ) -> Result<(f64, f64)> {
        let interp = self.interpolation;
        let two_d = self.two_d;

        match &self.law {
            ScatteringLaw::Isotropic => Ok((e_in, 2.0 * stream.next() - 1.0)),
            ScatteringLaw::Absorption => Ok((0.0, 1.0)),
            ScatteringLaw::AnalogElastic { cosines, frame } => {
                let mu = cosines.sample(e_in, stream, COSINE_INTERPOLATION, two_d)?;
                match *frame {
                    ScatteringFrame::Lab => Ok((e_in, mu)),
                    ScatteringFrame::CenterOfMass { awr } => {
                        if adjoint {
                            adjoint_elastic_cm(e_in, mu, awr)
                        } else {
                            let e_cm = e_in * (awr / (awr + 1.0)).powi(2);
                            Ok(cm_to_lab(e_in, e_cm, mu, awr))
                        }
                    }
                }
            }
            ScatteringLaw::HybridElastic {
                cutoff,
                discrete,
                cutoff_ratios,
                cutoff_mu,
            } => {
                let ratio =
                    COSINE_INTERPOLATION.evaluate_table(cutoff.energies(), cutoff_ratios, e_in)?;
                let xi = stream.next();
                let mu = if xi <= ratio {
                    let mu = cutoff.sample(e_in, stream, COSINE_INTERPOLATION, two_d)?;
                    if mu > *cutoff_mu + ROUNDOFF_TOLERANCE {
                        return Err(CollisionError::PhysicsInvariant(format!(
                            "cutoff cosine {} above cutoff {}",
                            mu, cutoff_mu
                        )));
                    }
                    mu
                } else {
                    let (i, f) = cutoff.bracket(e_in, COSINE_INTERPOLATION)?;
                    let pick = if stream.next() < f { i + 1 } else { i };
                    discrete[pick].sample((xi - ratio) / (1.0 - ratio))
                };
                Ok((e_in, mu))
            }
            ScatteringLaw::AtomicExcitation {
                energy,
                energy_loss,
            } => {
                let loss = interp.evaluate_table(energy, energy_loss, e_in)?;
                let e_out = if adjoint { e_in + loss } else { e_in - loss };
                Ok((e_out, 1.0))
            }
            ScatteringLaw::Bremsstrahlung { photon_energy } => {
                let k = photon_energy.sample(e_in, stream, interp, two_d)?;
                let e_out = if adjoint { e_in + k } else { e_in - k };
                Ok((e_out, 1.0))
            }
            ScatteringLaw::Electroionization {
                binding_energy,
                knock_on_energy,
            } => {
                let knock_on = knock_on_energy.sample(e_in, stream, interp, two_d)?;
                if adjoint {
                    let e_out = e_in + binding_energy + knock_on;
                    Ok((e_out, primary_ionization_cosine(e_out, e_in)))
                } else {
                    let e_out = e_in - binding_energy - knock_on;
                    if e_out < 0.0 {
                        return Err(CollisionError::PhysicsInvariant(format!(
                            "electroionization leaves negative energy {} \
                             (E_in {}, binding {}, knock-on {})",
                            e_out, e_in, binding_energy, knock_on
                        )));
                    }
                    Ok((e_out, primary_ionization_cosine(e_in, e_out)))
                }
            }
            ScatteringLaw::LevelInelastic { q_value, awr } => {
                let threshold = (awr + 1.0) / awr * q_value.abs();
                let mass_ratio = (awr / (awr + 1.0)).powi(2);
                if !adjoint && e_in < threshold {
                    return Err(CollisionError::Domain(format!(
                        "energy {} below level inelastic threshold {}",
                        e_in, threshold
                    )));
                }
                let mu_cm = 2.0 * stream.next() - 1.0;
                if adjoint {
                    Ok((e_in / mass_ratio + threshold, mu_cm))
                } else {
                    let e_cm = mass_ratio * (e_in - threshold);
                    Ok(cm_to_lab(e_in, e_cm, mu_cm, *awr))
                }
            }
            ScatteringLaw::TabulatedEnergy {
                outgoing_energy,
                cosines,
                frame,
            } => {
                let e_out = outgoing_energy.sample(e_in, stream, interp, two_d)?;
                let mu = match cosines {
                    Some(table) => table.sample(e_in, stream, COSINE_INTERPOLATION, two_d)?,
                    None => 2.0 * stream.next() - 1.0,
                };
                Ok(apply_frame(*frame, e_in, e_out, mu))
            }
            ScatteringLaw::KalbachMann {
                outgoing_energy,
                precompound,
                slope,
                frame,
            } => {
                let sample = outgoing_energy.sample_indexed(e_in, stream, interp, two_d)?;
                let grid = outgoing_energy.distributions()[sample.index].grid();
                let e_raw = sample.raw.clamp(grid[0], grid[grid.len() - 1]);
                let r =
                    Interpolation::LinLin.evaluate_table(grid, &precompound[sample.index], e_raw)?;
                let a = Interpolation::LinLin.evaluate_table(grid, &slope[sample.index], e_raw)?;
                let mu = kalbach_cosine(r, a, stream.next(), stream.next());
                Ok(apply_frame(*frame, e_in, sample.value, mu))
            }
            ScatteringLaw::Incoherent { energy_ratio } => {
                let ratio = energy_ratio.sample(e_in, stream, interp, two_d)?;
                if !(ratio > 0.0) {
                    return Err(CollisionError::PhysicsInvariant(format!(
                        "incoherent energy ratio {} not positive",
                        ratio
                    )));
                }
                let mc2 = ELECTRON_REST_MASS_MEV;
                if adjoint {
                    let e_out = e_in / ratio;
                    Ok((e_out, 1.0 - mc2 * (1.0 / e_in - 1.0 / e_out)))
                } else {
                    let e_out = e_in * ratio;
                    Ok((e_out, 1.0 - mc2 * (1.0 / e_out - 1.0 / e_in)))
                }
            }
            ScatteringLaw::Annihilation => Ok((ELECTRON_REST_MASS_MEV, 2.0 * stream.next() - 1.0)),
        }
    }

    fn bounds_energy(&self) -> bool {
        !matches!(
            self.law,
            ScatteringLaw::Annihilation | ScatteringLaw::Absorption
        )
    }

    fn check_outgoing(&self, e_in: f64, e_out: f64, mu: f64, adjoint: bool) -> Result<(f64, f64)> {
        let mu = snap_into(mu, -1.0, 1.0, ROUNDOFF_TOLERANCE).ok_or_else(|| {
            CollisionError::PhysicsInvariant(format!(
                "sampled cosine {} outside [-1, 1] at {} MeV",
                mu, e_in
            ))
        })?;

        let tol = ROUNDOFF_TOLERANCE * e_in.max(1.0);
        let (lower, upper) = if !self.bounds_energy() {
            (0.0, f64::INFINITY)
        } else if adjoint {
            (e_in, f64::INFINITY)
        } else {
            (0.0, e_in)
        };
        let e_out = snap_into(e_out, lower, upper, tol).ok_or_else(|| {
            CollisionError::PhysicsInvariant(format!(
                "sampled energy {} MeV outside [{}, {}] for incoming {} MeV",
                e_out, lower, upper, e_in
            ))
        })?;

        trace!(e_in, e_out, mu, adjoint, "sampled outgoing state");
        Ok((e_out, mu))
    }
}

/// `value` if it lies in `[lower, upper]`, the bound if it lies within `tol`
/// outside it, otherwise `None`.
fn snap_into(value: f64, lower: f64, upper: f64, tol: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else if value < lower {
        (lower - value <= tol).then_some(lower)
    } else if value > upper {
        (value - upper <= tol).then_some(upper)
    } else {
        Some(value)
    }
}

/// Transform an outgoing energy and cosine from the centre-of-mass frame of
/// a target at rest to the lab frame.
pub fn cm_to_lab(e_in: f64, e_cm: f64, mu_cm: f64, awr: f64) -> (f64, f64) {
    let ap1 = awr + 1.0;
    let e_lab = e_cm + (e_in + 2.0 * mu_cm * ap1 * (e_in * e_cm).sqrt()) / (ap1 * ap1);
    if e_lab <= 0.0 {
        return (0.0, mu_cm);
    }
    let mu_lab = mu_cm * (e_cm / e_lab).sqrt() + (e_in / e_lab).sqrt() / ap1;
    (e_lab, mu_lab)
}

fn apply_frame(frame: ScatteringFrame, e_in: f64, e_out: f64, mu: f64) -> (f64, f64) {
    match frame {
        ScatteringFrame::Lab => (e_out, mu),
        ScatteringFrame::CenterOfMass { awr } => cm_to_lab(e_in, e_out, mu, awr),
    }
}

/// Adjoint of target-at-rest elastic scattering: the energy the projectile
/// must have had to arrive at `e_in` after scattering through `mu_cm`.
/// A target of unit mass cannot reach `e_in` from a CM backscatter.
fn adjoint_elastic_cm(e_in: f64, mu_cm: f64, awr: f64) -> Result<(f64, f64)> {
    let denom = awr * awr + 2.0 * awr * mu_cm + 1.0;
    if !(denom > 0.0) {
        return Err(CollisionError::PhysicsInvariant(format!(
            "no adjoint elastic state for CM cosine {} with AWR {}",
            mu_cm, awr
        )));
    }
    let e_out = e_in * (awr + 1.0).powi(2) / denom;
    let mu_lab = (1.0 + awr * mu_cm) / denom.sqrt();
    Ok((e_out, mu_lab))
}

/// Polar cosine of the primary electron after an ionizing collision that
/// takes it from `e_high` down to `e_low`.
fn primary_ionization_cosine(e_high: f64, e_low: f64) -> f64 {
    if e_low <= 0.0 {
        return 0.0;
    }
    let two_mc2 = 2.0 * ELECTRON_REST_MASS_MEV;
    ((e_low / e_high) * (e_high + two_mc2) / (e_low + two_mc2)).sqrt()
}

/// Kalbach-Mann angular sampling given precompound fraction `r` and slope `a`.
fn kalbach_cosine(r: f64, a: f64, xi1: f64, xi2: f64) -> f64 {
    if a.abs() < 1e-12 {
        return 2.0 * xi2 - 1.0;
    }
    if xi1 > r {
        let t = (2.0 * xi2 - 1.0) * a.sinh();
        (t + (t * t + 1.0).sqrt()).ln() / a
    } else {
        (xi2 * a.exp() + (1.0 - xi2) * (-a).exp()).ln() / a
    }
}
