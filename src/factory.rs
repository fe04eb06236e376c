//! Construction of scattering distributions from pre-parsed tabulated data.
//!
//! The data layer hands over a [`TabulatedScatteringData`] record (usually
//! deserialised from JSON). [`DistributionFactory::build`] maps the reaction
//! tag to its sampling law and validates the tables it needs.

use serde::{Deserialize, Serialize};

use crate::distribution::{
    ScatteringDistribution, ScatteringFrame, ScatteringLaw, ROUNDOFF_TOLERANCE,
};
use crate::error::{CollisionError, Result};
use crate::interpolation::Interpolation;
use crate::reaction::ReactionType;
use crate::tabular::{ConditionalTable, DiscreteCdf, TabularCdf, TwoDSampling};

/// Distributions of one variable tabulated as PDFs at a set of incoming
/// energies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalData {
    pub incoming_energies: Vec<f64>,
    pub grids: Vec<Vec<f64>>,
    pub pdfs: Vec<Vec<f64>>,
}

impl ConditionalData {
    pub fn build(&self) -> Result<ConditionalTable> {
        if self.grids.len() != self.incoming_energies.len()
            || self.pdfs.len() != self.incoming_energies.len()
        {
            return Err(CollisionError::invalid_table(format!(
                "{} incoming energies, {} grids and {} PDFs",
                self.incoming_energies.len(),
                self.grids.len(),
                self.pdfs.len()
            )));
        }
        let distributions = self
            .grids
            .iter()
            .zip(self.pdfs.iter())
            .map(|(grid, pdf)| TabularCdf::from_pdf(grid.clone(), pdf.clone()))
            .collect::<Result<Vec<_>>>()?;
        ConditionalTable::new(self.incoming_energies.clone(), distributions)
    }
}

/// Discrete cosines and weights, one set per incoming energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteData {
    pub values: Vec<Vec<f64>>,
    pub weights: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyLossData {
    pub energies: Vec<f64>,
    pub losses: Vec<f64>,
}

/// Kalbach-Mann parameters on the outgoing-energy grids of `outgoing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KalbachData {
    pub precompound: Vec<Vec<f64>>,
    pub slope: Vec<Vec<f64>>,
}

/// Everything the data layer may know about one reaction's secondary
/// distribution. Fields a reaction does not use are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TabulatedScatteringData {
    /// Cosine distributions (elastic, coherent, continuum angular part)
    pub angular: Option<ConditionalData>,
    /// Outgoing energy, photon energy, knock-on energy or energy ratio
    pub outgoing: Option<ConditionalData>,
    pub cutoff_cosine: Option<f64>,
    pub discrete: Option<DiscreteData>,
    pub cutoff_ratios: Vec<f64>,
    pub energy_loss: Option<EnergyLossData>,
    /// Subshell binding energy in MeV
    pub binding_energy: Option<f64>,
    /// Reaction Q value in MeV
    pub q_value: Option<f64>,
    pub awr: Option<f64>,
    /// Outgoing tables are given in the centre-of-mass frame
    pub center_of_mass: bool,
    pub kalbach: Option<KalbachData>,
    pub two_d_sampling: TwoDSampling,
}

impl TabulatedScatteringData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CollisionError::invalid_table(format!("bad scattering data: {}", e)))
    }
}

pub struct DistributionFactory;

impl DistributionFactory {
    pub fn build(
        data: &TabulatedScatteringData,
        reaction_type: ReactionType,
        interpolation: Interpolation,
    ) -> Result<ScatteringDistribution> {
        let law = match reaction_type {
            ReactionType::Elastic => {
                let awr = require_awr(data, reaction_type)?;
                let cosines = match &data.angular {
                    Some(angular) => angular.build()?,
                    None => isotropic_cosines()?,
                };
                ScatteringLaw::AnalogElastic {
                    cosines,
                    frame: ScatteringFrame::CenterOfMass { awr },
                }
            }
            ReactionType::LevelInelastic(_) => {
                let q_value = data.q_value.ok_or_else(|| missing(reaction_type, "Q value"))?;
                let awr = require_awr(data, reaction_type)?;
                ScatteringLaw::LevelInelastic { q_value, awr }
            }
            ReactionType::ContinuumInelastic => {
                let outgoing_energy =
                    require(&data.outgoing, reaction_type, "outgoing energy")?.build()?;
                let frame = frame_of(data, reaction_type)?;
                match &data.kalbach {
                    Some(kalbach) => kalbach_law(outgoing_energy, kalbach, frame)?,
                    None => ScatteringLaw::TabulatedEnergy {
                        outgoing_energy,
                        cosines: data.angular.as_ref().map(|a| a.build()).transpose()?,
                        frame,
                    },
                }
            }
            ReactionType::Capture | ReactionType::Photoelectric => ScatteringLaw::Absorption,
            ReactionType::Fission | ReactionType::PairProduction => {
                return Err(CollisionError::UnsupportedReactionType(reaction_type))
            }
            ReactionType::Coherent => ScatteringLaw::AnalogElastic {
                cosines: require(&data.angular, reaction_type, "cosine tables")?.build()?,
                frame: ScatteringFrame::Lab,
            },
            ReactionType::Incoherent => ScatteringLaw::Incoherent {
                energy_ratio: require(&data.outgoing, reaction_type, "energy ratio")?.build()?,
            },
            ReactionType::AnalogElastic | ReactionType::HybridElastic => {
                electron_elastic_law(data, reaction_type)?
            }
            ReactionType::AtomicExcitation => {
                let loss = require(&data.energy_loss, reaction_type, "energy loss table")?;
                // validated like a cross section: sorted grid, non-negative losses
                crate::cross_section::CrossSectionTable::new(
                    loss.energies.clone(),
                    loss.losses.clone(),
                )?;
                ScatteringLaw::AtomicExcitation {
                    energy: loss.energies.clone(),
                    energy_loss: loss.losses.clone(),
                }
            }
            ReactionType::Bremsstrahlung => ScatteringLaw::Bremsstrahlung {
                photon_energy: require(&data.outgoing, reaction_type, "photon energy")?.build()?,
            },
            ReactionType::Electroionization { .. } => {
                let binding_energy = data
                    .binding_energy
                    .ok_or_else(|| missing(reaction_type, "binding energy"))?;
                if !(binding_energy >= 0.0) {
                    return Err(CollisionError::invalid_table(format!(
                        "negative binding energy {}",
                        binding_energy
                    )));
                }
                ScatteringLaw::Electroionization {
                    binding_energy,
                    knock_on_energy: require(&data.outgoing, reaction_type, "knock-on energy")?
                        .build()?,
                }
            }
            ReactionType::PositronAnnihilation => ScatteringLaw::Annihilation,
        };

        Ok(ScatteringDistribution::new(law, interpolation).with_two_d_sampling(data.two_d_sampling))
    }
}

fn missing(reaction_type: ReactionType, what: &str) -> CollisionError {
    CollisionError::invalid_table(format!("{} data has no {}", reaction_type, what))
}

fn require<'a, T>(field: &'a Option<T>, reaction_type: ReactionType, what: &str) -> Result<&'a T> {
    field.as_ref().ok_or_else(|| missing(reaction_type, what))
}

fn require_awr(data: &TabulatedScatteringData, reaction_type: ReactionType) -> Result<f64> {
    let awr = data.awr.ok_or_else(|| missing(reaction_type, "atomic weight ratio"))?;
    if !(awr > 0.0) {
        return Err(CollisionError::invalid_table(format!(
            "atomic weight ratio must be positive, got {}",
            awr
        )));
    }
    Ok(awr)
}

fn frame_of(
    data: &TabulatedScatteringData,
    reaction_type: ReactionType,
) -> Result<ScatteringFrame> {
    if data.center_of_mass {
        Ok(ScatteringFrame::CenterOfMass {
            awr: require_awr(data, reaction_type)?,
        })
    } else {
        Ok(ScatteringFrame::Lab)
    }
}

/// Cosines isotropic at every incoming energy.
fn isotropic_cosines() -> Result<ConditionalTable> {
    ConditionalTable::energy_independent(
        f64::MIN_POSITIVE,
        f64::MAX,
        TabularCdf::uniform(-1.0, 1.0)?,
    )
}

fn kalbach_law(
    outgoing_energy: ConditionalTable,
    kalbach: &KalbachData,
    frame: ScatteringFrame,
) -> Result<ScatteringLaw> {
    let n = outgoing_energy.distributions().len();
    if kalbach.precompound.len() != n || kalbach.slope.len() != n {
        return Err(CollisionError::invalid_table(format!(
            "Kalbach-Mann parameters given for {} / {} of {} distributions",
            kalbach.precompound.len(),
            kalbach.slope.len(),
            n
        )));
    }
    for (i, dist) in outgoing_energy.distributions().iter().enumerate() {
        let points = dist.grid().len();
        if kalbach.precompound[i].len() != points || kalbach.slope[i].len() != points {
            return Err(CollisionError::invalid_table(format!(
                "Kalbach-Mann parameters for distribution {} do not match its {} grid points",
                i, points
            )));
        }
        if let Some(r) = kalbach.precompound[i].iter().find(|r| !(0.0..=1.0).contains(*r)) {
            return Err(CollisionError::invalid_table(format!(
                "precompound fraction {} outside [0, 1]",
                r
            )));
        }
    }
    Ok(ScatteringLaw::KalbachMann {
        outgoing_energy,
        precompound: kalbach.precompound.clone(),
        slope: kalbach.slope.clone(),
        frame,
    })
}

fn electron_elastic_law(
    data: &TabulatedScatteringData,
    reaction_type: ReactionType,
) -> Result<ScatteringLaw> {
    let cosines = require(&data.angular, reaction_type, "cosine tables")?.build()?;

    let cutoff_mu = match data.cutoff_cosine {
        // a cutoff at mu = 1 leaves nothing for the discrete part
        Some(mu) if mu < 1.0 => mu,
        Some(_) | None => {
            if reaction_type == ReactionType::HybridElastic && data.cutoff_cosine.is_none() {
                return Err(missing(reaction_type, "cutoff cosine"));
            }
            return Ok(ScatteringLaw::AnalogElastic {
                cosines,
                frame: ScatteringFrame::Lab,
            });
        }
    };
    if !(cutoff_mu > -1.0) {
        return Err(CollisionError::invalid_table(format!(
            "cutoff cosine {} outside (-1, 1]",
            cutoff_mu
        )));
    }

    let n = cosines.energies().len();
    if let Some(dist) = cosines
        .distributions()
        .iter()
        .find(|d| d.max() > cutoff_mu + ROUNDOFF_TOLERANCE)
    {
        return Err(CollisionError::invalid_table(format!(
            "cutoff distribution extends to {} beyond cutoff cosine {}",
            dist.max(),
            cutoff_mu
        )));
    }

    let discrete_data = require(&data.discrete, reaction_type, "discrete cosines")?;
    if discrete_data.values.len() != n || discrete_data.weights.len() != n {
        return Err(CollisionError::invalid_table(format!(
            "discrete cosines given for {} of {} incoming energies",
            discrete_data.values.len(),
            n
        )));
    }
    let discrete = discrete_data
        .values
        .iter()
        .zip(discrete_data.weights.iter())
        .map(|(values, weights)| {
            if let Some(mu) = values.iter().find(|mu| !(**mu > cutoff_mu && **mu <= 1.0)) {
                return Err(CollisionError::invalid_table(format!(
                    "discrete cosine {} not in (cutoff, 1]",
                    mu
                )));
            }
            DiscreteCdf::new(values.clone(), weights.clone())
        })
        .collect::<Result<Vec<_>>>()?;

    if data.cutoff_ratios.len() != n {
        return Err(CollisionError::invalid_table(format!(
            "{} cutoff ratios for {} incoming energies",
            data.cutoff_ratios.len(),
            n
        )));
    }
    if let Some(r) = data.cutoff_ratios.iter().find(|r| !(0.0..=1.0).contains(*r)) {
        return Err(CollisionError::invalid_table(format!(
            "cutoff cross section ratio {} outside [0, 1]",
            r
        )));
    }

    Ok(ScatteringLaw::HybridElastic {
        cutoff: cosines,
        discrete,
        cutoff_ratios: data.cutoff_ratios.clone(),
        cutoff_mu,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random_stream::LcgStream;

    fn uniform_family(energies: &[f64], min: f64, max: f64) -> ConditionalData {
        ConditionalData {
            incoming_energies: energies.to_vec(),
            grids: energies.iter().map(|_| vec![min, max]).collect(),
            pdfs: energies.iter().map(|_| vec![1.0, 1.0]).collect(),
        }
    }

    #[test]
    fn test_unsupported_reactions() {
        let data = TabulatedScatteringData::default();
        for reaction_type in [ReactionType::Fission, ReactionType::PairProduction] {
            assert_eq!(
                DistributionFactory::build(&data, reaction_type, Interpolation::LinLin),
                Err(CollisionError::UnsupportedReactionType(reaction_type))
            );
        }
    }

    #[test]
    fn test_missing_metadata_is_invalid_table() {
        let data = TabulatedScatteringData::default();
        for reaction_type in [
            ReactionType::Elastic,
            ReactionType::LevelInelastic(1),
            ReactionType::Coherent,
            ReactionType::Bremsstrahlung,
            ReactionType::Electroionization { subshell: 1 },
            ReactionType::AtomicExcitation,
            ReactionType::HybridElastic,
        ] {
            assert!(matches!(
                DistributionFactory::build(&data, reaction_type, Interpolation::LinLin),
                Err(CollisionError::InvalidTable { .. })
            ));
        }
    }

    #[test]
    fn test_absorbing_channels() {
        let data = TabulatedScatteringData::default();
        let dist =
            DistributionFactory::build(&data, ReactionType::Capture, Interpolation::LinLin)
                .unwrap();
        assert!(dist.is_absorption());
        let dist =
            DistributionFactory::build(&data, ReactionType::Photoelectric, Interpolation::LogLog)
                .unwrap();
        assert!(dist.is_absorption());
    }

    #[test]
    fn test_cutoff_cosine_selects_hybrid() {
        let mut data = TabulatedScatteringData {
            angular: Some(uniform_family(&[1e-5, 1e5], -1.0, 0.9)),
            cutoff_cosine: Some(0.9),
            discrete: Some(DiscreteData {
                values: vec![vec![0.95, 0.99], vec![0.95, 0.99]],
                weights: vec![vec![1.0, 1.0], vec![1.0, 1.0]],
            }),
            cutoff_ratios: vec![0.5, 0.5],
            ..Default::default()
        };
        let dist =
            DistributionFactory::build(&data, ReactionType::AnalogElastic, Interpolation::LogLog)
                .unwrap();
        assert!(matches!(dist.law(), ScatteringLaw::HybridElastic { .. }));

        let mut stream = LcgStream::new(31);
        for _ in 0..1000 {
            let (e, mu) = dist.sample(1.0, &mut stream).unwrap();
            assert_eq!(e, 1.0);
            assert!((-1.0..=0.9).contains(&mu) || mu == 0.95 || mu == 0.99);
        }

        // without a cutoff the same tag is analog
        data.cutoff_cosine = None;
        let dist =
            DistributionFactory::build(&data, ReactionType::AnalogElastic, Interpolation::LogLog)
                .unwrap();
        assert!(matches!(dist.law(), ScatteringLaw::AnalogElastic { .. }));
    }

    #[test]
    fn test_hybrid_rejects_discrete_below_cutoff() {
        let data = TabulatedScatteringData {
            angular: Some(uniform_family(&[1e-5, 1e5], -1.0, 0.9)),
            cutoff_cosine: Some(0.9),
            discrete: Some(DiscreteData {
                values: vec![vec![0.5], vec![0.95]],
                weights: vec![vec![1.0], vec![1.0]],
            }),
            cutoff_ratios: vec![0.5, 0.5],
            ..Default::default()
        };
        assert!(matches!(
            DistributionFactory::build(&data, ReactionType::HybridElastic, Interpolation::LinLin),
            Err(CollisionError::InvalidTable { .. })
        ));
    }

    #[test]
    fn test_level_inelastic_from_json() {
        let data = TabulatedScatteringData::from_json_str(r#"{"q_value": -1.0, "awr": 55.0}"#)
            .unwrap();
        let dist = DistributionFactory::build(
            &data,
            ReactionType::LevelInelastic(3),
            Interpolation::LinLin,
        )
        .unwrap();
        assert_eq!(
            dist.law(),
            &ScatteringLaw::LevelInelastic {
                q_value: -1.0,
                awr: 55.0
            }
        );
    }

    #[test]
    fn test_continuum_with_kalbach() {
        let outgoing = uniform_family(&[1.0, 20.0], 0.1, 0.5);
        let data = TabulatedScatteringData {
            outgoing: Some(outgoing),
            kalbach: Some(KalbachData {
                precompound: vec![vec![0.2, 0.4], vec![0.3, 0.5]],
                slope: vec![vec![1.0, 1.5], vec![1.2, 2.0]],
            }),
            ..Default::default()
        };
        let dist = DistributionFactory::build(
            &data,
            ReactionType::ContinuumInelastic,
            Interpolation::LinLin,
        )
        .unwrap();
        assert!(matches!(dist.law(), ScatteringLaw::KalbachMann { .. }));

        let mut stream = LcgStream::new(77);
        for _ in 0..1000 {
            let (e, mu) = dist.sample(10.0, &mut stream).unwrap();
            assert!((0.1..=0.5).contains(&e));
            assert!((-1.0..=1.0).contains(&mu));
        }
    }

    #[test]
    fn test_elastic_without_angular_data_is_isotropic_in_cm() {
        let data = TabulatedScatteringData {
            awr: Some(1.0),
            ..Default::default()
        };
        let dist =
            DistributionFactory::build(&data, ReactionType::Elastic, Interpolation::LinLin)
                .unwrap();
        let mut stream = LcgStream::new(3);
        let n = 20_000;
        let mean_energy: f64 = (0..n)
            .map(|_| dist.sample(2.0, &mut stream).unwrap().0)
            .sum::<f64>()
            / n as f64;
        // hydrogen, isotropic CM: mean outgoing energy is E / 2
        assert!((mean_energy - 1.0).abs() < 0.03, "mean = {}", mean_energy);
    }
}
