use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cross_section::CrossSectionTable;
use crate::distribution::ScatteringDistribution;
use crate::error::{CollisionError, Result};
use crate::interpolation::Interpolation;
use crate::particle::{ParticleState, Species};
use crate::random_stream::RandomStream;

/// Physical process tag. Ordering is stable and used for iteration over a
/// material's reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReactionType {
    // neutron
    Elastic,
    /// Discrete level n (MT 50 + n)
    LevelInelastic(u8),
    ContinuumInelastic,
    Capture,
    Fission,
    // photon
    Coherent,
    Incoherent,
    Photoelectric,
    PairProduction,
    // electron and positron
    AnalogElastic,
    HybridElastic,
    AtomicExcitation,
    Bremsstrahlung,
    Electroionization { subshell: u8 },
    PositronAnnihilation,
}

impl ReactionType {
    /// Neutron reaction for an ENDF MT number.
    pub fn from_mt(mt: i32) -> Option<Self> {
        match mt {
            2 => Some(ReactionType::Elastic),
            18 => Some(ReactionType::Fission),
            51..=90 => Some(ReactionType::LevelInelastic((mt - 50) as u8)),
            91 => Some(ReactionType::ContinuumInelastic),
            102 => Some(ReactionType::Capture),
            _ => None,
        }
    }

    pub fn mt(&self) -> Option<i32> {
        match self {
            ReactionType::Elastic => Some(2),
            ReactionType::Fission => Some(18),
            ReactionType::LevelInelastic(level) => Some(50 + *level as i32),
            ReactionType::ContinuumInelastic => Some(91),
            ReactionType::Capture => Some(102),
            _ => None,
        }
    }

    /// The incoming particle is removed by the reaction.
    pub fn is_absorption(&self) -> bool {
        matches!(
            self,
            ReactionType::Capture | ReactionType::Fission | ReactionType::Photoelectric
        )
    }

    /// Whether the reaction is defined for a particle species (forward or
    /// adjoint).
    pub fn applies_to(&self, species: Species) -> bool {
        use ReactionType::*;
        match species {
            Species::Neutron | Species::AdjointNeutron => matches!(
                self,
                Elastic | LevelInelastic(_) | ContinuumInelastic | Capture | Fission
            ),
            Species::Photon | Species::AdjointPhoton => matches!(
                self,
                Coherent | Incoherent | Photoelectric | PairProduction
            ),
            Species::Electron | Species::AdjointElectron => matches!(
                self,
                AnalogElastic
                    | HybridElastic
                    | AtomicExcitation
                    | Bremsstrahlung
                    | Electroionization { .. }
            ),
            Species::Positron => matches!(
                self,
                AnalogElastic
                    | HybridElastic
                    | AtomicExcitation
                    | Bremsstrahlung
                    | Electroionization { .. }
                    | PositronAnnihilation
            ),
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactionType::LevelInelastic(level) => write!(f, "level inelastic {}", level),
            ReactionType::Electroionization { subshell } => {
                write!(f, "electroionization subshell {}", subshell)
            }
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransportDirection {
    #[default]
    Forward,
    Adjoint,
}

impl TransportDirection {
    pub fn for_species(species: Species) -> Self {
        if species.is_adjoint() {
            TransportDirection::Adjoint
        } else {
            TransportDirection::Forward
        }
    }
}

/// One physical process for one species: a cross section plus the
/// distribution of the outgoing state.
#[derive(Debug, Clone)]
pub struct Reaction {
    reaction_type: ReactionType,
    species: Species,
    direction: TransportDirection,
    interpolation: Interpolation,
    cross_section: Arc<CrossSectionTable>,
    distribution: Arc<ScatteringDistribution>,
}

impl Reaction {
    /// Transport direction follows the species.
    pub fn new(
        reaction_type: ReactionType,
        species: Species,
        interpolation: Interpolation,
        cross_section: Arc<CrossSectionTable>,
        distribution: Arc<ScatteringDistribution>,
    ) -> Result<Self> {
        if !reaction_type.applies_to(species) {
            return Err(CollisionError::invalid_table(format!(
                "reaction {} is not defined for {}",
                reaction_type, species
            )));
        }
        if reaction_type.is_absorption() != distribution.is_absorption() {
            return Err(CollisionError::invalid_table(format!(
                "reaction {} paired with a mismatched absorption distribution",
                reaction_type
            )));
        }
        Ok(Self {
            reaction_type,
            species,
            direction: TransportDirection::for_species(species),
            interpolation,
            cross_section,
            distribution,
        })
    }

    pub fn reaction_type(&self) -> ReactionType {
        self.reaction_type
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn direction(&self) -> TransportDirection {
        self.direction
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn distribution(&self) -> &ScatteringDistribution {
        &self.distribution
    }

    pub fn cross_section_table(&self) -> &CrossSectionTable {
        &self.cross_section
    }

    /// Lowest energy at which the reaction is tabulated.
    pub fn threshold_energy(&self) -> f64 {
        self.cross_section.min_energy()
    }

    pub fn is_absorption(&self) -> bool {
        self.reaction_type.is_absorption()
    }

    /// Species leaving the collision.
    pub fn outgoing_species(&self) -> Species {
        match self.reaction_type {
            ReactionType::PositronAnnihilation => Species::Photon,
            _ => self.species,
        }
    }

    /// Microscopic cross section in barns.
    pub fn cross_section(&self, energy: f64) -> Result<f64> {
        self.cross_section.evaluate(energy, self.interpolation)
    }

    /// Apply the reaction to `particle`. Absorption kills the particle.
    /// Adjoint reactions scale the weight by sigma(E_out) / sigma(E_in).
    pub fn react<S: RandomStream + ?Sized>(
        &self,
        particle: &mut ParticleState,
        stream: &mut S,
    ) -> Result<()> {
        if self.is_absorption() {
            particle.kill();
            particle.collision_number += 1;
            return Ok(());
        }

        let e_in = particle.energy;
        let (e_out, mu) = self
            .distribution
            .sample_directed(e_in, self.direction, stream)?;

        let weight_factor = match self.direction {
            TransportDirection::Forward => 1.0,
            TransportDirection::Adjoint => {
                let sigma_in = self.cross_section(e_in)?;
                if !(sigma_in > 0.0) {
                    return Err(CollisionError::Domain(format!(
                        "adjoint {} has zero cross section at {} MeV",
                        self.reaction_type, e_in
                    )));
                }
                self.cross_section(e_out)? / sigma_in
            }
        };

        particle.energy = e_out;
        particle.weight *= weight_factor;
        particle.species = self.outgoing_species();
        particle.collision_number += 1;
        if e_out > 0.0 {
            particle.scatter_direction(mu, stream);
        } else {
            debug!(reaction = %self.reaction_type, "particle stopped at zero energy");
            particle.kill();
        }
        Ok(())
    }
}
