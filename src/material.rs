use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{CollisionError, Result};
use crate::particle::Species;
use crate::random_stream::RandomStream;
use crate::reaction::{Reaction, ReactionType};

/// A homogeneous mixture seen by one particle species: its atom density and
/// the reactions available to that species.
#[derive(Debug, Clone)]
pub struct Material {
    pub id: u32,
    pub name: Option<String>,
    species: Species,
    /// atoms per barn-cm
    atom_density: f64,
    reactions: BTreeMap<ReactionType, Reaction>,
}

impl Material {
    pub fn new(id: u32, species: Species, atom_density: f64) -> Result<Self> {
        if !(atom_density > 0.0) || !atom_density.is_finite() {
            return Err(CollisionError::invalid_table(format!(
                "material {} atom density must be positive, got {}",
                id, atom_density
            )));
        }
        Ok(Self {
            id,
            name: None,
            species,
            atom_density,
            reactions: BTreeMap::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display label: the name when set, otherwise the id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("material {}", self.id),
        }
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn atom_density(&self) -> f64 {
        self.atom_density
    }

    pub fn add_reaction(&mut self, reaction: Reaction) -> Result<()> {
        if reaction.species() != self.species {
            return Err(CollisionError::invalid_table(format!(
                "{} reaction {} added to {} material {}",
                reaction.species(),
                reaction.reaction_type(),
                self.species,
                self.id
            )));
        }
        if self.reactions.contains_key(&reaction.reaction_type()) {
            return Err(CollisionError::invalid_table(format!(
                "material {} already has reaction {}",
                self.id,
                reaction.reaction_type()
            )));
        }
        self.reactions.insert(reaction.reaction_type(), reaction);
        Ok(())
    }

    pub fn with_reaction(mut self, reaction: Reaction) -> Result<Self> {
        self.add_reaction(reaction)?;
        Ok(self)
    }

    pub fn reaction(&self, reaction_type: ReactionType) -> Option<&Reaction> {
        self.reactions.get(&reaction_type)
    }

    pub fn has_reaction(&self, reaction_type: ReactionType) -> bool {
        self.reactions.contains_key(&reaction_type)
    }

    /// Reactions in `ReactionType` order.
    pub fn reactions(&self) -> impl Iterator<Item = &Reaction> {
        self.reactions.values()
    }

    /// Lowest energy at which any reaction is tabulated.
    pub fn min_energy(&self) -> f64 {
        self.reactions
            .values()
            .map(|r| r.threshold_energy())
            .fold(f64::INFINITY, f64::min)
    }

    /// Contribution of one reaction in 1/cm. Zero below its threshold as
    /// long as the energy is inside the material's overall range.
    fn reaction_xs(&self, reaction: &Reaction, energy: f64) -> Result<f64> {
        if energy < reaction.threshold_energy() && energy >= self.min_energy() {
            return Ok(0.0);
        }
        Ok(self.atom_density * reaction.cross_section(energy)?)
    }

    /// Macroscopic cross section of one reaction in 1/cm, zero if the
    /// material does not have the reaction.
    pub fn macroscopic_cross_section(
        &self,
        reaction_type: ReactionType,
        energy: f64,
    ) -> Result<f64> {
        match self.reactions.get(&reaction_type) {
            Some(reaction) => self.reaction_xs(reaction, energy),
            None => Ok(0.0),
        }
    }

    fn sum_xs<F>(&self, energy: f64, include: F) -> Result<f64>
    where
        F: Fn(&Reaction) -> bool,
    {
        let mut total = 0.0;
        for reaction in self.reactions.values().filter(|r| include(*r)) {
            total += self.reaction_xs(reaction, energy)?;
        }
        Ok(total)
    }

    pub fn macroscopic_total_cross_section(&self, energy: f64) -> Result<f64> {
        self.sum_xs(energy, |_| true)
    }

    pub fn macroscopic_absorption_cross_section(&self, energy: f64) -> Result<f64> {
        self.sum_xs(energy, |r| r.is_absorption())
    }

    pub fn macroscopic_scattering_cross_section(&self, energy: f64) -> Result<f64> {
        self.sum_xs(energy, |r| !r.is_absorption())
    }

    /// Select the colliding reaction with probability proportional to its
    /// macroscopic cross section. Uses exactly one deviate.
    pub fn sample_reaction<S: RandomStream + ?Sized>(
        &self,
        energy: f64,
        stream: &mut S,
    ) -> Result<&Reaction> {
        self.sample_among(energy, stream, |_| true)
    }

    /// As [`Material::sample_reaction`], restricted to non-absorbing
    /// reactions.
    pub fn sample_scattering_reaction<S: RandomStream + ?Sized>(
        &self,
        energy: f64,
        stream: &mut S,
    ) -> Result<&Reaction> {
        self.sample_among(energy, stream, |r| !r.is_absorption())
    }

    fn sample_among<S, F>(&self, energy: f64, stream: &mut S, include: F) -> Result<&Reaction>
    where
        S: RandomStream + ?Sized,
        F: Fn(&Reaction) -> bool,
    {
        let total = self.sum_xs(energy, &include)?;
        if !(total > 0.0) {
            return Err(CollisionError::Domain(format!(
                "no reaction with positive cross section in {} at {} MeV",
                self.label(),
                energy
            )));
        }

        let target = stream.next() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for reaction in self.reactions.values().filter(|r| include(*r)) {
            let xs = self.reaction_xs(reaction, energy)?;
            if xs <= 0.0 {
                continue;
            }
            cumulative += xs;
            if target < cumulative {
                trace!(reaction = %reaction.reaction_type(), energy, "sampled reaction");
                return Ok(reaction);
            }
            last_positive = Some(reaction);
        }
        // round-off in the cumulative sum
        last_positive.ok_or_else(|| {
            CollisionError::Domain(format!(
                "reaction sampling in {} found no candidate at {} MeV",
                self.label(),
                energy
            ))
        })
    }

    /// Distance to the next collision in cm, -ln(xi) / Sigma_t. Infinite
    /// when the total cross section is zero; no deviate is used then.
    pub fn sample_distance_to_collision<S: RandomStream + ?Sized>(
        &self,
        energy: f64,
        stream: &mut S,
    ) -> Result<f64> {
        let sigma_t = self.macroscopic_total_cross_section(energy)?;
        if sigma_t <= 0.0 {
            return Ok(f64::INFINITY);
        }
        // 1 - xi lies in (0, 1]
        Ok(-(1.0 - stream.next()).ln() / sigma_t)
    }
}
