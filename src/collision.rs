//! Collision handling: maps a particle's cell to the material registered for
//! its species, samples the colliding reaction and applies it.
//!
//! A collision runs through three stages. The particle is located and void
//! cells short-circuit to [`CollisionOutcome::Streaming`] without touching
//! the random stream. Otherwise a reaction is sampled in proportion to its
//! macroscopic cross section, and the reaction then updates the particle.
//! The outcome tells the caller whether the history continues.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{CollisionError, Result};
use crate::geometry::{CellId, GeometryQuery};
use crate::material::Material;
use crate::particle::{ParticleState, Species};
use crate::random_stream::RandomStream;
use crate::reaction::ReactionType;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CollisionMode {
    /// Every reaction, absorption included, is sampled physically.
    #[serde(rename = "analogue")]
    #[default]
    Analogue,
    /// Only scattering reactions are sampled; the weight carries the
    /// survival probability 1 - Sigma_a / Sigma_t.
    #[serde(rename = "implicit-capture")]
    ImplicitCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// Analogue absorption by the named reaction
    Absorption(ReactionType),
    /// The reaction left the particle with zero energy
    Stopped(ReactionType),
    /// Implicit capture in a material without scattering reactions
    ImplicitAbsorption,
    RussianRoulette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    /// Void cell: nothing sampled, the particle keeps flying.
    Streaming,
    Collided { reaction_type: ReactionType },
    Terminated { cause: TerminationCause },
}

impl CollisionOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CollisionOutcome::Terminated { .. })
    }
}

/// Cell to material registry for one particle species.
#[derive(Debug, Clone)]
pub struct SpeciesCollisionHandler {
    species: Species,
    cell_materials: HashMap<CellId, Arc<Material>>,
}

impl SpeciesCollisionHandler {
    pub fn new(species: Species) -> Self {
        Self {
            species,
            cell_materials: HashMap::new(),
        }
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn register_material(&mut self, cell: CellId, material: Arc<Material>) -> Result<()> {
        if material.species() != self.species {
            return Err(CollisionError::invalid_table(format!(
                "{} material {} registered for {} in cell {}",
                material.species(),
                material.id,
                self.species,
                cell
            )));
        }
        self.cell_materials.insert(cell, material);
        Ok(())
    }

    pub fn material(&self, cell: CellId) -> Option<&Arc<Material>> {
        self.cell_materials.get(&cell)
    }

    pub fn number_of_cells(&self) -> usize {
        self.cell_materials.len()
    }
}

/// Collision façade over the per-species handlers.
pub struct CollisionHandler<G: GeometryQuery> {
    geometry: G,
    settings: Settings,
    handlers: BTreeMap<Species, SpeciesCollisionHandler>,
}

impl<G: GeometryQuery> CollisionHandler<G> {
    pub fn new(geometry: G, settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            geometry,
            settings,
            handlers: BTreeMap::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn handler(&self, species: Species) -> Option<&SpeciesCollisionHandler> {
        self.handlers.get(&species)
    }

    pub fn register_material(
        &mut self,
        species: Species,
        cell: CellId,
        material: Arc<Material>,
    ) -> Result<()> {
        info!(%species, cell, material = %material.label(), "registering material");
        self.handlers
            .entry(species)
            .or_insert_with(|| SpeciesCollisionHandler::new(species))
            .register_material(cell, material)
    }

    pub fn is_cell_void(&self, cell: CellId) -> bool {
        self.geometry.is_cell_void(cell)
    }

    /// Material at the particle's location, `None` in a void cell.
    pub fn material_at(&self, particle: &ParticleState) -> Result<Option<&Arc<Material>>> {
        let cell = self.geometry.cell_of(particle);
        if self.geometry.is_cell_void(cell) {
            return Ok(None);
        }
        self.handlers
            .get(&particle.species)
            .and_then(|h| h.material(cell))
            .map(Some)
            .ok_or_else(|| CollisionError::UnmappedCell {
                cell,
                species: particle.species.to_string(),
            })
    }

    /// Total macroscopic cross section in 1/cm; exactly zero in a void cell.
    pub fn macroscopic_total_cross_section(&self, particle: &ParticleState) -> Result<f64> {
        match self.material_at(particle)? {
            Some(material) => material.macroscopic_total_cross_section(particle.energy),
            None => Ok(0.0),
        }
    }

    pub fn macroscopic_reaction_cross_section(
        &self,
        particle: &ParticleState,
        reaction_type: ReactionType,
    ) -> Result<f64> {
        match self.material_at(particle)? {
            Some(material) => material.macroscopic_cross_section(reaction_type, particle.energy),
            None => Ok(0.0),
        }
    }

    /// Flight distance to the next collision; infinite in a void cell.
    pub fn sample_distance_to_collision<S: RandomStream + ?Sized>(
        &self,
        particle: &ParticleState,
        stream: &mut S,
    ) -> Result<f64> {
        match self.material_at(particle)? {
            Some(material) => material.sample_distance_to_collision(particle.energy, stream),
            None => Ok(f64::INFINITY),
        }
    }

    /// Sample and apply one collision.
    ///
    /// Recoverable errors are logged and returned; the caller decides
    /// whether to abort the history.
    pub fn process_collision<S: RandomStream + ?Sized>(
        &self,
        particle: &mut ParticleState,
        stream: &mut S,
    ) -> Result<CollisionOutcome> {
        match self.collide(particle, stream) {
            Err(err) if err.is_recoverable() => {
                warn!(
                    species = %particle.species,
                    energy = particle.energy,
                    error = %err,
                    "collision aborted"
                );
                Err(err)
            }
            other => other,
        }
    }

    fn collide<S: RandomStream + ?Sized>(
        &self,
        particle: &mut ParticleState,
        stream: &mut S,
    ) -> Result<CollisionOutcome> {
        if !particle.alive {
            return Err(CollisionError::Domain(
                "collision requested for a terminated particle".to_string(),
            ));
        }

        let cell = self.geometry.cell_of(particle);
        particle.cell = Some(cell);
        let material = match self.material_at(particle)? {
            Some(material) => material,
            None => {
                trace!(cell, "void cell, particle streams");
                return Ok(CollisionOutcome::Streaming);
            }
        };

        let outcome = match self.settings.collision_mode {
            CollisionMode::Analogue => {
                let reaction = material.sample_reaction(particle.energy, stream)?;
                reaction.react(particle, stream)?;
                finished(particle, reaction.reaction_type(), reaction.is_absorption())
            }
            CollisionMode::ImplicitCapture => self.collide_implicit(material, particle, stream)?,
        };

        debug!(
            species = %particle.species,
            cell,
            energy = particle.energy,
            weight = particle.weight,
            ?outcome,
            "collision processed"
        );
        Ok(outcome)
    }

    fn collide_implicit<S: RandomStream + ?Sized>(
        &self,
        material: &Material,
        particle: &mut ParticleState,
        stream: &mut S,
    ) -> Result<CollisionOutcome> {
        let sigma_t = material.macroscopic_total_cross_section(particle.energy)?;
        let sigma_a = material.macroscopic_absorption_cross_section(particle.energy)?;
        if !(sigma_t > sigma_a) {
            particle.weight = 0.0;
            particle.kill();
            return Ok(CollisionOutcome::Terminated {
                cause: TerminationCause::ImplicitAbsorption,
            });
        }

        let survival = 1.0 - sigma_a / sigma_t;
        let reaction = material.sample_scattering_reaction(particle.energy, stream)?;
        reaction.react(particle, stream)?;
        particle.weight *= survival;

        let outcome = finished(particle, reaction.reaction_type(), false);
        if outcome.is_terminal() {
            return Ok(outcome);
        }
        if self.play_russian_roulette(particle, stream) {
            return Ok(CollisionOutcome::Terminated {
                cause: TerminationCause::RussianRoulette,
            });
        }
        Ok(outcome)
    }

    /// Returns true when the particle is killed. Draws a deviate only when
    /// the weight is below the cutoff.
    fn play_russian_roulette<S: RandomStream + ?Sized>(
        &self,
        particle: &mut ParticleState,
        stream: &mut S,
    ) -> bool {
        let cutoff = self.settings.weight_cutoff;
        if cutoff <= 0.0 || particle.weight >= cutoff {
            return false;
        }
        let survival = self.settings.survival_weight;
        if stream.next() < particle.weight / survival {
            particle.weight = survival;
            false
        } else {
            particle.weight = 0.0;
            particle.kill();
            true
        }
    }
}

fn finished(
    particle: &ParticleState,
    reaction_type: ReactionType,
    absorption: bool,
) -> CollisionOutcome {
    if particle.alive {
        CollisionOutcome::Collided { reaction_type }
    } else if absorption {
        CollisionOutcome::Terminated {
            cause: TerminationCause::Absorption(reaction_type),
        }
    } else {
        CollisionOutcome::Terminated {
            cause: TerminationCause::Stopped(reaction_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_section::CrossSectionTable;
    use crate::distribution::ScatteringDistribution;
    use crate::geometry::InfiniteMedium;
    use crate::interpolation::Interpolation;
    use crate::random_stream::{FakeStream, LcgStream};
    use crate::reaction::Reaction;

    fn reaction(reaction_type: ReactionType, value: f64) -> Reaction {
        let distribution = if reaction_type.is_absorption() {
            ScatteringDistribution::absorption()
        } else {
            ScatteringDistribution::isotropic()
        };
        Reaction::new(
            reaction_type,
            Species::Neutron,
            Interpolation::LinLin,
            Arc::new(CrossSectionTable::constant(1e-5, 20.0, value).unwrap()),
            Arc::new(distribution),
        )
        .unwrap()
    }

    fn scatter_capture_material(scatter: f64, capture: f64) -> Arc<Material> {
        Arc::new(
            Material::new(1, Species::Neutron, 1.0)
                .unwrap()
                .with_reaction(reaction(ReactionType::Elastic, scatter))
                .unwrap()
                .with_reaction(reaction(ReactionType::Capture, capture))
                .unwrap(),
        )
    }

    fn neutron() -> ParticleState {
        ParticleState::new(Species::Neutron, [0.0; 3], [0.0, 0.0, 1.0], 1.0)
    }

    #[test]
    fn test_analogue_absorption_terminates() {
        let mut handler =
            CollisionHandler::new(InfiniteMedium::default(), Settings::default()).unwrap();
        handler
            .register_material(Species::Neutron, 1, scatter_capture_material(3.0, 1.0))
            .unwrap();

        // [0, 0.75) elastic, [0.75, 1) capture
        let mut stream = FakeStream::new(vec![0.9]).unwrap();
        let mut p = neutron();
        let outcome = handler.process_collision(&mut p, &mut stream).unwrap();
        assert_eq!(
            outcome,
            CollisionOutcome::Terminated {
                cause: TerminationCause::Absorption(ReactionType::Capture)
            }
        );
        assert!(!p.alive);
        assert_eq!(p.cell, Some(1));
    }

    #[test]
    fn test_implicit_capture_reduces_weight() {
        let settings = Settings {
            collision_mode: CollisionMode::ImplicitCapture,
            weight_cutoff: 0.0,
            ..Default::default()
        };
        let mut handler = CollisionHandler::new(InfiniteMedium::default(), settings).unwrap();
        handler
            .register_material(Species::Neutron, 1, scatter_capture_material(3.0, 1.0))
            .unwrap();

        let mut stream = LcgStream::new(5);
        let mut p = neutron();
        for i in 1..=5 {
            let outcome = handler.process_collision(&mut p, &mut stream).unwrap();
            assert_eq!(
                outcome,
                CollisionOutcome::Collided {
                    reaction_type: ReactionType::Elastic
                }
            );
            assert!((p.weight - 0.75_f64.powi(i)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_russian_roulette() {
        let settings = Settings {
            collision_mode: CollisionMode::ImplicitCapture,
            weight_cutoff: 0.5,
            survival_weight: 1.0,
            ..Default::default()
        };
        let mut handler = CollisionHandler::new(InfiniteMedium::default(), settings).unwrap();
        handler
            .register_material(Species::Neutron, 1, scatter_capture_material(1.0, 3.0))
            .unwrap();

        // weight 0.25 after collision; roulette deviate 0.1 survives
        let mut stream = FakeStream::new(vec![0.5, 0.5, 0.5, 0.1]).unwrap();
        let mut p = neutron();
        let outcome = handler.process_collision(&mut p, &mut stream).unwrap();
        assert!(!outcome.is_terminal());
        assert_eq!(p.weight, 1.0);

        // roulette deviate 0.9 kills
        let mut stream = FakeStream::new(vec![0.5, 0.5, 0.5, 0.9]).unwrap();
        let mut p = neutron();
        let outcome = handler.process_collision(&mut p, &mut stream).unwrap();
        assert_eq!(
            outcome,
            CollisionOutcome::Terminated {
                cause: TerminationCause::RussianRoulette
            }
        );
        assert!(!p.alive);
        assert_eq!(p.weight, 0.0);
    }

    #[test]
    fn test_unmapped_species() {
        let mut handler =
            CollisionHandler::new(InfiniteMedium::new(7), Settings::default()).unwrap();
        handler
            .register_material(Species::Neutron, 7, scatter_capture_material(1.0, 1.0))
            .unwrap();
        let photon = ParticleState::new(Species::Photon, [0.0; 3], [1.0, 0.0, 0.0], 1.0);
        assert_eq!(
            handler.macroscopic_total_cross_section(&photon),
            Err(CollisionError::UnmappedCell {
                cell: 7,
                species: "photon".to_string()
            })
        );
    }

    #[test]
    fn test_register_rejects_species_mismatch() {
        let mut handler =
            CollisionHandler::new(InfiniteMedium::default(), Settings::default()).unwrap();
        assert!(handler
            .register_material(Species::Photon, 1, scatter_capture_material(1.0, 1.0))
            .is_err());
    }

    #[test]
    fn test_dead_particle_rejected() {
        let mut handler =
            CollisionHandler::new(InfiniteMedium::default(), Settings::default()).unwrap();
        handler
            .register_material(Species::Neutron, 1, scatter_capture_material(1.0, 1.0))
            .unwrap();
        let mut p = neutron();
        p.kill();
        let mut stream = LcgStream::new(1);
        assert!(matches!(
            handler.process_collision(&mut p, &mut stream),
            Err(CollisionError::Domain(_))
        ));
    }
}
