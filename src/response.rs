//! Response functions: the scalar a tally multiplies into each score.

use std::sync::Arc;

use crate::error::{CollisionError, Result};
use crate::interpolation::Interpolation;
use crate::material::Material;
use crate::particle::ParticleState;
use crate::reaction::ReactionType;

pub trait ResponseFunction: Send + Sync {
    fn evaluate(&self, particle: &ParticleState) -> Result<f64>;

    /// True when the value does not depend on the particle position.
    fn is_spatially_uniform(&self) -> bool;

    fn description(&self) -> String;
}

/// Constant response of 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformResponse;

impl ResponseFunction for UniformResponse {
    fn evaluate(&self, _particle: &ParticleState) -> Result<f64> {
        Ok(1.0)
    }

    fn is_spatially_uniform(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "default".to_string()
    }
}

/// Weighting function over particle phase space supplied from outside the
/// collision engine.
pub trait PhaseSpaceWeighting: Send + Sync {
    fn density(&self, particle: &ParticleState) -> Result<f64>;

    fn depends_on_position(&self) -> bool;

    fn name(&self) -> String;
}

/// Tabulated weight as a function of energy only.
#[derive(Debug, Clone)]
pub struct EnergyWeighting {
    energy: Vec<f64>,
    weight: Vec<f64>,
    interpolation: Interpolation,
}

impl EnergyWeighting {
    pub fn new(energy: Vec<f64>, weight: Vec<f64>, interpolation: Interpolation) -> Result<Self> {
        if energy.len() < 2 || energy.len() != weight.len() {
            return Err(CollisionError::invalid_table(format!(
                "energy weighting has {} energies and {} weights",
                energy.len(),
                weight.len()
            )));
        }
        if energy.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(CollisionError::invalid_table(
                "energy weighting grid not strictly increasing",
            ));
        }
        Ok(Self {
            energy,
            weight,
            interpolation,
        })
    }
}

impl PhaseSpaceWeighting for EnergyWeighting {
    fn density(&self, particle: &ParticleState) -> Result<f64> {
        self.interpolation
            .evaluate_table(&self.energy, &self.weight, particle.energy)
    }

    fn depends_on_position(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        format!("{} energy weighting", self.interpolation.name())
    }
}

/// Response equal to a phase-space weighting evaluated at the particle.
#[derive(Debug, Clone)]
pub struct WeightedResponse<W: PhaseSpaceWeighting> {
    weighting: W,
}

impl<W: PhaseSpaceWeighting> WeightedResponse<W> {
    pub fn new(weighting: W) -> Self {
        Self { weighting }
    }

    pub fn weighting(&self) -> &W {
        &self.weighting
    }
}

impl<W: PhaseSpaceWeighting> ResponseFunction for WeightedResponse<W> {
    fn evaluate(&self, particle: &ParticleState) -> Result<f64> {
        self.weighting.density(particle)
    }

    fn is_spatially_uniform(&self) -> bool {
        !self.weighting.depends_on_position()
    }

    fn description(&self) -> String {
        self.weighting.name()
    }
}

/// Macroscopic cross section of one reaction in one material at the
/// particle energy.
#[derive(Debug, Clone)]
pub struct MaterialReactionResponse {
    material: Arc<Material>,
    reaction_type: ReactionType,
}

impl MaterialReactionResponse {
    pub fn new(material: Arc<Material>, reaction_type: ReactionType) -> Result<Self> {
        if !material.has_reaction(reaction_type) {
            return Err(CollisionError::invalid_table(format!(
                "{} has no reaction {}",
                material.label(),
                reaction_type
            )));
        }
        Ok(Self {
            material,
            reaction_type,
        })
    }
}

impl ResponseFunction for MaterialReactionResponse {
    fn evaluate(&self, particle: &ParticleState) -> Result<f64> {
        self.material
            .macroscopic_cross_section(self.reaction_type, particle.energy)
    }

    fn is_spatially_uniform(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        format!("{} {} macroscopic cross section", self.material.label(), self.reaction_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_section::CrossSectionTable;
    use crate::distribution::ScatteringDistribution;
    use crate::particle::Species;
    use crate::reaction::Reaction;

    fn photon(energy: f64, position: [f64; 3]) -> ParticleState {
        ParticleState::new(Species::Photon, position, [0.0, 0.0, 1.0], energy)
    }

    struct SlabWeighting;

    impl PhaseSpaceWeighting for SlabWeighting {
        fn density(&self, particle: &ParticleState) -> Result<f64> {
            Ok(if particle.position[0] < 0.0 { 0.0 } else { 2.0 })
        }

        fn depends_on_position(&self) -> bool {
            true
        }

        fn name(&self) -> String {
            "slab".to_string()
        }
    }

    #[test]
    fn test_uniform_response() {
        let response = UniformResponse;
        assert_eq!(response.evaluate(&photon(1.0, [3.0, 2.0, 1.0])).unwrap(), 1.0);
        assert!(response.is_spatially_uniform());
    }

    #[test]
    fn test_weighted_response() {
        let energy = WeightedResponse::new(
            EnergyWeighting::new(vec![0.1, 1.0, 10.0], vec![1.0, 2.0, 4.0], Interpolation::LinLin)
                .unwrap(),
        );
        assert!(energy.is_spatially_uniform());
        assert_eq!(energy.evaluate(&photon(1.0, [0.0; 3])).unwrap(), 2.0);
        assert!(energy.evaluate(&photon(20.0, [0.0; 3])).is_err());

        let slab = WeightedResponse::new(SlabWeighting);
        assert!(!slab.is_spatially_uniform());
        assert_eq!(slab.evaluate(&photon(1.0, [-1.0, 0.0, 0.0])).unwrap(), 0.0);
        assert_eq!(slab.evaluate(&photon(1.0, [1.0, 0.0, 0.0])).unwrap(), 2.0);
        assert_eq!(slab.description(), "slab");
    }

    #[test]
    fn test_material_reaction_response() {
        let reaction = Reaction::new(
            ReactionType::Incoherent,
            Species::Photon,
            Interpolation::LogLog,
            Arc::new(CrossSectionTable::new(vec![0.01, 10.0], vec![2.0, 0.5]).unwrap()),
            Arc::new(ScatteringDistribution::isotropic()),
        )
        .unwrap();
        let material = Arc::new(
            Material::new(5, Species::Photon, 0.1)
                .unwrap()
                .with_name("lead")
                .with_reaction(reaction)
                .unwrap(),
        );

        let response =
            MaterialReactionResponse::new(material.clone(), ReactionType::Incoherent).unwrap();
        assert!(response.is_spatially_uniform());
        assert!((response.evaluate(&photon(10.0, [0.0; 3])).unwrap() - 0.05).abs() < 1e-15);
        let description = response.description();
        assert!(description.contains("lead"));
        assert!(description.contains("Incoherent"));

        assert!(MaterialReactionResponse::new(material, ReactionType::Coherent).is_err());
    }
}
