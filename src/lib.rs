//! Collision and scattering sampling for Monte Carlo particle transport.
//!
//! Given a particle and the material at its location, the engine selects the
//! reaction that occurs, samples the outgoing energy and direction, and hands
//! the updated state to tally code through [`ResponseFunction`]s.

mod collision;
mod cross_section;
mod distribution;
mod error;
mod factory;
mod geometry;
mod interpolation;
mod material;
mod particle;
mod random_stream;
mod reaction;
mod response;
mod settings;
mod tabular;

pub use collision::{
    CollisionHandler, CollisionMode, CollisionOutcome, SpeciesCollisionHandler, TerminationCause,
};
pub use cross_section::CrossSectionTable;
pub use distribution::{
    cm_to_lab, ScatteringDistribution, ScatteringFrame, ScatteringLaw, ROUNDOFF_TOLERANCE,
};
pub use error::{CollisionError, Result};
pub use factory::{
    ConditionalData, DiscreteData, DistributionFactory, EnergyLossData, KalbachData,
    TabulatedScatteringData,
};
pub use geometry::{CellId, GeometryQuery, InfiniteMedium};
pub use interpolation::Interpolation;
pub use material::Material;
pub use particle::{
    isotropic_direction, rotate_direction, ParticleState, Species, ELECTRON_REST_MASS_MEV,
};
pub use random_stream::{FakeStream, LcgStream, RandomStream, LCG_PERIOD};
pub use reaction::{Reaction, ReactionType, TransportDirection};
pub use response::{
    EnergyWeighting, MaterialReactionResponse, PhaseSpaceWeighting, ResponseFunction,
    UniformResponse, WeightedResponse,
};
pub use settings::Settings;
pub use tabular::{ConditionalTable, DiscreteCdf, IndexedSample, TabularCdf, TwoDSampling};
