//! Error types for collision sampling.
//!
//! Two classes of failure exist. Numeric-domain problems (`Domain`,
//! `EnergyOutOfRange`) belong to a single particle history and the caller may
//! decide to clamp or to abort that history. Everything else means the run was
//! configured with bad data and is fatal.

use thiserror::Error;

use crate::geometry::CellId;
use crate::reaction::ReactionType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    /// Invalid numeric input, e.g. a non-positive value on a log-scaled axis.
    #[error("Domain error: {0}")]
    Domain(String),

    /// Lookup outside a tabulated energy grid.
    #[error("Energy {energy} MeV outside tabulated range [{min}, {max}]")]
    EnergyOutOfRange { energy: f64, min: f64, max: f64 },

    /// The distribution factory has no sampling strategy for this reaction.
    #[error("No sampling strategy registered for reaction type {0:?}")]
    UnsupportedReactionType(ReactionType),

    /// A non-void cell has no material registered for the particle species.
    #[error("Cell {cell} has no material registered for {species}")]
    UnmappedCell { cell: CellId, species: String },

    /// A sampled value fell outside its physically valid range.
    #[error("Physics invariant violated: {0}")]
    PhysicsInvariant(String),

    /// Malformed tabulated input handed over by the data layer.
    #[error("Invalid tabulated data: {reason}")]
    InvalidTable { reason: String },
}

impl CollisionError {
    /// Recoverable errors abort the current history by default, but the
    /// caller may choose a fallback instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CollisionError::Domain(_) | CollisionError::EnergyOutOfRange { .. }
        )
    }

    /// Fatal errors indicate a configuration or data defect and end the run.
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    pub(crate) fn invalid_table(reason: impl Into<String>) -> Self {
        CollisionError::InvalidTable {
            reason: reason.into(),
        }
    }
}

/// Result type alias for collision operations.
pub type Result<T> = std::result::Result<T, CollisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(CollisionError::Domain("x".into()).is_recoverable());
        assert!(CollisionError::EnergyOutOfRange {
            energy: 30.0,
            min: 1e-5,
            max: 20.0
        }
        .is_recoverable());

        assert!(CollisionError::UnmappedCell {
            cell: 3,
            species: "neutron".into()
        }
        .is_fatal());
        assert!(CollisionError::PhysicsInvariant("mu = 1.5".into()).is_fatal());
        assert!(CollisionError::UnsupportedReactionType(ReactionType::Fission).is_fatal());
        assert!(CollisionError::invalid_table("empty grid").is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = CollisionError::EnergyOutOfRange {
            energy: 25.0,
            min: 1e-5,
            max: 20.0,
        };
        assert!(err.to_string().contains("25"));
        let err = CollisionError::UnmappedCell {
            cell: 7,
            species: "photon".into(),
        };
        assert_eq!(err.to_string(), "Cell 7 has no material registered for photon");
    }
}
