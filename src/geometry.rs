// Narrow view of the geometry needed by collision handling.

use crate::particle::ParticleState;

pub type CellId = u32;

/// Cell lookup supplied by the ray-tracing layer.
pub trait GeometryQuery: Send + Sync {
    /// Cell containing the particle's position.
    fn cell_of(&self, particle: &ParticleState) -> CellId;

    fn is_cell_void(&self, cell: CellId) -> bool;
}

/// A single cell filling all space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfiniteMedium {
    pub cell: CellId,
}

impl InfiniteMedium {
    pub fn new(cell: CellId) -> Self {
        Self { cell }
    }
}

impl Default for InfiniteMedium {
    fn default() -> Self {
        Self::new(1)
    }
}

impl GeometryQuery for InfiniteMedium {
    fn cell_of(&self, _particle: &ParticleState) -> CellId {
        self.cell
    }

    fn is_cell_void(&self, _cell: CellId) -> bool {
        false
    }
}
