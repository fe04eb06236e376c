use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geometry::CellId;
use crate::random_stream::RandomStream;

/// Electron rest mass energy in MeV
pub const ELECTRON_REST_MASS_MEV: f64 = 0.51099895;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Neutron,
    Photon,
    Electron,
    Positron,
    AdjointNeutron,
    AdjointPhoton,
    AdjointElectron,
}

impl Species {
    pub fn is_adjoint(&self) -> bool {
        matches!(
            self,
            Species::AdjointNeutron | Species::AdjointPhoton | Species::AdjointElectron
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Species::Neutron => "neutron",
            Species::Photon => "photon",
            Species::Electron => "electron",
            Species::Positron => "positron",
            Species::AdjointNeutron => "adjoint neutron",
            Species::AdjointPhoton => "adjoint photon",
            Species::AdjointElectron => "adjoint electron",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    pub species: Species,
    /// Kinetic energy in MeV
    pub energy: f64,
    pub direction: [f64; 3],
    pub position: [f64; 3],
    pub cell: Option<CellId>,
    pub weight: f64,
    pub alive: bool,
    pub collision_number: u32,
}

impl ParticleState {
    pub fn new(species: Species, position: [f64; 3], direction: [f64; 3], energy: f64) -> Self {
        Self {
            species,
            energy,
            direction,
            position,
            cell: None,
            weight: 1.0,
            alive: true,
            collision_number: 0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// Change the flight direction by a polar cosine `mu` about the current
    /// direction, with the azimuth sampled uniformly from `stream`.
    pub fn scatter_direction<S: RandomStream + ?Sized>(&mut self, mu: f64, stream: &mut S) {
        let phi = 2.0 * std::f64::consts::PI * stream.next();
        self.direction = rotate_direction(&self.direction, mu, phi);
    }

    /// Move the particle `distance` along its direction.
    pub fn advance(&mut self, distance: f64) {
        for (x, u) in self.position.iter_mut().zip(self.direction.iter()) {
            *x += distance * u;
        }
    }
}

/// Rotate a unit direction so the new direction makes cosine `mu` with the
/// old one, at azimuth `phi` about it.
pub fn rotate_direction(direction: &[f64; 3], mu: f64, phi: f64) -> [f64; 3] {
    let u_old = Vector3::from_row_slice(direction);
    let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();

    let perp = if u_old.x.abs() < 0.99 {
        Vector3::new(1.0, 0.0, 0.0).cross(&u_old).normalize()
    } else {
        Vector3::new(0.0, 1.0, 0.0).cross(&u_old).normalize()
    };
    let ortho = u_old.cross(&perp);

    let u_new = (mu * u_old + sin_theta * phi.cos() * perp + sin_theta * phi.sin() * ortho)
        .normalize();
    [u_new.x, u_new.y, u_new.z]
}

/// Isotropic direction from two deviates.
pub fn isotropic_direction<S: RandomStream + ?Sized>(stream: &mut S) -> [f64; 3] {
    let mu = 2.0 * stream.next() - 1.0;
    let phi = 2.0 * std::f64::consts::PI * stream.next();
    let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
    [sin_theta * phi.cos(), sin_theta * phi.sin(), mu]
}
