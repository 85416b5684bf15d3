//! Gravity and energy for the point-mass system
//!
//! NOTE: These are reference implementations for verification and testing.
//! The live simulation runs the same formulas in compute shaders.

use crate::point_mass::PointMassState;
use glam::Vec3;

/// Kinetic, potential and total energy of a system
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyReport {
    pub kinetic: f32,
    pub potential: f32,
    pub total: f32,
}

impl EnergyReport {
    pub fn new(kinetic: f32, potential: f32) -> Self {
        Self {
            kinetic,
            potential,
            total: kinetic + potential,
        }
    }

    /// Sum per-body `(kinetic, potential)` pairs
    pub fn from_pairs(pairs: &[[f32; 2]]) -> Self {
        let (kinetic, potential) = pairs
            .iter()
            .fold((0.0, 0.0), |(k, p), pair| (k + pair[0], p + pair[1]));
        Self::new(kinetic, potential)
    }

    /// Relative deviation of `self.total` from `reference.total`
    pub fn relative_drift(&self, reference: &EnergyReport) -> f32 {
        ((self.total - reference.total) / reference.total).abs()
    }
}

/// Acceleration of body `index` due to every other body
/// a = G Σ m_j d / (|d|² + ε²)^(3/2)
pub fn gravitational_acceleration(
    bodies: &[PointMassState],
    index: usize,
    gravity: f32,
    softening: f32,
) -> Vec3 {
    let position = bodies[index].position();
    let softening_sq = softening * softening;

    let acceleration = bodies
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != index)
        .fold(Vec3::ZERO, |acc, (_, other)| {
            let d = other.position() - position;
            let inv_r = (d.length_squared() + softening_sq).sqrt().recip();
            acc + d * (other.mass * inv_r * inv_r * inv_r)
        });

    acceleration * gravity
}

/// Kinetic and potential energy attributed to body `index`.
///
/// Each pair potential is split evenly between its two bodies so that summing over
/// all bodies counts every pair once.
pub fn body_energy(
    bodies: &[PointMassState],
    index: usize,
    gravity: f32,
    softening: f32,
) -> [f32; 2] {
    let body = &bodies[index];
    let softening_sq = softening * softening;

    let kinetic = 0.5 * body.mass * body.velocity().length_squared();

    let potential_sum: f32 = bodies
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != index)
        .map(|(_, other)| {
            let d = other.position() - body.position();
            other.mass / (d.length_squared() + softening_sq).sqrt()
        })
        .sum();

    [kinetic, -0.5 * gravity * body.mass * potential_sum]
}

/// Total energy of a system
pub fn total_energy(bodies: &[PointMassState], gravity: f32, softening: f32) -> EnergyReport {
    let pairs: Vec<[f32; 2]> = (0..bodies.len())
        .map(|i| body_energy(bodies, i, gravity, softening))
        .collect();
    EnergyReport::from_pairs(&pairs)
}
