//! Simulation state and procedural galaxy generation

use crate::constants::*;
use crate::point_mass::{Motion, PointMass, PointMassState};
use glam::Vec3;
use rand::Rng;

/// How a galaxy property scales with the normalized radius `r ∈ [0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusRelation {
    RadiusSquareRoot,
    Radius,
    RadiusSquared,
    Constant,
}

/// Parameters for [`SimulationState::galaxy`]
#[derive(Debug, Clone, Copy)]
pub struct GalaxyParams {
    /// Mass of every body
    pub mass: f32,
    /// Orbital speed scale
    pub initial_velocity: f32,
    /// Outer radius of the disc
    pub galaxy_radius: f32,
    /// Radial density profile
    pub mass_distribution: RadiusRelation,
    /// Rotation curve
    pub velocity_relation: RadiusRelation,
}

impl Default for GalaxyParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            initial_velocity: 1.0,
            galaxy_radius: 100.0,
            mass_distribution: RadiusRelation::RadiusSquareRoot,
            velocity_relation: RadiusRelation::RadiusSquareRoot,
        }
    }
}

/// Ordered sequence of body states, the unit handed to and read back from an engine.
///
/// Body count is fixed for the lifetime of one value; engines reallocate when handed
/// a state of a different length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationState {
    masses: Vec<PointMassState>,
}

impl SimulationState {
    pub fn new(masses: Vec<PointMassState>) -> Self {
        Self { masses }
    }

    /// Rebuild a state from the two device record arrays
    pub fn from_parts(point_masses: &[PointMass], motions: &[Motion]) -> Self {
        debug_assert_eq!(point_masses.len(), motions.len());
        Self {
            masses: point_masses
                .iter()
                .zip(motions)
                .map(|(p, m)| PointMassState::from_parts(p, m))
                .collect(),
        }
    }

    /// Reinterpret packed 40-byte records.
    ///
    /// Returns `None` if the length is not a whole number of records.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % SIZE_OF_POINT_MASS_STATE != 0 {
            return None;
        }
        // File and mapped buffers give no alignment guarantee
        Some(Self {
            masses: bytes
                .chunks_exact(SIZE_OF_POINT_MASS_STATE)
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        })
    }

    pub fn num_masses(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    pub fn masses(&self) -> &[PointMassState] {
        &self.masses
    }

    /// Packed bytes, `num_masses() * 40` long
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.masses)
    }

    /// Split into the `masses` and `motions` device arrays
    pub fn split(&self) -> (Vec<PointMass>, Vec<Motion>) {
        self.masses.iter().map(PointMassState::split).unzip()
    }

    /// A flattened rotating disc: bodies scattered in a sphere of radius
    /// [`DISC_RADIUS`], squashed to `±DISC_HALF_THICKNESS`, moving on circular
    /// tangents with speed `sqrt(r) * DISC_ORBIT_FACTOR`.
    pub fn disc(num_masses: usize, rng: &mut impl Rng) -> Self {
        let masses = (0..num_masses)
            .map(|_| {
                let mut pos = inside_unit_sphere(rng) * DISC_RADIUS;
                pos.y = rng.random_range(-DISC_HALF_THICKNESS..DISC_HALF_THICKNESS);

                let vel = pos.cross(Vec3::Y).normalize_or_zero()
                    * pos.length().sqrt()
                    * DISC_ORBIT_FACTOR;

                PointMassState::moving(DISC_BODY_MASS, pos, vel)
            })
            .collect();

        Self { masses }
    }

    /// A configurable disc galaxy with a radial density profile and rotation curve
    pub fn galaxy(num_masses: usize, params: &GalaxyParams, rng: &mut impl Rng) -> Self {
        let height_variation = params.galaxy_radius * 0.05;

        let masses = (0..num_masses)
            .map(|_| {
                let mut radius: f32 = rng.random();
                match params.mass_distribution {
                    RadiusRelation::RadiusSquareRoot => radius = radius.sqrt(),
                    // Approximates a uniform volume density
                    RadiusRelation::Radius => radius = radius.powf(0.3333),
                    RadiusRelation::RadiusSquared | RadiusRelation::Constant => {}
                }
                let square_radius = radius * radius;

                let speed = match params.velocity_relation {
                    RadiusRelation::RadiusSquareRoot => radius.sqrt(),
                    RadiusRelation::Radius => radius,
                    RadiusRelation::RadiusSquared => radius * radius * radius,
                    RadiusRelation::Constant => 1.0,
                } * params.initial_velocity;

                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                let mut pos =
                    Vec3::new(angle.cos(), 0.0, angle.sin()) * radius * params.galaxy_radius;

                let smoothed_height = smooth_step(height_variation, 0.0, square_radius * 5.0)
                    + height_variation * 0.2;
                pos.y = standard_normal(rng) * smoothed_height;

                let vel = pos.cross(Vec3::Y).normalize_or_zero() * speed;

                PointMassState::moving(params.mass, pos, vel)
            })
            .collect();

        Self { masses }
    }
}

fn inside_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let p = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        if p.length_squared() <= 1.0 {
            return p;
        }
    }
}

/// Hermite interpolation from `from` to `to`, `t` clamped to `[0, 1]`
fn smooth_step(from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let t = -2.0 * t * t * t + 3.0 * t * t;
    to * t + from * (1.0 - t)
}

/// Box–Muller transform
fn standard_normal(rng: &mut impl Rng) -> f32 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = 1.0 - rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).sin()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn bytes_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let state = SimulationState::disc(64, &mut rng);

        let bytes = state.as_bytes().to_vec();
        assert_eq!(bytes.len(), 64 * SIZE_OF_POINT_MASS_STATE);
        assert_eq!(SimulationState::from_bytes(&bytes), Some(state));
    }

    #[test]
    fn from_bytes_rejects_partial_records() {
        assert!(SimulationState::from_bytes(&[0u8; 41]).is_none());
    }

    #[test]
    fn split_and_rebuild() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = SimulationState::disc(16, &mut rng);
        let (point_masses, motions) = state.split();
        assert_eq!(SimulationState::from_parts(&point_masses, &motions), state);
    }

    #[test]
    fn disc_is_flat_and_rotating() {
        let mut rng = StdRng::seed_from_u64(42);
        let state = SimulationState::disc(500, &mut rng);

        for body in state.masses() {
            assert!(body.position[1].abs() <= DISC_HALF_THICKNESS);
            assert!(body.position().length() <= DISC_RADIUS * 1.1);
            // Tangential: no velocity along the radius within the disc plane
            let radial = Vec3::new(body.position[0], 0.0, body.position[2]);
            assert!(radial.dot(body.velocity()).abs() < 1e-2 * radial.length().max(1.0));
            assert_eq!(body.velocity[1], 0.0);
            assert_eq!(body.acceleration, [0.0; 3]);
        }
    }

    #[test]
    fn galaxy_respects_radius_and_constant_speed() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = GalaxyParams {
            mass: 2.5,
            initial_velocity: 7.0,
            galaxy_radius: 50.0,
            mass_distribution: RadiusRelation::Radius,
            velocity_relation: RadiusRelation::Constant,
        };
        let state = SimulationState::galaxy(300, &params, &mut rng);

        assert_eq!(state.num_masses(), 300);
        for body in state.masses() {
            assert_eq!(body.mass, 2.5);
            let planar = Vec3::new(body.position[0], 0.0, body.position[2]).length();
            assert!(planar <= 50.0 + 1e-3);
            if planar > 1e-3 {
                assert!((body.speed() - 7.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn smooth_step_endpoints() {
        assert_eq!(smooth_step(3.0, 0.0, 0.0), 3.0);
        assert_eq!(smooth_step(3.0, 0.0, 1.0), 0.0);
        assert_eq!(smooth_step(3.0, 0.0, 7.0), 0.0);
    }
}
