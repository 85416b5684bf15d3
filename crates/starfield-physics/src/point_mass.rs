//! Point-mass records and their packed GPU layouts

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Mass and position of one body, as stored in the `masses` device buffer.
///
/// Layout: 16 bytes (4 × f32), no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointMass {
    pub mass: f32,
    pub position: [f32; 3],
}

/// Velocity and acceleration of one body, as stored in the `motions` device buffer.
///
/// Layout: 24 bytes (6 × f32), no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Motion {
    pub velocity: [f32; 3],
    pub acceleration: [f32; 3],
}

/// Full state of one body: a [`PointMass`] followed by its [`Motion`].
///
/// Layout: 40 bytes. This is the record written to `.simstate` snapshots.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointMassState {
    pub mass: f32,
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub acceleration: [f32; 3],
}

impl PointMassState {
    /// Create a body at rest
    pub fn at_rest(mass: f32, position: Vec3) -> Self {
        Self {
            mass,
            position: position.to_array(),
            ..Default::default()
        }
    }

    /// Create a body with an initial velocity and no acceleration
    pub fn moving(mass: f32, position: Vec3, velocity: Vec3) -> Self {
        Self {
            mass,
            position: position.to_array(),
            velocity: velocity.to_array(),
            acceleration: [0.0; 3],
        }
    }

    /// Combine the two device records of one body
    pub fn from_parts(point_mass: &PointMass, motion: &Motion) -> Self {
        Self {
            mass: point_mass.mass,
            position: point_mass.position,
            velocity: motion.velocity,
            acceleration: motion.acceleration,
        }
    }

    /// Split into the `masses` and `motions` device records
    pub fn split(&self) -> (PointMass, Motion) {
        (
            PointMass {
                mass: self.mass,
                position: self.position,
            },
            Motion {
                velocity: self.velocity,
                acceleration: self.acceleration,
            },
        )
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn velocity(&self) -> Vec3 {
        Vec3::from_array(self.velocity)
    }

    pub fn acceleration(&self) -> Vec3 {
        Vec3::from_array(self.acceleration)
    }

    /// Magnitude of the velocity
    pub fn speed(&self) -> f32 {
        self.velocity().length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn packed_sizes_match_device_layout() {
        assert_eq!(std::mem::size_of::<PointMass>(), SIZE_OF_POINT_MASS);
        assert_eq!(std::mem::size_of::<Motion>(), SIZE_OF_MOTION);
        assert_eq!(std::mem::size_of::<PointMassState>(), SIZE_OF_POINT_MASS_STATE);
    }

    #[test]
    fn state_bytes_are_point_mass_then_motion() {
        let state = PointMassState {
            mass: 2.0,
            position: [1.0, 2.0, 3.0],
            velocity: [4.0, 5.0, 6.0],
            acceleration: [7.0, 8.0, 9.0],
        };
        let (point_mass, motion) = state.split();

        let state_bytes = bytemuck::bytes_of(&state);
        assert_eq!(&state_bytes[..SIZE_OF_POINT_MASS], bytemuck::bytes_of(&point_mass));
        assert_eq!(&state_bytes[SIZE_OF_POINT_MASS..], bytemuck::bytes_of(&motion));
        assert_eq!(PointMassState::from_parts(&point_mass, &motion), state);
    }

    #[test]
    fn speed_is_velocity_magnitude() {
        let state = PointMassState::moving(1.0, Vec3::ZERO, Vec3::new(3.0, 0.0, 4.0));
        assert_eq!(state.speed(), 5.0);
    }
}
