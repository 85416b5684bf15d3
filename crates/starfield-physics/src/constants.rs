//! Physical and layout constants for the point-mass simulation
//!
//! Units are arbitrary simulation units chosen so a galaxy of a few thousand
//! bodies stays on screen at real-time step sizes.

/// Gravitational constant in simulation units
pub const GRAVITY: f32 = 1.0;

/// Softening length, keeps close encounters finite as r→0
pub const SOFTENING: f32 = 0.01;

/// Packed size of [`crate::PointMass`] (mass + position)
pub const SIZE_OF_POINT_MASS: usize = 16;

/// Packed size of [`crate::Motion`] (velocity + acceleration)
pub const SIZE_OF_MOTION: usize = 24;

/// Packed size of [`crate::PointMassState`], one snapshot record
pub const SIZE_OF_POINT_MASS_STATE: usize = SIZE_OF_POINT_MASS + SIZE_OF_MOTION;

// Default disc galaxy
/// Mass given to every body of the default disc
pub const DISC_BODY_MASS: f32 = 4000.0;

/// Radius of the sphere bodies are scattered in before flattening
pub const DISC_RADIUS: f32 = 100.0;

/// Half thickness of the flattened disc
pub const DISC_HALF_THICKNESS: f32 = 5.0;

/// Scale of the initial circular speed, `|v| = sqrt(r) * DISC_ORBIT_FACTOR`
pub const DISC_ORBIT_FACTOR: f32 = 10.155;
