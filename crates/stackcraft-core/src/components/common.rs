//! Common components used across multiple entity types.

use serde::{Deserialize, Serialize};

/// 3D offset vector (y is up)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Straight up by `distance`
    pub fn up(distance: f32) -> Self {
        Self::new(0.0, distance, 0.0)
    }
}

/// Opaque world location a stack can sit on.
///
/// The core never interprets the coordinates; the map layer decides which
/// cells are valid and passes them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridCell {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Presentation-only transform of a unit relative to the unit below it
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    /// Local offset from the unit below (zero for a bottom unit)
    pub offset: Vec3,
    /// Cosmetic rotation around the up axis
    pub yaw_degrees: f32,
}

impl Placement {
    /// Resting directly on the unit below, which is `below_height` tall
    pub fn on_top_of(below_height: f32, yaw_degrees: f32) -> Self {
        Self {
            offset: Vec3::up(below_height),
            yaw_degrees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_up() {
        assert_eq!(Vec3::up(0.25), Vec3::new(0.0, 0.25, 0.0));
        assert_eq!(Vec3::default(), Vec3::ZERO);
    }

    #[test]
    fn test_placement_on_top_of() {
        let p = Placement::on_top_of(0.3, 4.0);
        assert_eq!(p.offset, Vec3::new(0.0, 0.3, 0.0));
        assert_eq!(p.yaw_degrees, 4.0);
        assert_eq!(Placement::default().offset, Vec3::ZERO);
    }
}
