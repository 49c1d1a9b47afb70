use bevy::math::DVec3;

use crate::plane::Plane;

/// Where a volume lies relative to a plane or a culling volume. Planes keep
/// their normal pointing towards the inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersect {
    Outside,
    Intersecting,
    Inside,
}

pub trait BoundingVolume {
    fn intersect_plane(&self, plane: &Plane) -> Intersect;

    fn distance_squared_to(&self, cartesian: DVec3) -> f64;
}
