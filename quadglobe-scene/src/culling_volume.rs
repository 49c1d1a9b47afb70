use bevy::math::{DVec3, DVec4};

use crate::bounding_sphere::BoundingSphere;
use crate::bounding_volume::{BoundingVolume, Intersect};
use crate::plane::Plane;

/// Plane mask meaning the volume is outside the culling volume.
pub const MASK_OUTSIDE: u32 = 0xffff_ffff;
/// Plane mask meaning the volume is inside every plane.
pub const MASK_INSIDE: u32 = 0;
/// Plane mask to start a hierarchical test with.
pub const MASK_INDETERMINATE: u32 = 0x7fff_ffff;

/// Planes bounding a region of space, typically a camera frustum. Each
/// plane is stored as `(normal, distance)` with the normal pointing into the
/// volume.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CullingVolume {
    pub planes: Vec<DVec4>,
}

impl CullingVolume {
    pub fn new(planes: Vec<DVec4>) -> Self {
        Self { planes }
    }

    /// Six axis-aligned planes touching `sphere`.
    pub fn from_bounding_sphere(sphere: &BoundingSphere) -> Self {
        let mut planes = Vec::with_capacity(6);
        for face_normal in [DVec3::X, DVec3::Y, DVec3::Z] {
            let near_center = sphere.center - face_normal * sphere.radius;
            planes.push(face_normal.extend(-face_normal.dot(near_center)));

            let far_center = sphere.center + face_normal * sphere.radius;
            planes.push((-face_normal).extend(face_normal.dot(far_center)));
        }
        Self { planes }
    }

    pub fn compute_visibility(&self, bounding_volume: &dyn BoundingVolume) -> Intersect {
        let mut intersecting = false;
        for plane in &self.planes {
            match bounding_volume.intersect_plane(&Plane::from_vec4(*plane)) {
                Intersect::Outside => return Intersect::Outside,
                Intersect::Intersecting => intersecting = true,
                Intersect::Inside => {}
            }
        }
        if intersecting {
            Intersect::Intersecting
        } else {
            Intersect::Inside
        }
    }

    /// Like [`CullingVolume::compute_visibility`], but skips the planes the
    /// parent volume was already known to be inside of. Bit `k` of the
    /// result is set when the volume straddles plane `k`.
    pub fn compute_visibility_with_plane_mask(
        &self,
        bounding_volume: &dyn BoundingVolume,
        parent_plane_mask: u32,
    ) -> u32 {
        if parent_plane_mask == MASK_OUTSIDE || parent_plane_mask == MASK_INSIDE {
            return parent_plane_mask;
        }

        let mut mask = MASK_INSIDE;
        for (k, plane) in self.planes.iter().enumerate() {
            let flag = if k < 31 { 1u32 << k } else { 0 };
            if k < 31 && parent_plane_mask & flag == 0 {
                continue;
            }
            match bounding_volume.intersect_plane(&Plane::from_vec4(*plane)) {
                Intersect::Outside => return MASK_OUTSIDE,
                Intersect::Intersecting => mask |= flag,
                Intersect::Inside => {}
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oriented_bounding_box::OrientedBoundingBox;
    use bevy::math::DMat3;

    fn unit_cube_volume() -> CullingVolume {
        CullingVolume::from_bounding_sphere(&BoundingSphere::new(DVec3::ZERO, 1.0))
    }

    #[test]
    fn sphere_inside_outside_and_straddling() {
        let volume = unit_cube_volume();
        assert_eq!(volume.planes.len(), 6);
        assert_eq!(
            volume.compute_visibility(&BoundingSphere::new(DVec3::ZERO, 0.5)),
            Intersect::Inside
        );
        assert_eq!(
            volume.compute_visibility(&BoundingSphere::new(DVec3::new(1.0, 0.0, 0.0), 0.5)),
            Intersect::Intersecting
        );
        assert_eq!(
            volume.compute_visibility(&BoundingSphere::new(DVec3::new(3.0, 0.0, 0.0), 0.5)),
            Intersect::Outside
        );
    }

    #[test]
    fn outside_one_plane_is_outside_regardless_of_others() {
        // Straddles four planes and sits beyond the last one.
        let volume = unit_cube_volume();
        let sphere = BoundingSphere::new(DVec3::new(0.0, 0.0, -5.0), 3.0);
        assert_eq!(volume.compute_visibility(&sphere), Intersect::Outside);

        let mut reordered = volume.clone();
        reordered.planes.reverse();
        assert_eq!(reordered.compute_visibility(&sphere), Intersect::Outside);
    }

    #[test]
    fn oriented_box_visibility() {
        let volume = unit_cube_volume();
        let obb = OrientedBoundingBox::new(
            DVec3::new(0.0, 0.0, 0.0),
            DMat3::from_diagonal(DVec3::splat(0.25)),
        );
        assert_eq!(volume.compute_visibility(&obb), Intersect::Inside);
        let far = OrientedBoundingBox::new(DVec3::new(0.0, 5.0, 0.0), obb.half_axes);
        assert_eq!(volume.compute_visibility(&far), Intersect::Outside);
    }

    #[test]
    fn empty_volume_contains_everything() {
        let volume = CullingVolume::default();
        assert_eq!(
            volume.compute_visibility(&BoundingSphere::new(DVec3::splat(1.0e9), 1.0)),
            Intersect::Inside
        );
    }

    #[test]
    fn plane_mask_tracks_straddled_planes() {
        let volume = unit_cube_volume();
        let sphere = BoundingSphere::new(DVec3::new(1.0, 0.0, 0.0), 0.5);
        let mask = volume.compute_visibility_with_plane_mask(&sphere, MASK_INDETERMINATE);
        // Only the +x boundary plane (index 1) is straddled.
        assert_eq!(mask, 0b10);

        let inner = BoundingSphere::new(DVec3::new(0.9, 0.0, 0.0), 0.05);
        assert_eq!(
            volume.compute_visibility_with_plane_mask(&inner, mask),
            MASK_INSIDE
        );
        assert_eq!(
            volume.compute_visibility_with_plane_mask(&inner, MASK_OUTSIDE),
            MASK_OUTSIDE
        );
    }
}
