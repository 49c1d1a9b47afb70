use std::f64::consts::FRAC_PI_3;

use bevy::math::DVec3;

use crate::culling_volume::CullingVolume;

/// A symmetric perspective view frustum. `fov` is the angle of the wider
/// of the two dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveFrustum {
    pub fov: f64,
    pub aspect_ratio: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for PerspectiveFrustum {
    fn default() -> Self {
        Self {
            fov: FRAC_PI_3,
            aspect_ratio: 1.0,
            near: 1.0,
            far: 500_000_000.0,
        }
    }
}

impl PerspectiveFrustum {
    pub fn fovy(&self) -> f64 {
        if self.aspect_ratio <= 1.0 {
            self.fov
        } else {
            ((self.fov * 0.5).tan() / self.aspect_ratio).atan() * 2.0
        }
    }

    /// Converts a geometric error at a distance into pixels once multiplied
    /// by the drawing buffer height.
    pub fn sse_denominator(&self) -> f64 {
        2.0 * (0.5 * self.fovy()).tan()
    }

    /// Left, right, bottom, top, near and far planes with inward normals.
    /// `direction` and `up` must be orthonormal.
    pub fn compute_culling_volume(
        &self,
        position: DVec3,
        direction: DVec3,
        up: DVec3,
    ) -> CullingVolume {
        let t = self.near * (0.5 * self.fovy()).tan();
        let b = -t;
        let r = self.aspect_ratio * t;
        let l = -r;

        let right = direction.cross(up).normalize();
        let near_center = position + direction * self.near;
        let far_center = position + direction * self.far;

        let plane_through_eye = |normal: DVec3| normal.extend(-normal.dot(position));

        let left_normal = (near_center + right * l - position)
            .normalize()
            .cross(up)
            .normalize();
        let right_normal = up
            .cross((near_center + right * r - position).normalize())
            .normalize();
        let bottom_normal = right
            .cross((near_center + up * b - position).normalize())
            .normalize();
        let top_normal = (near_center + up * t - position)
            .normalize()
            .cross(right)
            .normalize();

        CullingVolume::new(vec![
            plane_through_eye(left_normal),
            plane_through_eye(right_normal),
            plane_through_eye(bottom_normal),
            plane_through_eye(top_normal),
            direction.extend(-direction.dot(near_center)),
            (-direction).extend(direction.dot(far_center)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding_sphere::BoundingSphere;
    use crate::bounding_volume::Intersect;

    #[test]
    fn sse_denominator_for_sixty_degrees() {
        let frustum = PerspectiveFrustum::default();
        let expected = 2.0 * (FRAC_PI_3 * 0.5).tan();
        assert!((frustum.sse_denominator() - expected).abs() < 1e-15);
    }

    #[test]
    fn culls_spheres_around_the_view() {
        let frustum = PerspectiveFrustum {
            far: 100.0,
            ..Default::default()
        };
        let volume = frustum.compute_culling_volume(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);
        let visible = |center: DVec3, radius: f64| {
            volume.compute_visibility(&BoundingSphere::new(center, radius))
        };
        assert_eq!(visible(DVec3::new(0.0, 0.0, -10.0), 1.0), Intersect::Inside);
        assert_eq!(visible(DVec3::new(0.0, 0.0, 10.0), 1.0), Intersect::Outside);
        assert_eq!(visible(DVec3::new(50.0, 0.0, -10.0), 1.0), Intersect::Outside);
        assert_eq!(visible(DVec3::new(0.0, -50.0, -10.0), 1.0), Intersect::Outside);
        assert_eq!(visible(DVec3::new(0.0, 0.0, -200.0), 1.0), Intersect::Outside);
        assert_eq!(
            visible(DVec3::new(0.0, 0.0, -100.0), 1.0),
            Intersect::Intersecting
        );
    }
}
