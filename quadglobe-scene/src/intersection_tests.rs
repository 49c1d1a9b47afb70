use bevy::math::DVec3;

use crate::math::EPSILON15;
use crate::plane::Plane;
use crate::ray::Ray;

/// Point where `ray` crosses `plane`, or `None` when the ray is parallel to
/// the plane or the plane lies behind the origin.
pub fn ray_plane(ray: &Ray, plane: &Plane) -> Option<DVec3> {
    let denominator = plane.normal.dot(ray.direction);
    if denominator.abs() < EPSILON15 {
        return None;
    }
    let t = (-plane.distance - plane.normal.dot(ray.origin)) / denominator;
    if t < 0.0 {
        return None;
    }
    Some(ray.get_point(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_plane_in_front() {
        let ray = Ray::new(DVec3::new(2.0, 0.0, 0.0), DVec3::NEG_X);
        let plane = Plane::new(DVec3::X, 0.0);
        assert_eq!(ray_plane(&ray, &plane), Some(DVec3::ZERO));
    }

    #[test]
    fn ray_misses_plane_behind_or_parallel() {
        let plane = Plane::new(DVec3::X, 0.0);
        let away = Ray::new(DVec3::new(2.0, 0.0, 0.0), DVec3::X);
        assert_eq!(ray_plane(&away, &plane), None);
        let parallel = Ray::new(DVec3::new(2.0, 0.0, 0.0), DVec3::Y);
        assert_eq!(ray_plane(&parallel, &plane), None);
    }
}
