use bevy::math::{DMat3, DVec2, DVec3};

use crate::ellipsoid::Ellipsoid;
use crate::math::{equals_epsilon, EPSILON14};
use crate::plane::Plane;

/// Columns are the east, north and up directions of the local frame at
/// `origin`. The poles get a fixed frame because east is undefined there.
pub fn east_north_up_axes(origin: DVec3, ellipsoid: &Ellipsoid) -> DMat3 {
    if equals_epsilon(origin.x, 0.0, Some(EPSILON14), None)
        && equals_epsilon(origin.y, 0.0, Some(EPSILON14), None)
    {
        let sign = if origin.z < 0.0 { -1.0 } else { 1.0 };
        return DMat3::from_cols(
            DVec3::Y,
            DVec3::new(-sign, 0.0, 0.0),
            DVec3::new(0.0, 0.0, sign),
        );
    }

    let up = ellipsoid
        .geodetic_surface_normal(origin)
        .unwrap_or_else(|| origin.normalize());
    let east = DVec3::new(-origin.y, origin.x, 0.0).normalize();
    let north = up.cross(east);
    DMat3::from_cols(east, north, up)
}

/// The plane tangent to the ellipsoid at a surface point, with a 2D
/// east/north coordinate system on it.
#[derive(Clone, Debug, PartialEq)]
pub struct EllipsoidTangentPlane {
    pub plane: Plane,
    pub origin: DVec3,
    pub x_axis: DVec3,
    pub y_axis: DVec3,
    pub z_axis: DVec3,
    pub ellipsoid: Ellipsoid,
}

impl EllipsoidTangentPlane {
    /// `None` when `origin` is the ellipsoid center.
    pub fn new(origin: DVec3, ellipsoid: &Ellipsoid) -> Option<Self> {
        let origin = ellipsoid.scale_to_geodetic_surface(origin)?;
        let axes = east_north_up_axes(origin, ellipsoid);
        Some(Self {
            plane: Plane::from_point_normal(origin, axes.z_axis),
            origin,
            x_axis: axes.x_axis,
            y_axis: axes.y_axis,
            z_axis: axes.z_axis,
            ellipsoid: *ellipsoid,
        })
    }

    pub fn project_point_to_nearest_on_plane(&self, cartesian: DVec3) -> DVec2 {
        let v = self.plane.project_point_onto_plane(cartesian) - self.origin;
        DVec2::new(v.dot(self.x_axis), v.dot(self.y_axis))
    }

    pub fn project_point_onto_ellipsoid(&self, point: DVec2) -> DVec3 {
        let on_plane = self.origin + self.x_axis * point.x + self.y_axis * point.y;
        self.ellipsoid.scale_to_geocentric_surface(on_plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Cartesian3;

    #[test]
    fn frame_on_equator_at_prime_meridian() {
        let ellipsoid = Ellipsoid::wgs84();
        let axes = east_north_up_axes(DVec3::new(ellipsoid.radii.x, 0.0, 0.0), &ellipsoid);
        assert!(axes.x_axis.equals_epsilon(DVec3::Y, None, Some(EPSILON14)));
        assert!(axes.y_axis.equals_epsilon(DVec3::Z, None, Some(EPSILON14)));
        assert!(axes.z_axis.equals_epsilon(DVec3::X, None, Some(EPSILON14)));
    }

    #[test]
    fn frame_at_south_pole() {
        let ellipsoid = Ellipsoid::wgs84();
        let axes = east_north_up_axes(DVec3::new(0.0, 0.0, -ellipsoid.radii.z), &ellipsoid);
        assert_eq!(axes.x_axis, DVec3::Y);
        assert_eq!(axes.y_axis, DVec3::X);
        assert_eq!(axes.z_axis, DVec3::NEG_Z);
    }

    #[test]
    fn projects_into_plane_coordinates() {
        let ellipsoid = Ellipsoid::unit_sphere();
        let plane = EllipsoidTangentPlane::new(DVec3::new(2.0, 0.0, 0.0), &ellipsoid)
            .expect("not at center");
        assert!(plane.origin.equals_epsilon(DVec3::X, None, Some(EPSILON14)));
        let projected = plane.project_point_to_nearest_on_plane(DVec3::new(3.0, 0.5, -0.25));
        assert!((projected - DVec2::new(0.5, -0.25)).length() < EPSILON14);
        assert!(EllipsoidTangentPlane::new(DVec3::ZERO, &ellipsoid).is_none());
    }
}
