use bevy::math::DVec3;

use crate::bounding_sphere::BoundingSphere;
use crate::ellipsoid::Ellipsoid;
use crate::rectangle::Rectangle;

/// Horizon culling against an ellipsoid. Occludee points live in the
/// ellipsoid's scaled space, where the ellipsoid becomes the unit sphere.
///
/// See <https://cesium.com/blog/2013/04/25/Horizon-culling/>.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipsoidalOccluder {
    pub ellipsoid: Ellipsoid,
    pub camera_position: DVec3,
    pub camera_position_in_scaled_space: DVec3,
    pub distance_to_limb_in_scaled_space_squared: f64,
}

impl EllipsoidalOccluder {
    pub fn new(ellipsoid: &Ellipsoid) -> Self {
        Self {
            ellipsoid: *ellipsoid,
            camera_position: DVec3::ZERO,
            camera_position_in_scaled_space: DVec3::ZERO,
            distance_to_limb_in_scaled_space_squared: 0.0,
        }
    }

    pub fn set_camera_position(&mut self, camera_position: DVec3) {
        let cv = self.ellipsoid.transform_position_to_scaled_space(camera_position);
        self.camera_position = camera_position;
        self.camera_position_in_scaled_space = cv;
        self.distance_to_limb_in_scaled_space_squared = cv.length_squared() - 1.0;
    }

    pub fn is_point_visible(&self, occludee: DVec3) -> bool {
        let occludee_scaled_space_position = self.ellipsoid.transform_position_to_scaled_space(occludee);
        self.is_scaled_space_point_visible(occludee_scaled_space_position)
    }

    pub fn is_scaled_space_point_visible(&self, occludee_scaled_space_position: DVec3) -> bool {
        is_scaled_space_point_visible(
            occludee_scaled_space_position,
            self.camera_position_in_scaled_space,
            self.distance_to_limb_in_scaled_space_squared,
        )
    }

    /// Like [`EllipsoidalOccluder::is_scaled_space_point_visible`], but the
    /// occludee was computed against an ellipsoid shrunk by a negative
    /// `minimum_height`, so the camera is tested in that shrunk space too.
    pub fn is_scaled_space_point_visible_possibly_under_ellipsoid(
        &self,
        occludee_scaled_space_position: DVec3,
        minimum_height: Option<f64>,
    ) -> bool {
        let ellipsoid = &self.ellipsoid;
        match minimum_height {
            Some(height) if height < 0.0 && ellipsoid.minimum_radius > -height => {
                let cv = self.camera_position / (ellipsoid.radii + DVec3::splat(height));
                is_scaled_space_point_visible(
                    occludee_scaled_space_position,
                    cv,
                    cv.length_squared() - 1.0,
                )
            }
            _ => self.is_scaled_space_point_visible(occludee_scaled_space_position),
        }
    }

    /// A point along `direction_to_point` in scaled space which, when it
    /// is below the horizon, guarantees all of `positions` are too.
    pub fn compute_horizon_culling_point(
        &self,
        direction_to_point: DVec3,
        positions: &[DVec3],
    ) -> Option<DVec3> {
        compute_horizon_culling_point_from_positions(&self.ellipsoid, direction_to_point, positions)
    }

    pub fn compute_horizon_culling_point_possibly_under_ellipsoid(
        &self,
        direction_to_point: DVec3,
        positions: &[DVec3],
        minimum_height: Option<f64>,
    ) -> Option<DVec3> {
        let ellipsoid = possibly_shrunk_ellipsoid(&self.ellipsoid, minimum_height);
        compute_horizon_culling_point_from_positions(&ellipsoid, direction_to_point, positions)
    }

    /// Culling point for a whole rectangle on the ellipsoid surface, or
    /// `None` when the rectangle is so large its center is near the
    /// ellipsoid's center.
    pub fn compute_horizon_culling_point_from_rectangle(&self, rectangle: &Rectangle) -> Option<DVec3> {
        let positions = rectangle.subsample(&self.ellipsoid, 0.0);
        let bounding_sphere = BoundingSphere::from_points(&positions);
        if bounding_sphere.center.length() < 0.1 * self.ellipsoid.minimum_radius {
            return None;
        }
        self.compute_horizon_culling_point(bounding_sphere.center, &positions)
    }

    pub fn compute_horizon_culling_point_from_vertices(
        &self,
        direction_to_point: DVec3,
        vertices: &[DVec3],
        center: DVec3,
    ) -> Option<DVec3> {
        self.compute_horizon_culling_point_from_vertices_possibly_under_ellipsoid(
            direction_to_point,
            vertices,
            center,
            None,
        )
    }

    /// Same as [`EllipsoidalOccluder::compute_horizon_culling_point_possibly_under_ellipsoid`]
    /// for mesh vertices stored relative to `center`.
    pub fn compute_horizon_culling_point_from_vertices_possibly_under_ellipsoid(
        &self,
        direction_to_point: DVec3,
        vertices: &[DVec3],
        center: DVec3,
        minimum_height: Option<f64>,
    ) -> Option<DVec3> {
        let ellipsoid = possibly_shrunk_ellipsoid(&self.ellipsoid, minimum_height);
        let scaled_space_direction_to_point =
            compute_scaled_space_direction_to_point(&ellipsoid, direction_to_point);
        let mut result_magnitude: f64 = 0.0;
        for vertex in vertices {
            let candidate_magnitude =
                compute_magnitude(&ellipsoid, *vertex + center, scaled_space_direction_to_point);
            if candidate_magnitude < 0.0 {
                return None;
            }
            result_magnitude = result_magnitude.max(candidate_magnitude);
        }
        magnitude_to_point(scaled_space_direction_to_point, result_magnitude)
    }
}

fn is_scaled_space_point_visible(
    occludee_scaled_space_position: DVec3,
    camera_position_in_scaled_space: DVec3,
    distance_to_limb_in_scaled_space_squared: f64,
) -> bool {
    let cv = camera_position_in_scaled_space;
    let vh_magnitude_squared = distance_to_limb_in_scaled_space_squared;
    let vt = occludee_scaled_space_position - cv;
    let vt_dot_vc = -vt.dot(cv);
    // Below the surface the culling plane passes through the camera.
    let is_occluded = if vh_magnitude_squared < 0.0 {
        vt_dot_vc > 0.0
    } else {
        vt_dot_vc > vh_magnitude_squared
            && vt_dot_vc * vt_dot_vc / vt.length_squared() > vh_magnitude_squared
    };
    !is_occluded
}

fn possibly_shrunk_ellipsoid(ellipsoid: &Ellipsoid, minimum_height: Option<f64>) -> Ellipsoid {
    match minimum_height {
        Some(height) if height < 0.0 && ellipsoid.minimum_radius > -height => {
            Ellipsoid::from_vec3(ellipsoid.radii + DVec3::splat(height))
        }
        _ => *ellipsoid,
    }
}

fn compute_horizon_culling_point_from_positions(
    ellipsoid: &Ellipsoid,
    direction_to_point: DVec3,
    positions: &[DVec3],
) -> Option<DVec3> {
    let scaled_space_direction_to_point =
        compute_scaled_space_direction_to_point(ellipsoid, direction_to_point);
    let mut result_magnitude: f64 = 0.0;
    for position in positions {
        let candidate_magnitude =
            compute_magnitude(ellipsoid, *position, scaled_space_direction_to_point);
        // Every position must lie on the same side as the direction.
        if candidate_magnitude < 0.0 {
            return None;
        }
        result_magnitude = result_magnitude.max(candidate_magnitude);
    }
    magnitude_to_point(scaled_space_direction_to_point, result_magnitude)
}

fn compute_scaled_space_direction_to_point(ellipsoid: &Ellipsoid, direction_to_point: DVec3) -> DVec3 {
    if direction_to_point == DVec3::ZERO {
        return direction_to_point;
    }
    ellipsoid
        .transform_position_to_scaled_space(direction_to_point)
        .normalize()
}

fn compute_magnitude(
    ellipsoid: &Ellipsoid,
    position: DVec3,
    scaled_space_direction_to_point: DVec3,
) -> f64 {
    let scaled_space_position = ellipsoid.transform_position_to_scaled_space(position);
    let magnitude_squared = scaled_space_position.length_squared();
    let direction = scaled_space_position / magnitude_squared.sqrt();

    // Points under the ellipsoid are treated as lying on it.
    let magnitude_squared = magnitude_squared.max(1.0);
    let magnitude = magnitude_squared.sqrt();

    let cos_alpha = direction.dot(scaled_space_direction_to_point);
    let sin_alpha = direction.cross(scaled_space_direction_to_point).length();
    let cos_beta = 1.0 / magnitude;
    let sin_beta = (magnitude_squared - 1.0).sqrt() * cos_beta;

    1.0 / (cos_alpha * cos_beta - sin_alpha * sin_beta)
}

fn magnitude_to_point(scaled_space_direction_to_point: DVec3, result_magnitude: f64) -> Option<DVec3> {
    if result_magnitude <= 0.0 || !result_magnitude.is_finite() {
        return None;
    }
    Some(scaled_space_direction_to_point * result_magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Cartesian3, EPSILON14};

    #[test]
    fn culling_point_on_the_center_line() {
        let ellipsoid = Ellipsoid::new(12345.0, 12345.0, 12345.0);
        let occluder = EllipsoidalOccluder::new(&ellipsoid);
        let result = occluder
            .compute_horizon_culling_point(DVec3::X, &[DVec3::new(12345.0, 0.0, 0.0)])
            .expect("defined");
        assert!(result.equals_epsilon(DVec3::X, Some(EPSILON14), None));
    }

    #[test]
    fn culling_point_undefined_for_opposite_positions() {
        let ellipsoid = Ellipsoid::new(12345.0, 12345.0, 12345.0);
        let occluder = EllipsoidalOccluder::new(&ellipsoid);
        assert!(occluder
            .compute_horizon_culling_point(DVec3::X, &[DVec3::new(-12345.0, 0.0, 0.0)])
            .is_none());
        assert!(occluder.compute_horizon_culling_point(DVec3::X, &[]).is_none());
    }

    #[test]
    fn scaled_space_visibility() {
        let mut occluder = EllipsoidalOccluder::new(&Ellipsoid::unit_sphere());
        occluder.set_camera_position(DVec3::new(0.0, 0.0, 3.0));
        assert_eq!(occluder.distance_to_limb_in_scaled_space_squared, 8.0);
        assert!(occluder.is_point_visible(DVec3::new(0.0, 0.0, 2.0)));
        assert!(!occluder.is_point_visible(DVec3::new(0.0, 0.0, -2.0)));
        assert!(occluder.is_point_visible(DVec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn camera_below_surface_culls_everything_behind_it() {
        let mut occluder = EllipsoidalOccluder::new(&Ellipsoid::unit_sphere());
        occluder.set_camera_position(DVec3::new(0.0, 0.0, 0.5));
        assert!(occluder.is_point_visible(DVec3::new(0.0, 0.0, 2.0)));
        assert!(!occluder.is_point_visible(DVec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn shrunk_ellipsoid_reveals_points_near_the_limb() {
        let mut occluder = EllipsoidalOccluder::new(&Ellipsoid::new(10.0, 10.0, 10.0));
        occluder.set_camera_position(DVec3::new(0.0, 0.0, 10.5));
        let occludee = DVec3::new(1.0, 0.0, 0.3);
        assert!(!occluder.is_scaled_space_point_visible_possibly_under_ellipsoid(occludee, None));
        assert!(!occluder.is_scaled_space_point_visible_possibly_under_ellipsoid(occludee, Some(5.0)));
        assert!(occluder.is_scaled_space_point_visible_possibly_under_ellipsoid(occludee, Some(-5.0)));
    }

    #[test]
    fn rectangle_culling_point_hides_behind_the_globe() {
        let ellipsoid = Ellipsoid::wgs84();
        let mut occluder = EllipsoidalOccluder::new(&ellipsoid);
        let rectangle = Rectangle::from_degrees(-10.0, -10.0, 10.0, 10.0);
        let point = occluder
            .compute_horizon_culling_point_from_rectangle(&rectangle)
            .expect("defined");

        occluder.set_camera_position(DVec3::new(3.0 * ellipsoid.radii.x, 0.0, 0.0));
        assert!(occluder.is_scaled_space_point_visible(point));
        occluder.set_camera_position(DVec3::new(-3.0 * ellipsoid.radii.x, 0.0, 0.0));
        assert!(!occluder.is_scaled_space_point_visible(point));

        assert!(occluder
            .compute_horizon_culling_point_from_rectangle(&Rectangle::MAX_VALUE)
            .is_none());
    }

    #[test]
    fn vertices_relative_to_center_match_absolute_positions() {
        let ellipsoid = Ellipsoid::wgs84();
        let occluder = EllipsoidalOccluder::new(&ellipsoid);
        let center = DVec3::new(ellipsoid.radii.x, 0.0, 0.0);
        let positions = [
            center + DVec3::new(0.0, 1000.0, 0.0),
            center + DVec3::new(0.0, -1000.0, 500.0),
            center + DVec3::new(10.0, 0.0, -500.0),
        ];
        let relative: Vec<DVec3> = positions.iter().map(|p| *p - center).collect();
        let absolute = occluder
            .compute_horizon_culling_point_possibly_under_ellipsoid(center, &positions, Some(-100.0))
            .expect("defined");
        let from_vertices = occluder
            .compute_horizon_culling_point_from_vertices_possibly_under_ellipsoid(
                center,
                &relative,
                center,
                Some(-100.0),
            )
            .expect("defined");
        assert!(absolute.equals_epsilon(from_vertices, Some(EPSILON14), None));
    }
}
