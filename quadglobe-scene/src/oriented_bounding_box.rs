use std::f64::consts::{FRAC_PI_2, PI};

use bevy::math::{DMat3, DVec3};

use crate::bounding_sphere::BoundingSphere;
use crate::bounding_volume::{BoundingVolume, Intersect};
use crate::cartographic::Cartographic;
use crate::ellipsoid::Ellipsoid;
use crate::ellipsoid_tangent_plane::EllipsoidTangentPlane;
use crate::math::{compute_eigen_decomposition, Cartesian3, EPSILON10, EPSILON3};
use crate::plane::Plane;
use crate::rectangle::Rectangle;

/// A box with arbitrary orientation. The columns of `half_axes` point from
/// the center to the middle of three faces.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct OrientedBoundingBox {
    pub center: DVec3,
    pub half_axes: DMat3,
}

impl Default for OrientedBoundingBox {
    fn default() -> Self {
        Self {
            center: DVec3::ZERO,
            half_axes: DMat3::ZERO,
        }
    }
}

impl OrientedBoundingBox {
    pub fn new(center: DVec3, half_axes: DMat3) -> Self {
        Self { center, half_axes }
    }

    /// Principal component fit: the box axes are the eigenvectors of the
    /// covariance matrix of `positions`.
    pub fn from_points(positions: &[DVec3]) -> Self {
        if positions.is_empty() {
            return Self::default();
        }

        let inv_length = 1.0 / positions.len() as f64;
        let mean_point = positions.iter().copied().sum::<DVec3>() * inv_length;

        let mut exx = 0.0;
        let mut exy = 0.0;
        let mut exz = 0.0;
        let mut eyy = 0.0;
        let mut eyz = 0.0;
        let mut ezz = 0.0;
        for &position in positions {
            let p = position - mean_point;
            exx += p.x * p.x;
            exy += p.x * p.y;
            exz += p.x * p.z;
            eyy += p.y * p.y;
            eyz += p.y * p.z;
            ezz += p.z * p.z;
        }

        let covariance = DMat3::from_cols_array(&[exx, exy, exz, exy, eyy, eyz, exz, eyz, ezz])
            * inv_length;
        let rotation = compute_eigen_decomposition(covariance).unitary;

        let v1 = rotation.x_axis;
        let v2 = rotation.y_axis;
        let v3 = rotation.z_axis;

        let mut u = DVec3::splat(f64::MIN);
        let mut l = DVec3::splat(f64::MAX);
        for &p in positions {
            let projected = DVec3::new(v1.dot(p), v2.dot(p), v3.dot(p));
            u = u.max(projected);
            l = l.min(projected);
        }

        let center = v1 * 0.5 * (l.x + u.x) + v2 * 0.5 * (l.y + u.y) + v3 * 0.5 * (l.z + u.z);
        let scale = (u - l) * 0.5;
        Self::new(center, rotation * DMat3::from_diagonal(scale))
    }

    /// Box enclosing the part of the ellipsoid inside `rectangle` between
    /// the two heights.
    pub fn from_rectangle(
        rectangle: &Rectangle,
        minimum_height: f64,
        maximum_height: f64,
        ellipsoid: &Ellipsoid,
    ) -> Self {
        if rectangle.compute_width() <= PI {
            if let Some(obb) =
                Self::from_narrow_rectangle(rectangle, minimum_height, maximum_height, ellipsoid)
            {
                return obb;
            }
        }
        Self::from_wide_rectangle(rectangle, minimum_height, maximum_height, ellipsoid)
    }

    fn from_narrow_rectangle(
        rectangle: &Rectangle,
        minimum_height: f64,
        maximum_height: f64,
        ellipsoid: &Ellipsoid,
    ) -> Option<Self> {
        let tangent_point_cartographic = rectangle.center();
        let tangent_point = ellipsoid.cartographic_to_cartesian(&tangent_point_cartographic);
        let tangent_plane = EllipsoidTangentPlane::new(tangent_point, ellipsoid)?;
        let plane = tangent_plane.plane;

        // Spanning the equator, the west edge sticks out farthest at the equator.
        let lon_center = tangent_point_cartographic.longitude;
        let lat_center = if rectangle.south < 0.0 && rectangle.north > 0.0 {
            0.0
        } else {
            tangent_point_cartographic.latitude
        };

        let to_plane = |longitude: f64, latitude: f64, height: f64| {
            tangent_plane.project_point_to_nearest_on_plane(
                ellipsoid.cartographic_to_cartesian(&Cartographic::new(longitude, latitude, height)),
            )
        };

        let projected_nc = to_plane(lon_center, rectangle.north, maximum_height);
        let projected_nw = to_plane(rectangle.west, rectangle.north, maximum_height);
        let projected_cw = to_plane(rectangle.west, lat_center, maximum_height);
        let projected_sw = to_plane(rectangle.west, rectangle.south, maximum_height);
        let projected_sc = to_plane(lon_center, rectangle.south, maximum_height);

        let min_x = projected_nw.x.min(projected_cw.x).min(projected_sw.x);
        let max_x = -min_x;
        let max_y = projected_nw.y.max(projected_nc.y);
        let min_y = projected_sw.y.min(projected_sc.y);

        // The bottom corners at minimum height reach deepest below the plane.
        let nw_bottom = ellipsoid.cartographic_to_cartesian(&Cartographic::new(
            rectangle.west,
            rectangle.north,
            minimum_height,
        ));
        let sw_bottom = ellipsoid.cartographic_to_cartesian(&Cartographic::new(
            rectangle.west,
            rectangle.south,
            minimum_height,
        ));
        let min_z = plane
            .get_point_distance(nw_bottom)
            .min(plane.get_point_distance(sw_bottom));
        let max_z = maximum_height;

        Some(from_plane_extents(
            tangent_plane.origin,
            tangent_plane.x_axis,
            tangent_plane.y_axis,
            tangent_plane.z_axis,
            DVec3::new(min_x, min_y, min_z),
            DVec3::new(max_x, max_y, max_z),
        ))
    }

    fn from_wide_rectangle(
        rectangle: &Rectangle,
        minimum_height: f64,
        maximum_height: f64,
        ellipsoid: &Ellipsoid,
    ) -> Self {
        let fully_above_equator = rectangle.south > 0.0;
        let fully_below_equator = rectangle.north < 0.0;
        let latitude_nearest_to_equator = if fully_above_equator {
            rectangle.south
        } else if fully_below_equator {
            rectangle.north
        } else {
            0.0
        };
        let center_longitude = rectangle.center().longitude;
        let radii_squared = ellipsoid.radii_squared;

        // The plane sits on the equator below the center longitude and turns
        // around the polar axis.
        let mut plane_origin = DVec3::from_radians(
            center_longitude,
            latitude_nearest_to_equator,
            maximum_height,
            radii_squared,
        );
        plane_origin.z = 0.0;
        let is_pole = plane_origin.x.abs() < EPSILON10 && plane_origin.y.abs() < EPSILON10;
        let plane_normal = if is_pole {
            DVec3::X
        } else {
            plane_origin.normalize()
        };
        let plane_y_axis = DVec3::Z;
        let plane_x_axis = plane_normal.cross(plane_y_axis);
        let plane = Plane::from_point_normal(plane_origin, plane_normal);

        // The horizon a quarter turn away is the farthest extent along x.
        let horizon_cartesian = DVec3::from_radians(
            center_longitude + FRAC_PI_2,
            latitude_nearest_to_equator,
            maximum_height,
            radii_squared,
        );
        let max_x = plane
            .project_point_onto_plane(horizon_cartesian)
            .dot(plane_x_axis);
        let min_x = -max_x;

        let max_y = DVec3::from_radians(
            0.0,
            rectangle.north,
            if fully_below_equator {
                minimum_height
            } else {
                maximum_height
            },
            radii_squared,
        )
        .z;
        let min_y = DVec3::from_radians(
            0.0,
            rectangle.south,
            if fully_above_equator {
                minimum_height
            } else {
                maximum_height
            },
            radii_squared,
        )
        .z;

        let far_z = DVec3::from_radians(
            rectangle.east,
            latitude_nearest_to_equator,
            maximum_height,
            radii_squared,
        );
        let min_z = plane.get_point_distance(far_z);

        from_plane_extents(
            plane_origin,
            plane_x_axis,
            plane_y_axis,
            plane_normal,
            DVec3::new(min_x, min_y, min_z),
            DVec3::new(max_x, max_y, 0.0),
        )
    }

    pub fn from_bounding_sphere(sphere: &BoundingSphere) -> Self {
        Self::new(sphere.center, DMat3::from_diagonal(DVec3::splat(sphere.radius)))
    }

    pub fn compute_corners(&self) -> [DVec3; 8] {
        let u = self.half_axes.x_axis;
        let v = self.half_axes.y_axis;
        let w = self.half_axes.z_axis;
        let c = self.center;
        [
            c - u - v - w,
            c - u - v + w,
            c - u + v - w,
            c - u + v + w,
            c + u - v - w,
            c + u - v + w,
            c + u + v - w,
            c + u + v + w,
        ]
    }

    /// Replaces zero-length half axes with unit vectors orthogonal to the
    /// remaining ones so that distances can be measured in a full basis.
    fn distance_basis(&self) -> ([DVec3; 3], DVec3) {
        let columns = [
            self.half_axes.x_axis,
            self.half_axes.y_axis,
            self.half_axes.z_axis,
        ];
        let half = DVec3::new(
            columns[0].length(),
            columns[1].length(),
            columns[2].length(),
        );
        let valid = [half.x > 0.0, half.y > 0.0, half.z > 0.0];
        let mut axes = [DVec3::ZERO; 3];
        for i in 0..3 {
            if valid[i] {
                axes[i] = columns[i] / half[i];
            }
        }

        match valid.iter().filter(|v| !**v).count() {
            1 => {
                let degenerate = valid.iter().position(|v| !*v).unwrap_or(0);
                let a = axes[(degenerate + 1) % 3];
                let b = axes[(degenerate + 2) % 3];
                axes[degenerate] = a.cross(b);
            }
            2 => {
                let kept = valid.iter().position(|v| *v).unwrap_or(0);
                let axis1 = axes[kept];
                let mut cross_vector = DVec3::Y;
                if cross_vector.equals_epsilon(axis1, Some(EPSILON3), None) {
                    cross_vector = DVec3::X;
                }
                let axis2 = axis1.cross(cross_vector).normalize();
                let axis3 = axis1.cross(axis2).normalize();
                axes[(kept + 1) % 3] = axis2;
                axes[(kept + 2) % 3] = axis3;
            }
            3 => axes = [DVec3::X, DVec3::Y, DVec3::Z],
            _ => {}
        }
        (axes, half)
    }
}

impl BoundingVolume for OrientedBoundingBox {
    fn intersect_plane(&self, plane: &Plane) -> Intersect {
        let normal = plane.normal;
        let rad_effective = normal.dot(self.half_axes.x_axis).abs()
            + normal.dot(self.half_axes.y_axis).abs()
            + normal.dot(self.half_axes.z_axis).abs();
        let distance_to_plane = normal.dot(self.center) + plane.distance;

        if distance_to_plane <= -rad_effective {
            Intersect::Outside
        } else if distance_to_plane >= rad_effective {
            Intersect::Inside
        } else {
            Intersect::Intersecting
        }
    }

    fn distance_squared_to(&self, cartesian: DVec3) -> f64 {
        let offset = cartesian - self.center;
        let (axes, half) = self.distance_basis();

        let mut distance_squared = 0.0;
        for i in 0..3 {
            let projected = offset.dot(axes[i]);
            let d = if projected < -half[i] {
                projected + half[i]
            } else if projected > half[i] {
                projected - half[i]
            } else {
                0.0
            };
            distance_squared += d * d;
        }
        distance_squared
    }
}

/// Box spanning `minimum..maximum` in the coordinate system of a plane
/// with origin `plane_origin` and the given axes.
pub fn from_plane_extents(
    plane_origin: DVec3,
    plane_x_axis: DVec3,
    plane_y_axis: DVec3,
    plane_z_axis: DVec3,
    minimum: DVec3,
    maximum: DVec3,
) -> OrientedBoundingBox {
    let axes = DMat3::from_cols(plane_x_axis, plane_y_axis, plane_z_axis);
    let center_offset = (minimum + maximum) * 0.5;
    let scale = (maximum - minimum) * 0.5;
    OrientedBoundingBox::new(
        plane_origin + axes * center_offset,
        axes * DMat3::from_diagonal(scale),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EPSILON14;
    use rand::Rng;

    const POSITIONS: [DVec3; 6] = [
        DVec3::new(2.0, 0.0, 0.0),
        DVec3::new(0.0, 3.0, 0.0),
        DVec3::new(0.0, 0.0, 4.0),
        DVec3::new(-2.0, 0.0, 0.0),
        DVec3::new(0.0, -3.0, 0.0),
        DVec3::new(0.0, 0.0, -4.0),
    ];

    fn contains(obb: &OrientedBoundingBox, point: DVec3) -> bool {
        obb.distance_squared_to(point) < 1e-6
    }

    #[test]
    fn empty_points_give_zero_box() {
        let obb = OrientedBoundingBox::from_points(&[]);
        assert_eq!(obb, OrientedBoundingBox::default());
    }

    #[test]
    fn from_points_axis_aligned_octahedron() {
        let obb = OrientedBoundingBox::from_points(&POSITIONS);
        assert_eq!(obb.half_axes, DMat3::from_diagonal(DVec3::new(2.0, 3.0, 4.0)));
        assert_eq!(obb.center, DVec3::ZERO);
    }

    #[test]
    fn from_points_symmetric_pair() {
        let d = 7.5;
        let obb =
            OrientedBoundingBox::from_points(&[DVec3::new(d, 0.0, 0.0), DVec3::new(-d, 0.0, 0.0)]);
        assert!(obb.center.equals_epsilon(DVec3::ZERO, None, Some(EPSILON14)));
        let mut lengths = [
            obb.half_axes.x_axis.length(),
            obb.half_axes.y_axis.length(),
            obb.half_axes.z_axis.length(),
        ];
        lengths.sort_by(f64::total_cmp);
        assert_eq!(lengths, [0.0, 0.0, d]);
    }

    #[test]
    fn from_points_offset_cloud_contains_points() {
        let mut rng = rand::thread_rng();
        let rotation = DMat3::from_axis_angle(DVec3::new(1.0, 2.0, 3.0).normalize(), 0.7);
        let points: Vec<DVec3> = (0..100)
            .map(|_| {
                rotation
                    * DVec3::new(
                        rng.gen_range(-50.0..50.0),
                        rng.gen_range(-5.0..5.0),
                        rng.gen_range(-1.0..1.0),
                    )
                    + DVec3::new(1000.0, -200.0, 30.0)
            })
            .collect();
        let obb = OrientedBoundingBox::from_points(&points);
        for p in points {
            assert!(contains(&obb, p));
        }
    }

    #[test]
    fn plane_classification() {
        let obb = OrientedBoundingBox::new(DVec3::ZERO, DMat3::from_diagonal(DVec3::splat(1.0)));
        assert_eq!(
            obb.intersect_plane(&Plane::new(DVec3::X, 1.0)),
            Intersect::Inside
        );
        assert_eq!(
            obb.intersect_plane(&Plane::new(DVec3::X, -1.0)),
            Intersect::Outside
        );
        assert_eq!(
            obb.intersect_plane(&Plane::new(DVec3::new(1.0, 1.0, 0.0).normalize(), 1.0)),
            Intersect::Intersecting
        );
    }

    #[test]
    fn distance_to_degenerate_box() {
        let flat = OrientedBoundingBox::new(
            DVec3::ZERO,
            DMat3::from_cols(DVec3::X, DVec3::Y, DVec3::ZERO),
        );
        assert_eq!(flat.distance_squared_to(DVec3::new(0.0, 0.0, 3.0)), 9.0);
        assert_eq!(flat.distance_squared_to(DVec3::new(3.0, 0.0, 0.0)), 4.0);

        let point = OrientedBoundingBox::new(DVec3::new(1.0, 1.0, 1.0), DMat3::ZERO);
        assert_eq!(point.distance_squared_to(DVec3::new(1.0, 1.0, 3.0)), 4.0);
    }

    #[test]
    fn narrow_rectangle_box_contains_its_corners() {
        let ellipsoid = Ellipsoid::wgs84();
        let rectangle = Rectangle::from_degrees(-10.0, -5.0, 20.0, 15.0);
        let obb = OrientedBoundingBox::from_rectangle(&rectangle, -100.0, 2000.0, &ellipsoid);
        for longitude in [-10.0, 5.0, 20.0] {
            for latitude in [-5.0, 0.0, 15.0] {
                for height in [-100.0, 2000.0] {
                    let p = ellipsoid.cartographic_to_cartesian(&Cartographic::from_degrees(
                        longitude, latitude, height,
                    ));
                    assert!(contains(&obb, p), "{longitude} {latitude} {height}");
                }
            }
        }
    }

    #[test]
    fn wide_rectangle_box_contains_its_corners() {
        let ellipsoid = Ellipsoid::wgs84();
        let rectangle = Rectangle::from_degrees(-170.0, -30.0, 170.0, 30.0);
        assert!(rectangle.compute_width() > PI);
        let obb = OrientedBoundingBox::from_rectangle(&rectangle, 0.0, 0.0, &ellipsoid);
        for longitude in [-170.0, -90.0, 0.0, 90.0, 170.0] {
            for latitude in [-30.0, 0.0, 30.0] {
                let p = ellipsoid.cartographic_to_cartesian(&Cartographic::from_degrees(
                    longitude, latitude, 0.0,
                ));
                assert!(contains(&obb, p), "{longitude} {latitude}");
            }
        }
    }

    #[test]
    fn sphere_encloses_box() {
        let obb = OrientedBoundingBox::new(
            DVec3::new(1.0, 2.0, 3.0),
            DMat3::from_diagonal(DVec3::new(1.0, 2.0, 2.0)),
        );
        let sphere = BoundingSphere::from_oriented_bounding_box(&obb);
        assert_eq!(sphere.radius, 3.0);
        for corner in obb.compute_corners() {
            assert!(corner.distance(sphere.center) <= sphere.radius + EPSILON14);
        }
    }
}
