use bevy::math::DVec3;

use crate::bounding_volume::{BoundingVolume, Intersect};
use crate::ellipsoid::Ellipsoid;
use crate::oriented_bounding_box::OrientedBoundingBox;
use crate::plane::Plane;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Runs Ritter's algorithm and the naive axis-aligned fit, keeping the
    /// smaller sphere. An empty set gives the zero sphere.
    pub fn from_points(positions: &[DVec3]) -> Self {
        let Some(&first) = positions.first() else {
            return Self::default();
        };

        let mut x_min = first;
        let mut y_min = first;
        let mut z_min = first;
        let mut x_max = first;
        let mut y_max = first;
        let mut z_max = first;

        for &p in positions.iter().skip(1) {
            if p.x < x_min.x {
                x_min = p;
            }
            if p.x > x_max.x {
                x_max = p;
            }
            if p.y < y_min.y {
                y_min = p;
            }
            if p.y > y_max.y {
                y_max = p;
            }
            if p.z < z_min.z {
                z_min = p;
            }
            if p.z > z_max.z {
                z_max = p;
            }
        }

        let x_span = (x_max - x_min).length_squared();
        let y_span = (y_max - y_min).length_squared();
        let z_span = (z_max - z_min).length_squared();

        let mut diameter1 = x_min;
        let mut diameter2 = x_max;
        let mut max_span = x_span;
        if y_span > max_span {
            max_span = y_span;
            diameter1 = y_min;
            diameter2 = y_max;
        }
        if z_span > max_span {
            diameter1 = z_min;
            diameter2 = z_max;
        }

        let mut ritter_center = (diameter1 + diameter2) * 0.5;
        let mut radius_squared = (diameter2 - ritter_center).length_squared();
        let mut ritter_radius = radius_squared.sqrt();

        let min_box_pt = DVec3::new(x_min.x, y_min.y, z_min.z);
        let max_box_pt = DVec3::new(x_max.x, y_max.y, z_max.z);
        let naive_center = (min_box_pt + max_box_pt) * 0.5;

        let mut naive_radius: f64 = 0.0;
        for &p in positions {
            naive_radius = naive_radius.max((p - naive_center).length());

            let old_center_to_point_squared = (p - ritter_center).length_squared();
            if old_center_to_point_squared > radius_squared {
                let old_center_to_point = old_center_to_point_squared.sqrt();
                ritter_radius = (ritter_radius + old_center_to_point) * 0.5;
                radius_squared = ritter_radius * ritter_radius;
                let old_to_new = old_center_to_point - ritter_radius;
                ritter_center =
                    (ritter_center * ritter_radius + p * old_to_new) / old_center_to_point;
            }
        }

        if ritter_radius < naive_radius {
            Self::new(ritter_center, ritter_radius)
        } else {
            Self::new(naive_center, naive_radius)
        }
    }

    pub fn from_corner_points(corner: DVec3, opposite_corner: DVec3) -> Self {
        let center = (corner + opposite_corner) * 0.5;
        Self::new(center, center.distance(opposite_corner))
    }

    pub fn from_ellipsoid(ellipsoid: &Ellipsoid) -> Self {
        Self::new(DVec3::ZERO, ellipsoid.maximum_radius)
    }

    pub fn from_oriented_bounding_box(obb: &OrientedBoundingBox) -> Self {
        let half_axes = obb.half_axes;
        let u = half_axes.x_axis + half_axes.y_axis + half_axes.z_axis;
        Self::new(obb.center, u.length())
    }

    pub fn from_bounding_spheres(spheres: &[BoundingSphere]) -> Self {
        match spheres {
            [] => Self::default(),
            [only] => *only,
            [left, right] => left.union(right),
            _ => {
                let centers: Vec<DVec3> = spheres.iter().map(|s| s.center).collect();
                let fit = Self::from_points(&centers);
                let radius = spheres.iter().fold(fit.radius, |radius, s| {
                    radius.max(fit.center.distance(s.center) + s.radius)
                });
                Self::new(fit.center, radius)
            }
        }
    }

    pub fn union(&self, right: &BoundingSphere) -> Self {
        let to_right_center = right.center - self.center;
        let center_separation = to_right_center.length();

        if self.radius >= center_separation + right.radius {
            return *self;
        }
        if right.radius >= center_separation + self.radius {
            return *right;
        }

        let half_distance_between_tangent_points =
            (self.radius + center_separation + right.radius) * 0.5;
        let center = self.center
            + to_right_center
                * ((-self.radius + half_distance_between_tangent_points) / center_separation);
        Self::new(center, half_distance_between_tangent_points)
    }

    pub fn expand(&self, point: DVec3) -> Self {
        let radius = (point - self.center).length();
        if radius > self.radius {
            Self::new(self.center, radius)
        } else {
            *self
        }
    }
}

impl BoundingVolume for BoundingSphere {
    fn intersect_plane(&self, plane: &Plane) -> Intersect {
        let distance_to_plane = plane.normal.dot(self.center) + plane.distance;
        if distance_to_plane < -self.radius {
            Intersect::Outside
        } else if distance_to_plane < self.radius {
            Intersect::Intersecting
        } else {
            Intersect::Inside
        }
    }

    fn distance_squared_to(&self, cartesian: DVec3) -> f64 {
        let distance = ((self.center - cartesian).length() - self.radius).max(0.0);
        distance * distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn from_points_encloses_every_point() {
        let mut rng = rand::thread_rng();
        let points: Vec<DVec3> = (0..200)
            .map(|_| {
                DVec3::new(
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-1.0..1.0),
                )
            })
            .collect();
        let sphere = BoundingSphere::from_points(&points);
        for p in points {
            assert!(p.distance(sphere.center) <= sphere.radius + 1e-9);
        }
    }

    #[test]
    fn empty_point_set_is_zero_sphere() {
        assert_eq!(BoundingSphere::from_points(&[]), BoundingSphere::default());
    }

    #[test]
    fn union_of_disjoint_spheres() {
        let left = BoundingSphere::new(DVec3::new(-2.0, 0.0, 0.0), 1.0);
        let right = BoundingSphere::new(DVec3::new(2.0, 0.0, 0.0), 1.0);
        let union = left.union(&right);
        assert_eq!(union, BoundingSphere::new(DVec3::ZERO, 3.0));
        assert_eq!(
            BoundingSphere::from_bounding_spheres(&[left, right]),
            union
        );
    }

    #[test]
    fn union_keeps_enclosing_sphere() {
        let big = BoundingSphere::new(DVec3::ZERO, 10.0);
        let small = BoundingSphere::new(DVec3::new(1.0, 0.0, 0.0), 1.0);
        assert_eq!(big.union(&small), big);
        assert_eq!(small.union(&big), big);
    }

    #[test]
    fn plane_classification() {
        let sphere = BoundingSphere::new(DVec3::ZERO, 1.0);
        let inside = Plane::new(DVec3::X, 2.0);
        let outside = Plane::new(DVec3::X, -2.0);
        let crossing = Plane::new(DVec3::X, 0.0);
        assert_eq!(sphere.intersect_plane(&inside), Intersect::Inside);
        assert_eq!(sphere.intersect_plane(&outside), Intersect::Outside);
        assert_eq!(sphere.intersect_plane(&crossing), Intersect::Intersecting);
    }

    #[test]
    fn distance_to_point() {
        let sphere = BoundingSphere::new(DVec3::ZERO, 1.0);
        assert_eq!(sphere.distance_squared_to(DVec3::new(3.0, 0.0, 0.0)), 4.0);
        assert_eq!(sphere.distance_squared_to(DVec3::new(0.5, 0.0, 0.0)), 0.0);
        assert_eq!(sphere.expand(DVec3::new(0.0, 4.0, 0.0)).radius, 4.0);
    }
}
