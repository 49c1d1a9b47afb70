use std::f64::consts::{FRAC_PI_2, PI, TAU};

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::cartographic::Cartographic;
use crate::ellipsoid::Ellipsoid;
use crate::math::{equals_epsilon, negative_pi_to_pi, EPSILON14};

/// A geographic extent in radians. `east < west` means the rectangle
/// crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Default for Rectangle {
    fn default() -> Self {
        Self::MAX_VALUE
    }
}

impl Rectangle {
    pub const MAX_VALUE: Rectangle = Rectangle {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Rectangle {
            west,
            south,
            east,
            north,
        }
    }

    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Rectangle::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    pub fn compute_width(&self) -> f64 {
        let mut east = self.east;
        if east < self.west {
            east += TAU;
        }
        east - self.west
    }

    pub fn compute_height(&self) -> f64 {
        self.north - self.south
    }

    pub fn south_west(&self) -> Cartographic {
        Cartographic::new(self.west, self.south, 0.0)
    }

    pub fn north_west(&self) -> Cartographic {
        Cartographic::new(self.west, self.north, 0.0)
    }

    pub fn south_east(&self) -> Cartographic {
        Cartographic::new(self.east, self.south, 0.0)
    }

    pub fn north_east(&self) -> Cartographic {
        Cartographic::new(self.east, self.north, 0.0)
    }

    pub fn center(&self) -> Cartographic {
        let mut east = self.east;
        if east < self.west {
            east += TAU;
        }
        Cartographic::new(
            negative_pi_to_pi((self.west + east) * 0.5),
            (self.south + self.north) * 0.5,
            0.0,
        )
    }

    pub fn contains(&self, cartographic: &Cartographic) -> bool {
        let mut longitude = cartographic.longitude;
        let latitude = cartographic.latitude;
        let west = self.west;
        let mut east = self.east;
        if east < west {
            east += TAU;
            if longitude < 0.0 {
                longitude += TAU;
            }
        }
        (longitude > west || equals_epsilon(longitude, west, Some(EPSILON14), None))
            && (longitude < east || equals_epsilon(longitude, east, Some(EPSILON14), None))
            && latitude >= self.south
            && latitude <= self.north
    }

    /// Intersection that understands rectangles crossing the antimeridian.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let mut rectangle_east = self.east;
        let mut rectangle_west = self.west;
        let mut other_east = other.east;
        let mut other_west = other.west;

        if rectangle_east < rectangle_west && other_east > 0.0 {
            rectangle_east += TAU;
        } else if other_east < other_west && rectangle_east > 0.0 {
            other_east += TAU;
        }

        if rectangle_east < rectangle_west && other_west < 0.0 {
            other_west += TAU;
        } else if other_east < other_west && rectangle_west < 0.0 {
            rectangle_west += TAU;
        }

        let west = negative_pi_to_pi(rectangle_west.max(other_west));
        let east = negative_pi_to_pi(rectangle_east.min(other_east));

        if (self.west < self.east || other.west < other.east) && east <= west {
            return None;
        }

        let south = self.south.max(other.south);
        let north = self.north.min(other.north);
        if south >= north {
            return None;
        }
        Some(Rectangle::new(west, south, east, north))
    }

    /// Intersection for rectangles that do not cross the antimeridian.
    pub fn simple_intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let west = self.west.max(other.west);
        let south = self.south.max(other.south);
        let east = self.east.min(other.east);
        let north = self.north.min(other.north);
        if south >= north || west >= east {
            return None;
        }
        Some(Rectangle::new(west, south, east, north))
    }

    /// Points on the ellipsoid at `surface_height` covering the rectangle's
    /// extremes: the four corners, the quarter meridians it contains on its
    /// latitude closest to the equator, and the edge midpoints when it
    /// straddles the equator.
    pub fn subsample(&self, ellipsoid: &Ellipsoid, surface_height: f64) -> Vec<DVec3> {
        let mut positions = Vec::with_capacity(9);
        let mut lla = Cartographic::new(self.west, self.north, surface_height);
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        lla.longitude = self.east;
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        lla.latitude = self.south;
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        lla.longitude = self.west;
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));

        lla.latitude = if self.north < 0.0 {
            self.north
        } else if self.south > 0.0 {
            self.south
        } else {
            0.0
        };

        for i in 1..8 {
            lla.longitude = -PI + f64::from(i) * FRAC_PI_2;
            if self.contains(&lla) {
                positions.push(ellipsoid.cartographic_to_cartesian(&lla));
            }
        }

        if lla.latitude == 0.0 {
            lla.longitude = self.west;
            positions.push(ellipsoid.cartographic_to_cartesian(&lla));
            lla.longitude = self.east;
            positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        }
        positions
    }

    pub fn equals_epsilon(&self, other: &Rectangle, absolute_epsilon: f64) -> bool {
        (self.west - other.west).abs() <= absolute_epsilon
            && (self.south - other.south).abs() <= absolute_epsilon
            && (self.east - other.east).abs() <= absolute_epsilon
            && (self.north - other.north).abs() <= absolute_epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsample_adds_equator_points_when_straddling() {
        let ellipsoid = Ellipsoid::wgs84();
        let northern = Rectangle::from_degrees(10.0, 20.0, 30.0, 40.0);
        assert_eq!(northern.subsample(&ellipsoid, 0.0).len(), 4);

        let straddling = Rectangle::from_degrees(-10.0, -20.0, 10.0, 20.0);
        let positions = straddling.subsample(&ellipsoid, 0.0);
        // Corners, the prime meridian on the equator and both edge midpoints.
        assert_eq!(positions.len(), 7);
        assert!(positions[4].distance(DVec3::new(ellipsoid.radii.x, 0.0, 0.0)) < 1e-6);
    }

    #[test]
    fn width_and_center_across_antimeridian() {
        let rectangle = Rectangle::from_degrees(170.0, -10.0, -170.0, 10.0);
        assert!(equals_epsilon(
            rectangle.compute_width(),
            20f64.to_radians(),
            None,
            Some(EPSILON14)
        ));
        let center = rectangle.center();
        assert!(equals_epsilon(center.longitude.abs(), PI, None, Some(1e-12)));
        assert!(rectangle.contains(&Cartographic::from_degrees(-175.0, 0.0, 0.0)));
        assert!(rectangle.contains(&Cartographic::from_degrees(175.0, 0.0, 0.0)));
        assert!(!rectangle.contains(&Cartographic::from_degrees(0.0, 0.0, 0.0)));
    }

    #[test]
    fn intersection_with_antimeridian_rectangle() {
        let crossing = Rectangle::from_degrees(170.0, -10.0, -170.0, 10.0);
        let east_side = Rectangle::from_degrees(160.0, -5.0, 175.0, 5.0);
        let result = crossing.intersection(&east_side).expect("overlapping");
        assert!(result.equals_epsilon(&Rectangle::from_degrees(170.0, -5.0, 175.0, 5.0), 1e-12));

        let far_away = Rectangle::from_degrees(0.0, -5.0, 10.0, 5.0);
        assert!(crossing.intersection(&far_away).is_none());
    }

    #[test]
    fn simple_intersection_rejects_touching_edges() {
        let a = Rectangle::new(0.0, 0.0, 1.0, 1.0);
        let b = Rectangle::new(1.0, 0.0, 2.0, 1.0);
        assert!(a.simple_intersection(&b).is_none());
        let c = Rectangle::new(0.5, 0.5, 2.0, 2.0);
        assert_eq!(
            a.simple_intersection(&c),
            Some(Rectangle::new(0.5, 0.5, 1.0, 1.0))
        );
    }

    #[test]
    fn deserializes_from_json() {
        let rectangle: Rectangle =
            serde_json::from_str(r#"{"west":-1.0,"south":-0.5,"east":1.0,"north":0.5}"#)
                .expect("valid json");
        assert_eq!(rectangle, Rectangle::new(-1.0, -0.5, 1.0, 0.5));
    }
}
