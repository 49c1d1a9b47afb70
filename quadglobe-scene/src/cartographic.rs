use bevy::math::DVec3;

use crate::ellipsoid::Ellipsoid;
use crate::math::equals_epsilon;

/// A geodetic position: longitude and latitude in radians, height in meters
/// above the ellipsoid.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub const ZERO: Cartographic = Cartographic {
        longitude: 0.0,
        latitude: 0.0,
        height: 0.0,
    };

    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic {
            longitude,
            latitude,
            height,
        }
    }

    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic {
            longitude: longitude.to_radians(),
            latitude: latitude.to_radians(),
            height,
        }
    }

    pub fn from_cartesian(cartesian: DVec3, ellipsoid: &Ellipsoid) -> Option<Self> {
        ellipsoid.cartesian_to_cartographic(cartesian)
    }

    pub fn to_cartesian(&self, ellipsoid: &Ellipsoid) -> DVec3 {
        ellipsoid.cartographic_to_cartesian(self)
    }

    pub fn equals_epsilon(&self, right: &Cartographic, epsilon: f64) -> bool {
        equals_epsilon(self.longitude, right.longitude, None, Some(epsilon))
            && equals_epsilon(self.latitude, right.latitude, None, Some(epsilon))
            && equals_epsilon(self.height, right.height, None, Some(epsilon))
    }
}
