use bevy::math::DVec3;

use crate::cartographic::Cartographic;
use crate::math::{EPSILON1, EPSILON12, EPSILON14};

/// A triaxial ellipsoid centered at the origin, described by its radii along
/// the x, y and z axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub radii: DVec3,
    pub radii_squared: DVec3,
    pub radii_to_the_fourth: DVec3,
    pub one_over_radii: DVec3,
    pub one_over_radii_squared: DVec3,
    pub minimum_radius: f64,
    pub maximum_radius: f64,
    pub center_tolerance_squared: f64,
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Ellipsoid {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::from_vec3(DVec3::new(x, y, z))
    }

    pub fn from_vec3(radii: DVec3) -> Self {
        let radii_squared = radii * radii;
        Ellipsoid {
            radii,
            radii_squared,
            radii_to_the_fourth: radii_squared * radii_squared,
            one_over_radii: DVec3::ONE / radii,
            one_over_radii_squared: DVec3::ONE / radii_squared,
            minimum_radius: radii.min_element(),
            maximum_radius: radii.max_element(),
            center_tolerance_squared: EPSILON1,
        }
    }

    pub fn wgs84() -> Self {
        Self::new(6378137.0, 6378137.0, 6356752.314245179)
    }

    pub fn unit_sphere() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub fn geocentric_surface_normal(position: DVec3) -> DVec3 {
        position.normalize()
    }

    pub fn geodetic_surface_normal_cartographic(&self, cartographic: &Cartographic) -> DVec3 {
        let cos_latitude = cartographic.latitude.cos();
        DVec3::new(
            cos_latitude * cartographic.longitude.cos(),
            cos_latitude * cartographic.longitude.sin(),
            cartographic.latitude.sin(),
        )
        .normalize()
    }

    /// `None` at the center, where the normal is undefined.
    pub fn geodetic_surface_normal(&self, position: DVec3) -> Option<DVec3> {
        if position.abs_diff_eq(DVec3::ZERO, EPSILON14) {
            return None;
        }
        Some((position * self.one_over_radii_squared).normalize())
    }

    pub fn cartographic_to_cartesian(&self, cartographic: &Cartographic) -> DVec3 {
        let n = self.geodetic_surface_normal_cartographic(cartographic);
        let k = self.radii_squared * n;
        let gamma = n.dot(k).sqrt();
        k / gamma + n * cartographic.height
    }

    pub fn cartesian_to_cartographic(&self, position: DVec3) -> Option<Cartographic> {
        let p = self.scale_to_geodetic_surface(position)?;
        let n = self.geodetic_surface_normal(p)?;
        let h = position - p;
        let height = h.dot(position).signum() * h.length();
        Some(Cartographic::new(n.y.atan2(n.x), n.z.asin(), height))
    }

    /// Projects `position` along the geodetic normal onto the surface.
    /// Returns `None` for the center, where no projection exists.
    pub fn scale_to_geodetic_surface(&self, position: DVec3) -> Option<DVec3> {
        let scaled = position * self.one_over_radii;
        let squared = scaled * scaled;
        let squared_norm = squared.x + squared.y + squared.z;
        let ratio = (1.0 / squared_norm).sqrt();

        let intersection = position * ratio;
        if squared_norm < self.center_tolerance_squared {
            return ratio.is_finite().then_some(intersection);
        }

        let one_over_radii_squared = self.one_over_radii_squared;
        let gradient = intersection * one_over_radii_squared * 2.0;
        let mut lambda = (1.0 - ratio) * position.length() / (0.5 * gradient.length());
        let mut correction = 0.0;
        let mut multiplier;
        let mut iterations = 0;

        loop {
            lambda -= correction;
            multiplier = DVec3::ONE / (DVec3::ONE + one_over_radii_squared * lambda);
            let multiplier2 = multiplier * multiplier;
            let multiplier3 = multiplier2 * multiplier;

            let func = squared.dot(multiplier2) - 1.0;
            let denominator = (squared * multiplier3).dot(one_over_radii_squared);
            correction = func / (-2.0 * denominator);

            iterations += 1;
            if func.abs() <= EPSILON12 || iterations >= 64 {
                break;
            }
        }
        Some(position * multiplier)
    }

    pub fn scale_to_geocentric_surface(&self, position: DVec3) -> DVec3 {
        let scaled = position * self.one_over_radii;
        position * (1.0 / scaled.length_squared()).sqrt()
    }

    pub fn transform_position_to_scaled_space(&self, position: DVec3) -> DVec3 {
        position * self.one_over_radii
    }

    pub fn transform_position_from_scaled_space(&self, position: DVec3) -> DVec3 {
        position * self.radii
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Cartesian3, EPSILON6};

    #[test]
    fn cartographic_round_trip_keeps_height_sign() {
        let ellipsoid = Ellipsoid::wgs84();
        for height in [-1500.0, 0.0, 8848.0] {
            let cartographic = Cartographic::from_degrees(120.0, 30.0, height);
            let cartesian = ellipsoid.cartographic_to_cartesian(&cartographic);
            let back = ellipsoid
                .cartesian_to_cartographic(cartesian)
                .expect("off-center position");
            assert!(back.equals_epsilon(&cartographic, EPSILON6));
        }
    }

    #[test]
    fn center_has_no_cartographic() {
        let ellipsoid = Ellipsoid::wgs84();
        assert!(ellipsoid.cartesian_to_cartographic(DVec3::ZERO).is_none());
        assert!(ellipsoid.geodetic_surface_normal(DVec3::ZERO).is_none());
    }

    #[test]
    fn scales_point_above_pole_onto_surface() {
        let ellipsoid = Ellipsoid::wgs84();
        let above = DVec3::new(0.0, 0.0, ellipsoid.radii.z * 2.0);
        let surface = ellipsoid
            .scale_to_geodetic_surface(above)
            .expect("not at center");
        assert!(surface.equals_epsilon(DVec3::new(0.0, 0.0, ellipsoid.radii.z), None, Some(EPSILON6)));
    }

    #[test]
    fn scaled_space_round_trip() {
        let ellipsoid = Ellipsoid::wgs84();
        let p = DVec3::new(1.0e6, -2.0e6, 3.0e6);
        let back = ellipsoid
            .transform_position_from_scaled_space(ellipsoid.transform_position_to_scaled_space(p));
        assert!(back.equals_epsilon(p, None, Some(EPSILON6)));
    }
}
