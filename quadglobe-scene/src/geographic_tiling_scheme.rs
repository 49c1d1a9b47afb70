use crate::cartographic::Cartographic;
use crate::ellipsoid::Ellipsoid;
use crate::rectangle::Rectangle;
use crate::tiling_scheme::TilingScheme;

/// Equal-angle tiling where longitude and latitude map linearly to x and y.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicTilingScheme {
    pub ellipsoid: Ellipsoid,
    pub rectangle: Rectangle,
    pub number_of_level_zero_tiles_x: u32,
    pub number_of_level_zero_tiles_y: u32,
}

impl Default for GeographicTilingScheme {
    fn default() -> Self {
        Self::new(Ellipsoid::wgs84(), Rectangle::MAX_VALUE, 2, 1)
    }
}

impl GeographicTilingScheme {
    pub fn new(
        ellipsoid: Ellipsoid,
        rectangle: Rectangle,
        number_of_level_zero_tiles_x: u32,
        number_of_level_zero_tiles_y: u32,
    ) -> Self {
        Self {
            ellipsoid,
            rectangle,
            number_of_level_zero_tiles_x,
            number_of_level_zero_tiles_y,
        }
    }
}

impl TilingScheme for GeographicTilingScheme {
    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    fn number_of_x_tiles_at_level(&self, level: u32) -> u32 {
        self.number_of_level_zero_tiles_x << level
    }

    fn number_of_y_tiles_at_level(&self, level: u32) -> u32 {
        self.number_of_level_zero_tiles_y << level
    }

    fn rectangle_to_native_rectangle(&self, rectangle: &Rectangle) -> Rectangle {
        Rectangle::new(
            rectangle.west.to_degrees(),
            rectangle.south.to_degrees(),
            rectangle.east.to_degrees(),
            rectangle.north.to_degrees(),
        )
    }

    fn tile_x_y_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        let rectangle = self.rectangle;

        let x_tiles = self.number_of_x_tiles_at_level(level);
        let y_tiles = self.number_of_y_tiles_at_level(level);

        let x_tile_width = rectangle.compute_width() / f64::from(x_tiles);
        let west = f64::from(x) * x_tile_width + rectangle.west;
        let east = f64::from(x + 1) * x_tile_width + rectangle.west;

        let y_tile_height = rectangle.compute_height() / f64::from(y_tiles);
        let north = rectangle.north - f64::from(y) * y_tile_height;
        let south = rectangle.north - f64::from(y + 1) * y_tile_height;

        Rectangle::new(west, south, east, north)
    }

    fn position_to_tile_x_y(&self, position: &Cartographic, level: u32) -> Option<(u32, u32)> {
        let rectangle = self.rectangle;
        if !rectangle.contains(position) {
            return None;
        }

        let x_tiles = self.number_of_x_tiles_at_level(level);
        let y_tiles = self.number_of_y_tiles_at_level(level);

        let x_tile_width = rectangle.compute_width() / f64::from(x_tiles);
        let y_tile_height = rectangle.compute_height() / f64::from(y_tiles);

        let mut longitude = position.longitude;
        if rectangle.east < rectangle.west && longitude < rectangle.west {
            longitude += std::f64::consts::TAU;
        }

        let x = ((longitude - rectangle.west) / x_tile_width).floor() as u32;
        let y = ((rectangle.north - position.latitude) / y_tile_height).floor() as u32;

        Some((x.min(x_tiles - 1), y.min(y_tiles - 1)))
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;
    use crate::math::{equals_epsilon, EPSILON10, EPSILON15};

    fn two_by_two() -> GeographicTilingScheme {
        GeographicTilingScheme::new(Ellipsoid::wgs84(), Rectangle::MAX_VALUE, 2, 2)
    }

    #[test]
    fn single_root_tile_covers_the_scheme() {
        let tiling_scheme = GeographicTilingScheme::new(Ellipsoid::wgs84(), Rectangle::MAX_VALUE, 1, 1);
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 0, 0);
        assert!(rectangle.equals_epsilon(&tiling_scheme.rectangle, EPSILON10));
    }

    #[test]
    fn tiles_are_numbered_from_the_northwest_corner() {
        let tiling_scheme = two_by_two();
        let northwest = tiling_scheme.tile_x_y_to_rectangle(0, 0, 1);
        let northeast = tiling_scheme.tile_x_y_to_rectangle(1, 0, 1);
        let southeast = tiling_scheme.tile_x_y_to_rectangle(1, 1, 1);
        let southwest = tiling_scheme.tile_x_y_to_rectangle(0, 1, 1);

        assert_eq!(northeast.north, northwest.north);
        assert_eq!(southeast.south, southwest.south);
        assert_eq!(northwest.west, southwest.west);
        assert_eq!(northeast.east, southeast.east);

        assert!(northeast.north > southeast.north);
        assert!(northwest.south > southwest.south);
        assert!(northeast.east > northwest.east);
        assert!(southeast.west > southwest.west);

        assert!(equals_epsilon(northeast.south, southeast.north, Some(EPSILON15), None));
        assert!(equals_epsilon(northeast.west, northwest.east, Some(EPSILON15), None));
    }

    #[test]
    fn default_scheme_has_two_root_tiles() {
        let tiling_scheme = GeographicTilingScheme::default();
        assert_eq!(tiling_scheme.number_of_tiles_at_level(0), 2);
        assert_eq!(tiling_scheme.number_of_tiles_at_level(3), 128);

        let west = tiling_scheme.tile_x_y_to_rectangle(0, 0, 0);
        assert!(west.equals_epsilon(&Rectangle::new(-PI, -FRAC_PI_2, 0.0, FRAC_PI_2), EPSILON15));

        let tile = tiling_scheme.tile_x_y_to_rectangle(0, 1, 1);
        assert!(tile.equals_epsilon(&Rectangle::new(-PI, -FRAC_PI_2, -FRAC_PI_2, 0.0), EPSILON15));

        let native = tiling_scheme.tile_x_y_to_native_rectangle(1, 0, 0);
        assert!(native.equals_epsilon(&Rectangle::new(0.0, -90.0, 180.0, 90.0), EPSILON10));
    }

    #[test]
    fn position_maps_to_containing_tile() {
        let tiling_scheme = GeographicTilingScheme::default();
        let position = Cartographic::from_degrees(45.0, 30.0, 0.0);
        let (x, y) = tiling_scheme.position_to_tile_x_y(&position, 2).expect("inside");
        assert!(tiling_scheme.tile_x_y_to_rectangle(x, y, 2).contains(&position));

        let corner = Cartographic::new(PI, -FRAC_PI_2, 0.0);
        assert_eq!(tiling_scheme.position_to_tile_x_y(&corner, 1), Some((3, 1)));

        let limited = GeographicTilingScheme::new(
            Ellipsoid::wgs84(),
            Rectangle::from_degrees(0.0, 0.0, 10.0, 10.0),
            1,
            1,
        );
        assert!(limited
            .position_to_tile_x_y(&Cartographic::from_degrees(-5.0, 5.0, 0.0), 0)
            .is_none());
    }
}
