use std::fmt::Debug;

use crate::cartographic::Cartographic;
use crate::ellipsoid::Ellipsoid;
use crate::rectangle::Rectangle;

/// Maps `(x, y, level)` tile coordinates onto geographic rectangles. Tile
/// `(0, 0)` of every level is the north-west corner.
pub trait TilingScheme: Debug + Send + Sync {
    fn ellipsoid(&self) -> &Ellipsoid;
    fn rectangle(&self) -> Rectangle;
    fn number_of_x_tiles_at_level(&self, level: u32) -> u32;
    fn number_of_y_tiles_at_level(&self, level: u32) -> u32;
    fn number_of_tiles_at_level(&self, level: u32) -> u32 {
        self.number_of_x_tiles_at_level(level) * self.number_of_y_tiles_at_level(level)
    }
    fn rectangle_to_native_rectangle(&self, rectangle: &Rectangle) -> Rectangle;
    fn tile_x_y_to_native_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        self.rectangle_to_native_rectangle(&self.tile_x_y_to_rectangle(x, y, level))
    }
    fn tile_x_y_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle;
    /// `None` when `position` is outside the scheme's rectangle.
    fn position_to_tile_x_y(&self, position: &Cartographic, level: u32) -> Option<(u32, u32)>;
}
