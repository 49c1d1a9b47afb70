use std::f64::consts::PI;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use crate::ellipsoid::Ellipsoid;
use crate::rectangle::Rectangle;
use crate::tiling_scheme::TilingScheme;

use super::indices_and_edges_cache::IndicesAndEdgesCache;
use super::terrain_mesh::TerrainMesh;

const HEIGHTMAP_TERRAIN_QUALITY: f64 = 0.25;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TerrainError {
    #[error("heightmap must be at least 2x2 samples, got {width}x{height}")]
    HeightmapTooSmall { width: u32, height: u32 },
    #[error("heightmap buffer holds {actual} values but {expected} are required")]
    BufferTooShort { expected: usize, actual: usize },
    #[error("a {width}x{height} heightmap does not fit in memory")]
    HeightmapTooLarge { width: u32, height: u32 },
    #[error("a {width}x{height} grid has too many vertices for 32-bit indices")]
    TooManyVertices { width: u32, height: u32 },
    #[error("upsampling through {levels} levels at once is not supported")]
    UpsampleLevelDifference { levels: u32 },
}

/// Everything [`TerrainData::create_mesh`] needs besides the data itself.
pub struct CreateMeshOptions<'a> {
    pub tiling_scheme: &'a dyn TilingScheme,
    pub x: u32,
    pub y: u32,
    pub level: u32,
    pub exaggeration: f64,
    pub exaggeration_relative_height: f64,
    pub indices_and_edges_cache: &'a Mutex<IndicesAndEdgesCache>,
}

/// Terrain for one tile as delivered by a terrain provider, before it has
/// been tessellated.
pub trait TerrainData: Debug + Send + Sync {
    fn create_mesh(&self, options: &CreateMeshOptions<'_>) -> Result<TerrainMesh, TerrainError>;

    /// Derives approximate data for a child tile one level below this one.
    #[allow(clippy::too_many_arguments)]
    fn upsample(
        &self,
        tiling_scheme: &dyn TilingScheme,
        this_x: u32,
        this_y: u32,
        this_level: u32,
        descendant_x: u32,
        descendant_y: u32,
        descendant_level: u32,
    ) -> Result<Arc<dyn TerrainData>, TerrainError>;

    fn is_child_available(&self, this_x: u32, this_y: u32, child_x: u32, child_y: u32) -> bool;

    fn was_created_by_upsampling(&self) -> bool;

    fn can_upsample(&self) -> bool {
        true
    }

    /// Minimum and maximum height when known without tessellating.
    fn height_range(&self) -> Option<(f64, f64)> {
        None
    }

    /// Height at a position inside `rectangle`, the rectangle of the tile
    /// this data belongs to.
    fn interpolate_height(&self, rectangle: &Rectangle, longitude: f64, latitude: f64) -> Option<f64>;
}

/// Geometric error of a level zero tile whose heightmap has
/// `tile_image_width` samples across.
pub fn get_estimated_level_zero_geometric_error_for_a_heightmap(
    ellipsoid: &Ellipsoid,
    tile_image_width: u32,
    number_of_tiles_at_level_zero: u32,
) -> f64 {
    ellipsoid.maximum_radius * 2.0 * PI * HEIGHTMAP_TERRAIN_QUALITY
        / f64::from(tile_image_width * number_of_tiles_at_level_zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_zero_error_scales_with_circumference() {
        let ellipsoid = Ellipsoid::wgs84();
        let error = get_estimated_level_zero_geometric_error_for_a_heightmap(&ellipsoid, 64, 2);
        let expected = ellipsoid.maximum_radius * 2.0 * PI * 0.25 / 128.0;
        assert!((error - expected).abs() < 1e-9);
        assert!(
            get_estimated_level_zero_geometric_error_for_a_heightmap(&ellipsoid, 65, 2) < error
        );
    }
}
