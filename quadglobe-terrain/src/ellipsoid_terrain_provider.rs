use std::sync::Arc;

use quadglobe_scene::terrain::{
    get_estimated_level_zero_geometric_error_for_a_heightmap, HeightmapTerrainData, TerrainData,
};
use quadglobe_scene::{GeographicTilingScheme, TileKey, TilingScheme};

use crate::terrain_provider::{TerrainProvider, TerrainRequest};

const TILE_SIZE: u32 = 16;

/// Terrain that is the bare ellipsoid surface everywhere.
#[derive(Debug, Clone)]
pub struct EllipsoidTerrainProvider {
    tiling_scheme: Arc<GeographicTilingScheme>,
    level_zero_maximum_geometric_error: f64,
}

impl Default for EllipsoidTerrainProvider {
    fn default() -> Self {
        Self::new(GeographicTilingScheme::default())
    }
}

impl EllipsoidTerrainProvider {
    pub fn new(tiling_scheme: GeographicTilingScheme) -> Self {
        let level_zero_maximum_geometric_error =
            get_estimated_level_zero_geometric_error_for_a_heightmap(
                &tiling_scheme.ellipsoid,
                64,
                tiling_scheme.number_of_tiles_at_level(0),
            );
        Self {
            tiling_scheme: Arc::new(tiling_scheme),
            level_zero_maximum_geometric_error,
        }
    }
}

impl TerrainProvider for EllipsoidTerrainProvider {
    fn tiling_scheme(&self) -> Arc<dyn TilingScheme> {
        self.tiling_scheme.clone()
    }

    fn request_tile_geometry(&self, _key: &TileKey) -> Option<TerrainRequest> {
        let data: Arc<dyn TerrainData> = Arc::new(HeightmapTerrainData::new(
            vec![0.0; (TILE_SIZE * TILE_SIZE) as usize],
            TILE_SIZE,
            TILE_SIZE,
        ));
        Some(Box::pin(async move { Ok(data) }))
    }

    fn get_level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.level_zero_maximum_geometric_error / 2.0_f64.powi(level as i32)
    }

    fn get_tile_data_available(&self, _key: &TileKey) -> Option<bool> {
        None
    }
}
