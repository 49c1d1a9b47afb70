use std::fmt::Debug;
use std::sync::Arc;

use quadglobe_jobs::AsyncReturn;
use quadglobe_scene::terrain::TerrainData;
use quadglobe_scene::{TileKey, TilingScheme};

/// Terrain for one tile, delivered asynchronously.
pub type TerrainRequest = AsyncReturn<Result<Arc<dyn TerrainData>, TerrainRequestError>>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TerrainRequestError {
    /// The request was dropped before completing. It will be made again.
    #[error("terrain request was cancelled")]
    Cancelled,
    #[error("{message}")]
    Failed { message: String },
}

/// A failed terrain request as reported to [`TerrainProvider::on_request_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileProviderError {
    pub key: TileKey,
    pub message: String,
    /// Retries already made for this tile.
    pub times_retried: u32,
}

pub trait TerrainProvider: Debug + Send + Sync {
    fn tiling_scheme(&self) -> Arc<dyn TilingScheme>;

    /// Starts fetching the terrain of `key`. `None` means the request
    /// cannot be made right now and should be tried again later.
    fn request_tile_geometry(&self, key: &TileKey) -> Option<TerrainRequest>;

    fn get_level_maximum_geometric_error(&self, level: u32) -> f64;

    /// `None` when availability is not known ahead of time.
    fn get_tile_data_available(&self, key: &TileKey) -> Option<bool>;

    /// Called after a request failed. Returning true requests the tile
    /// again immediately.
    fn on_request_error(&self, _error: &TileProviderError) -> bool {
        false
    }
}
