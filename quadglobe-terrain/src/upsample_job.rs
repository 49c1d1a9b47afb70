use std::sync::Arc;

use quadglobe_jobs::{AsyncReturn, Context, Job};
use quadglobe_scene::terrain::{TerrainData, TerrainError};
use quadglobe_scene::{TileKey, TilingScheme};

/// Derives a tile's terrain from its parent's.
pub struct UpsampleJob {
    pub key: TileKey,
    pub parent_key: TileKey,
    pub epoch: u64,
    pub terrain_data: Arc<dyn TerrainData>,
    pub tiling_scheme: Arc<dyn TilingScheme>,
}

pub struct UpsampleJobOutcome {
    pub key: TileKey,
    pub epoch: u64,
    pub result: Result<Arc<dyn TerrainData>, TerrainError>,
}

impl Job for UpsampleJob {
    type Outcome = UpsampleJobOutcome;

    fn name(&self) -> String {
        format!("Upsampling tile {} from {}", self.key, self.parent_key)
    }

    fn perform(self, _context: Context) -> AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let result = self.terrain_data.upsample(
                self.tiling_scheme.as_ref(),
                self.parent_key.x,
                self.parent_key.y,
                self.parent_key.level,
                self.key.x,
                self.key.y,
                self.key.level,
            );
            UpsampleJobOutcome {
                key: self.key,
                epoch: self.epoch,
                result,
            }
        })
    }
}
