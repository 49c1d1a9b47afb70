use std::sync::Arc;

use quadglobe_jobs::{AsyncReturn, Context, Job};
use quadglobe_scene::terrain::TerrainData;
use quadglobe_scene::TileKey;

use crate::terrain_provider::{TerrainRequest, TerrainRequestError};

pub struct RequestTileGeometryJob {
    pub key: TileKey,
    pub epoch: u64,
    pub request: TerrainRequest,
}

pub struct RequestTileGeometryJobOutcome {
    pub key: TileKey,
    pub epoch: u64,
    pub result: Result<Arc<dyn TerrainData>, TerrainRequestError>,
}

impl Job for RequestTileGeometryJob {
    type Outcome = RequestTileGeometryJobOutcome;

    fn name(&self) -> String {
        format!("Requesting terrain for tile {}", self.key)
    }

    fn perform(self, context: Context) -> AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let result = if context.is_cancelled() {
                Err(TerrainRequestError::Cancelled)
            } else {
                self.request.await
            };
            RequestTileGeometryJobOutcome {
                key: self.key,
                epoch: self.epoch,
                result,
            }
        })
    }
}
