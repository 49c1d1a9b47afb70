use std::sync::{Arc, Mutex};

use quadglobe_jobs::{AsyncReturn, Context, Job};
use quadglobe_scene::terrain::{
    CreateMeshOptions, IndicesAndEdgesCache, TerrainData, TerrainError, TerrainMesh,
};
use quadglobe_scene::{TileKey, TilingScheme};

pub struct CreateTerrainMeshJob {
    pub key: TileKey,
    pub epoch: u64,
    pub terrain_data: Arc<dyn TerrainData>,
    pub tiling_scheme: Arc<dyn TilingScheme>,
    pub exaggeration: f64,
    pub exaggeration_relative_height: f64,
    pub indices_and_edges_cache: Arc<Mutex<IndicesAndEdgesCache>>,
}

pub struct CreateTerrainMeshJobOutcome {
    pub key: TileKey,
    pub epoch: u64,
    pub result: Result<TerrainMesh, TerrainError>,
}

impl Job for CreateTerrainMeshJob {
    type Outcome = CreateTerrainMeshJobOutcome;

    fn name(&self) -> String {
        format!("Creating terrain mesh for tile {}", self.key)
    }

    fn perform(self, _context: Context) -> AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let result = self.terrain_data.create_mesh(&CreateMeshOptions {
                tiling_scheme: self.tiling_scheme.as_ref(),
                x: self.key.x,
                y: self.key.y,
                level: self.key.level,
                exaggeration: self.exaggeration,
                exaggeration_relative_height: self.exaggeration_relative_height,
                indices_and_edges_cache: &self.indices_and_edges_cache,
            });
            CreateTerrainMeshJobOutcome {
                key: self.key,
                epoch: self.epoch,
                result,
            }
        })
    }
}
