use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use quadglobe_scene::terrain::TerrainMesh;
use quadglobe_scene::TileKey;

/// Opaque reference to GPU geometry created from a terrain mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub u64);

/// Receives finished meshes and turns them into drawable geometry.
pub trait TileGeometrySink: Debug + Send + Sync {
    fn create_geometry(&mut self, key: &TileKey, mesh: &TerrainMesh) -> GeometryHandle;

    fn destroy_geometry(&mut self, handle: GeometryHandle);
}

/// Counters shared between a [`CountingGeometrySink`] and its observers.
#[derive(Debug, Clone, Default)]
pub struct GeometryStats {
    created: Arc<AtomicU64>,
    destroyed: Arc<AtomicU64>,
}

impl GeometryStats {
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    pub fn live(&self) -> u64 {
        self.created().saturating_sub(self.destroyed())
    }
}

/// Sink for headless use. Keeps no geometry, only counts it.
#[derive(Debug, Default)]
pub struct CountingGeometrySink {
    stats: GeometryStats,
}

impl CountingGeometrySink {
    pub fn stats(&self) -> GeometryStats {
        self.stats.clone()
    }
}

impl TileGeometrySink for CountingGeometrySink {
    fn create_geometry(&mut self, key: &TileKey, mesh: &TerrainMesh) -> GeometryHandle {
        let id = self.stats.created.fetch_add(1, Ordering::Relaxed);
        bevy::log::trace!(
            "Created geometry {} for tile {} with {} vertices",
            id,
            key,
            mesh.vertex_count()
        );
        GeometryHandle(id)
    }

    fn destroy_geometry(&mut self, handle: GeometryHandle) {
        bevy::log::trace!("Destroyed geometry {}", handle.0);
        self.stats.destroyed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use quadglobe_scene::terrain::{CreateMeshOptions, HeightmapTerrainData, IndicesAndEdgesCache, TerrainData};
    use quadglobe_scene::GeographicTilingScheme;

    use super::*;

    #[test]
    fn counts_live_geometry() {
        let tiling_scheme = GeographicTilingScheme::default();
        let cache = Mutex::new(IndicesAndEdgesCache::new());
        let mesh = HeightmapTerrainData::new(vec![0.0; 4], 2, 2)
            .create_mesh(&CreateMeshOptions {
                tiling_scheme: &tiling_scheme,
                x: 0,
                y: 0,
                level: 0,
                exaggeration: 1.0,
                exaggeration_relative_height: 0.0,
                indices_and_edges_cache: &cache,
            })
            .unwrap();

        let mut sink = CountingGeometrySink::default();
        let stats = sink.stats();
        let key = TileKey::new(0, 0, 0);
        let first = sink.create_geometry(&key, &mesh);
        let second = sink.create_geometry(&key, &mesh);
        assert_ne!(first, second);
        assert_eq!(stats.live(), 2);
        sink.destroy_geometry(first);
        assert_eq!(stats.created(), 2);
        assert_eq!(stats.destroyed(), 1);
        assert_eq!(stats.live(), 1);
    }
}
