use std::sync::{Arc, Mutex};

use bevy::log::{debug, warn};
use bevy::math::DVec3;
use quadglobe_jobs::JobRunner;
use quadglobe_scene::terrain::{IndicesAndEdgesCache, TerrainData, TerrainMesh};
use quadglobe_scene::{TileBoundingRegion, TileKey, TilingScheme};

use crate::config::SurfaceTileProviderOptions;
use crate::create_terrain_mesh_job::CreateTerrainMeshJob;
use crate::geometry_sink::{GeometryHandle, TileGeometrySink};
use crate::imagery::{ImageryLayerCollection, ImageryState, TileImagery};
use crate::quadtree_tile::{QuadtreeTile, QuadtreeTileLoadState};
use crate::quadtree_tile_storage::QuadtreeTileStorage;
use crate::request_tile_geometry_job::RequestTileGeometryJob;
use crate::terrain_provider::{TerrainProvider, TerrainRequestError, TileProviderError};
use crate::upsample_job::UpsampleJob;

/// Progress of a tile's terrain from request to drawable geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum TerrainState {
    Failed,
    #[default]
    Unloaded,
    Receiving,
    Received,
    Transforming,
    Transformed,
    Ready,
}

impl TerrainState {
    pub fn can_transition_to(self, next: TerrainState) -> bool {
        use TerrainState::*;
        matches!(
            (self, next),
            (Unloaded, Receiving)
                | (Unloaded, Failed)
                | (Receiving, Received)
                | (Receiving, Unloaded)
                | (Receiving, Failed)
                | (Received, Transforming)
                | (Transforming, Transformed)
                | (Transforming, Failed)
                | (Transformed, Ready)
                | (Failed, Receiving)
        )
    }
}

/// The terrain, bounds and imagery of one quadtree tile.
#[derive(Debug, Default)]
pub struct GlobeSurfaceTile {
    terrain_state: TerrainState,
    pub terrain_data: Option<Arc<dyn TerrainData>>,
    pub mesh: Option<Arc<TerrainMesh>>,
    pub geometry: Option<GeometryHandle>,
    pub tile_bounding_region: Option<TileBoundingRegion>,
    pub occludee_point_in_scaled_space: Option<DVec3>,
    /// The tile whose heights the bounding region was built from: this
    /// tile, an ancestor, or `None` when nothing is known yet.
    pub bounding_volume_source_tile: Option<TileKey>,
    pub bounding_volume_is_from_mesh: bool,
    pub clipped_by_boundaries: bool,
    pub imagery: Vec<TileImagery>,
    pub times_retried: u32,
}

impl GlobeSurfaceTile {
    pub fn terrain_state(&self) -> TerrainState {
        self.terrain_state
    }

    pub fn set_terrain_state(&mut self, next: TerrainState) {
        debug_assert!(
            self.terrain_state == next || self.terrain_state.can_transition_to(next),
            "invalid terrain state transition {:?} -> {:?}",
            self.terrain_state,
            next
        );
        self.terrain_state = next;
    }

    /// Tiles waiting on a job or on imagery still in transition must stay.
    pub fn eligible_for_unloading(&self) -> bool {
        let loading_is_transitioning = matches!(
            self.terrain_state,
            TerrainState::Receiving | TerrainState::Transforming
        );
        !loading_is_transitioning
            && self
                .imagery
                .iter()
                .all(|imagery| imagery.state != ImageryState::Transitioning)
    }
}

/// Everything the load state machine touches outside the tile arena.
pub(crate) struct TileLoadContext<'a> {
    pub terrain_provider: &'a dyn TerrainProvider,
    pub tiling_scheme: &'a Arc<dyn TilingScheme>,
    pub imagery_layers: &'a mut ImageryLayerCollection,
    pub jobs: &'a mut JobRunner,
    pub geometry_sink: &'a mut dyn TileGeometrySink,
    pub indices_and_edges_cache: &'a Arc<Mutex<IndicesAndEdgesCache>>,
    pub options: &'a SurfaceTileProviderOptions,
    pub epoch: u64,
}

/// Advances the tile one step. With `terrain_only` only terrain is
/// loaded and the tile's renderable flag is left alone.
pub(crate) fn process_state_machine(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    context: &mut TileLoadContext<'_>,
    terrain_only: bool,
) {
    initialize(storage, key, context);

    if storage
        .get(&key)
        .map_or(false, |tile| tile.state == QuadtreeTileLoadState::Loading)
    {
        process_terrain_state_machine(storage, key, context);
    }

    if terrain_only {
        return;
    }
    let Some(tile) = storage.get_mut(&key) else {
        return;
    };

    let was_already_renderable = tile.renderable;

    tile.renderable = tile.data.geometry.is_some();
    let is_terrain_done_loading = tile.data.terrain_state == TerrainState::Ready;
    tile.upsampled_from_parent = tile
        .data
        .terrain_data
        .as_ref()
        .map_or(false, |data| data.was_created_by_upsampling());

    let is_imagery_done_loading = process_imagery(tile, context.imagery_layers);

    if is_terrain_done_loading && is_imagery_done_loading {
        tile.state = QuadtreeTileLoadState::Done;
    }

    // Once renderable, a tile keeps drawing what it has while newer data
    // loads.
    if was_already_renderable {
        tile.renderable = true;
    }
}

fn initialize(storage: &mut QuadtreeTileStorage, key: TileKey, context: &mut TileLoadContext<'_>) {
    let Some(tile) = storage.get(&key) else {
        return;
    };
    if tile.state != QuadtreeTileLoadState::Start {
        return;
    }

    let mut available = context.terrain_provider.get_tile_data_available(&key);
    if available.is_none() {
        if let Some(parent) = tile.parent.and_then(|parent| storage.get(&parent)) {
            if let Some(parent_data) = &parent.data.terrain_data {
                available = Some(parent_data.is_child_available(
                    parent.key.x,
                    parent.key.y,
                    key.x,
                    key.y,
                ));
            }
        }
    }

    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    if available == Some(false) {
        tile.data.set_terrain_state(TerrainState::Failed);
    }
    context.imagery_layers.create_tile_imagery_skeletons(tile);
    tile.state = QuadtreeTileLoadState::Loading;
}

fn process_terrain_state_machine(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    context: &mut TileLoadContext<'_>,
) {
    let terrain_state = |storage: &QuadtreeTileStorage| {
        storage.get(&key).map(|tile| tile.data.terrain_state)
    };
    let Some(tile) = storage.get(&key) else {
        return;
    };

    // A failed tile is upsampled from its parent, so the parent's terrain
    // has to come first.
    if tile.data.terrain_state == TerrainState::Failed {
        if let Some(parent_key) = tile.parent {
            let parent_ready = storage
                .get(&parent_key)
                .and_then(|parent| parent.data.terrain_data.as_ref())
                .map_or(false, |data| data.can_upsample());
            if !parent_ready {
                process_state_machine(storage, parent_key, context, true);
            }
        }
    }

    if terrain_state(storage) == Some(TerrainState::Failed) {
        upsample(storage, key, context);
    }

    if terrain_state(storage) == Some(TerrainState::Unloaded) {
        request_tile_geometry(storage, key, context);
    }

    if terrain_state(storage) == Some(TerrainState::Received) {
        transform(storage, key, context);
    }

    if terrain_state(storage) == Some(TerrainState::Transformed) {
        create_resources(storage, key, context);
    }
}

fn upsample(storage: &mut QuadtreeTileStorage, key: TileKey, context: &mut TileLoadContext<'_>) {
    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    let Some(parent_key) = tile.parent else {
        warn!("No terrain for level zero tile {}, it will not be shown", key);
        tile.state = QuadtreeTileLoadState::Failed;
        return;
    };
    let Some(source) = storage
        .get(&parent_key)
        .and_then(|parent| parent.data.terrain_data.clone())
    else {
        return;
    };
    if !source.can_upsample() {
        return;
    }
    if context.jobs.in_flight::<UpsampleJob>() >= context.options.maximum_asynchronous_tasks {
        return;
    }
    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    tile.data.set_terrain_state(TerrainState::Receiving);
    context.jobs.spawn(UpsampleJob {
        key,
        parent_key,
        epoch: context.epoch,
        terrain_data: source,
        tiling_scheme: context.tiling_scheme.clone(),
    });
}

fn request_tile_geometry(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    context: &mut TileLoadContext<'_>,
) {
    if context.jobs.in_flight::<RequestTileGeometryJob>() >= context.options.maximum_terrain_requests {
        return;
    }
    let Some(request) = context.terrain_provider.request_tile_geometry(&key) else {
        return;
    };
    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    tile.data.set_terrain_state(TerrainState::Receiving);
    context.jobs.spawn(RequestTileGeometryJob {
        key,
        epoch: context.epoch,
        request,
    });
}

fn transform(storage: &mut QuadtreeTileStorage, key: TileKey, context: &mut TileLoadContext<'_>) {
    if context.jobs.in_flight::<CreateTerrainMeshJob>() >= context.options.maximum_asynchronous_tasks {
        return;
    }
    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    let Some(terrain_data) = tile.data.terrain_data.clone() else {
        return;
    };
    tile.data.set_terrain_state(TerrainState::Transforming);
    context.jobs.spawn(CreateTerrainMeshJob {
        key,
        epoch: context.epoch,
        terrain_data,
        tiling_scheme: context.tiling_scheme.clone(),
        exaggeration: context.options.terrain_exaggeration,
        exaggeration_relative_height: context.options.terrain_exaggeration_relative_height,
        indices_and_edges_cache: context.indices_and_edges_cache.clone(),
    });
}

fn create_resources(storage: &mut QuadtreeTileStorage, key: TileKey, context: &mut TileLoadContext<'_>) {
    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    let Some(mesh) = tile.data.mesh.clone() else {
        return;
    };
    if let Some(old) = tile.data.geometry.take() {
        context.geometry_sink.destroy_geometry(old);
    }
    tile.data.geometry = Some(context.geometry_sink.create_geometry(&key, &mesh));
    tile.data.set_terrain_state(TerrainState::Ready);
}

/// Advances every imagery record of the tile. Returns whether all of them
/// are settled.
fn process_imagery(tile: &mut QuadtreeTile, imagery_layers: &mut ImageryLayerCollection) -> bool {
    let mut is_upsampled_only = tile.upsampled_from_parent;
    let mut is_any_tile_loaded = false;
    let mut is_done_loading = true;

    for tile_imagery in tile.data.imagery.iter_mut() {
        match tile_imagery.state {
            ImageryState::Ready => {
                is_upsampled_only = false;
                continue;
            }
            ImageryState::Unloaded | ImageryState::Transitioning => {
                tile_imagery.state =
                    imagery_layers.process_imagery(tile_imagery.layer, &tile.key, &tile.rectangle);
            }
            ImageryState::Failed => {}
        }

        let this_tile_done_loading = tile_imagery.is_done();
        is_done_loading = is_done_loading && this_tile_done_loading;
        is_any_tile_loaded = is_any_tile_loaded || this_tile_done_loading;
        is_upsampled_only = is_upsampled_only && tile_imagery.state == ImageryState::Failed;
    }

    tile.upsampled_from_parent = is_upsampled_only;

    // Imagery that is neither loaded nor settled would leave holes.
    tile.renderable = tile.renderable && (is_any_tile_loaded || is_done_loading);

    is_done_loading
}

/// Applies the outcomes of finished jobs. Outcomes from before the last
/// invalidation, or for tiles that have moved on, are dropped.
pub(crate) fn process_job_outcomes(storage: &mut QuadtreeTileStorage, context: &mut TileLoadContext<'_>) {
    context.jobs.collect();

    let mut requests = vec![];
    while let Some(outcome) = context.jobs.take_next::<RequestTileGeometryJob>() {
        requests.push(outcome);
    }
    let mut upsamples = vec![];
    while let Some(outcome) = context.jobs.take_next::<UpsampleJob>() {
        upsamples.push(outcome);
    }
    let mut meshes = vec![];
    while let Some(outcome) = context.jobs.take_next::<CreateTerrainMeshJob>() {
        meshes.push(outcome);
    }

    for outcome in requests {
        if outcome.epoch != context.epoch {
            continue;
        }
        let key = outcome.key;
        let Some(tile) = storage.get_mut(&key) else {
            continue;
        };
        if tile.data.terrain_state != TerrainState::Receiving {
            continue;
        }
        match outcome.result {
            Ok(terrain_data) => {
                tile.data.terrain_data = Some(terrain_data);
                tile.data.set_terrain_state(TerrainState::Received);
            }
            Err(TerrainRequestError::Cancelled) => {
                debug!("Terrain request for tile {} was cancelled", key);
                tile.data.set_terrain_state(TerrainState::Unloaded);
            }
            Err(TerrainRequestError::Failed { message }) => {
                warn!("Failed to obtain terrain tile {}: {}", key, message);
                let error = TileProviderError {
                    key,
                    message,
                    times_retried: tile.data.times_retried,
                };
                if context.terrain_provider.on_request_error(&error) {
                    // A deferred retry is made again on a later frame.
                    tile.data.times_retried += 1;
                    tile.data.set_terrain_state(TerrainState::Unloaded);
                    request_tile_geometry(storage, key, context);
                } else {
                    tile.data.set_terrain_state(TerrainState::Failed);
                }
            }
        }
    }

    for outcome in upsamples {
        if outcome.epoch != context.epoch {
            continue;
        }
        let Some(tile) = storage.get_mut(&outcome.key) else {
            continue;
        };
        if tile.data.terrain_state != TerrainState::Receiving {
            continue;
        }
        match outcome.result {
            Ok(terrain_data) => {
                tile.data.terrain_data = Some(terrain_data);
                tile.data.set_terrain_state(TerrainState::Received);
            }
            Err(e) => {
                warn!("Failed to upsample terrain for tile {}: {}", outcome.key, e);
                tile.data.set_terrain_state(TerrainState::Failed);
            }
        }
    }

    for outcome in meshes {
        if outcome.epoch != context.epoch {
            continue;
        }
        let Some(tile) = storage.get_mut(&outcome.key) else {
            continue;
        };
        if tile.data.terrain_state != TerrainState::Transforming {
            continue;
        }
        match outcome.result {
            Ok(mesh) => {
                tile.data.mesh = Some(Arc::new(mesh));
                tile.data.set_terrain_state(TerrainState::Transformed);
            }
            Err(e) => {
                warn!("Failed to create terrain mesh for tile {}: {}", outcome.key, e);
                tile.data.set_terrain_state(TerrainState::Failed);
            }
        }
    }
}
