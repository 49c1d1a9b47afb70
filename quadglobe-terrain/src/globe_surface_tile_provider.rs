use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use bevy::math::DVec3;
use bevy::utils::HashMap;
use quadglobe_jobs::JobRunner;
use quadglobe_scene::math::EPSILON5;
use quadglobe_scene::terrain::IndicesAndEdgesCache;
use quadglobe_scene::{
    Cartographic, Ellipsoid, EllipsoidalOccluder, Intersect, Rectangle, TileBoundingRegion, TileKey,
    TilingScheme,
};

use crate::config::SurfaceTileProviderOptions;
use crate::frame_state::FrameState;
use crate::geometry_sink::{CountingGeometrySink, TileGeometrySink};
use crate::globe_surface_tile::{
    process_job_outcomes, process_state_machine, GlobeSurfaceTile, TerrainState, TileLoadContext,
};
use crate::imagery::{ImageryLayerCollection, ImageryLayerId, ImageryState};
use crate::quadtree_tile::QuadtreeTile;
use crate::quadtree_tile_storage::QuadtreeTileStorage;
use crate::terrain_provider::TerrainProvider;
use crate::tile_selection_result::TileSelectionResult;

/// Distance reported for tiles whose position is not known yet.
pub const UNKNOWN_TILE_DISTANCE: f64 = 9_999_999_999.0;

/// Deepest level the quadtree refines to. Tile coordinates are `u32`.
pub const MAXIMUM_TILE_LEVEL: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileVisibility {
    None,
    Partial,
    Full,
}

/// Decides what a tile needs, how far away and how visible it is, and
/// drives its loading.
pub struct GlobeSurfaceTileProvider {
    options: SurfaceTileProviderOptions,
    terrain_provider: Box<dyn TerrainProvider>,
    tiling_scheme: Arc<dyn TilingScheme>,
    imagery_layers: ImageryLayerCollection,
    jobs: JobRunner,
    geometry_sink: Box<dyn TileGeometrySink>,
    indices_and_edges_cache: Arc<Mutex<IndicesAndEdgesCache>>,
    /// Bumped whenever all tiles are discarded; outcomes of older jobs are
    /// ignored.
    epoch: u64,
    tiles_to_render_by_texture_count: Vec<Vec<TileKey>>,
    has_loaded_tiles_this_frame: bool,
    has_fill_tiles_this_frame: bool,
}

impl GlobeSurfaceTileProvider {
    pub fn new(options: SurfaceTileProviderOptions, terrain_provider: Box<dyn TerrainProvider>) -> Self {
        let tiling_scheme = terrain_provider.tiling_scheme();
        Self {
            jobs: JobRunner::new(options.job_mode),
            options,
            terrain_provider,
            tiling_scheme,
            imagery_layers: ImageryLayerCollection::new(),
            geometry_sink: Box::<CountingGeometrySink>::default(),
            indices_and_edges_cache: Arc::new(Mutex::new(IndicesAndEdgesCache::new())),
            epoch: 0,
            tiles_to_render_by_texture_count: vec![],
            has_loaded_tiles_this_frame: false,
            has_fill_tiles_this_frame: false,
        }
    }

    pub fn with_geometry_sink(mut self, geometry_sink: Box<dyn TileGeometrySink>) -> Self {
        self.geometry_sink = geometry_sink;
        self
    }

    pub fn options(&self) -> &SurfaceTileProviderOptions {
        &self.options
    }

    pub fn tiling_scheme(&self) -> &Arc<dyn TilingScheme> {
        &self.tiling_scheme
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        self.tiling_scheme.ellipsoid()
    }

    pub fn terrain_provider(&self) -> &dyn TerrainProvider {
        self.terrain_provider.as_ref()
    }

    /// Callers must discard every tile alongside.
    pub fn set_terrain_provider(&mut self, terrain_provider: Box<dyn TerrainProvider>) {
        self.tiling_scheme = terrain_provider.tiling_scheme();
        self.terrain_provider = terrain_provider;
        self.discard_pending_jobs();
    }

    pub fn imagery_layers(&self) -> &ImageryLayerCollection {
        &self.imagery_layers
    }

    pub fn imagery_layers_mut(&mut self) -> &mut ImageryLayerCollection {
        &mut self.imagery_layers
    }

    pub fn indices_and_edges_cache(&self) -> &Arc<Mutex<IndicesAndEdgesCache>> {
        &self.indices_and_edges_cache
    }

    pub fn jobs(&self) -> &JobRunner {
        &self.jobs
    }

    pub fn tiles_to_render_by_texture_count(&self) -> &[Vec<TileKey>] {
        &self.tiles_to_render_by_texture_count
    }

    pub fn has_loaded_tiles_this_frame(&self) -> bool {
        self.has_loaded_tiles_this_frame
    }

    pub fn has_fill_tiles_this_frame(&self) -> bool {
        self.has_fill_tiles_this_frame
    }

    pub fn get_level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.terrain_provider.get_level_maximum_geometric_error(level)
    }

    fn load_context(&mut self) -> TileLoadContext<'_> {
        TileLoadContext {
            terrain_provider: self.terrain_provider.as_ref(),
            tiling_scheme: &self.tiling_scheme,
            imagery_layers: &mut self.imagery_layers,
            jobs: &mut self.jobs,
            geometry_sink: self.geometry_sink.as_mut(),
            indices_and_edges_cache: &self.indices_and_edges_cache,
            options: &self.options,
            epoch: self.epoch,
        }
    }

    /// Applies the outcomes of jobs finished since the last call.
    pub fn process_job_outcomes(&mut self, storage: &mut QuadtreeTileStorage) {
        process_job_outcomes(storage, &mut self.load_context());
    }

    /// Forgets every job in flight. Their outcomes will be ignored.
    pub fn discard_pending_jobs(&mut self) {
        self.jobs.cancel_all();
        self.epoch += 1;
    }

    pub fn free_resources(&mut self, data: GlobeSurfaceTile) {
        if let Some(geometry) = data.geometry {
            self.geometry_sink.destroy_geometry(geometry);
        }
    }

    pub fn begin_update(&mut self) {
        for tiles in self.tiles_to_render_by_texture_count.iter_mut() {
            tiles.clear();
        }
        self.has_loaded_tiles_this_frame = false;
        self.has_fill_tiles_this_frame = false;
    }

    /// Adds a selected tile to the bucket of its number of ready imagery
    /// layers.
    pub fn show_tile_this_frame(&mut self, tile: &QuadtreeTile) {
        let ready_texture_count = tile
            .data
            .imagery
            .iter()
            .filter(|imagery| {
                imagery.state == ImageryState::Ready
                    && self
                        .imagery_layers
                        .get(imagery.layer)
                        .map_or(false, |layer| layer.alpha() > 0.0)
            })
            .count();

        if self.tiles_to_render_by_texture_count.len() <= ready_texture_count {
            self.tiles_to_render_by_texture_count
                .resize_with(ready_texture_count + 1, Vec::new);
        }
        if let Some(bucket) = self.tiles_to_render_by_texture_count.get_mut(ready_texture_count) {
            bucket.push(tile.key);
        }

        if tile.data.geometry.is_some() {
            self.has_loaded_tiles_this_frame = true;
        } else {
            self.has_fill_tiles_this_frame = true;
        }
    }

    /// Runs the tile's state machine once. Terrain alone is loaded while
    /// the tile's bounds are borrowed from an ancestor or the tile is only
    /// needed for the camera's height.
    pub fn load_tile(
        &mut self,
        storage: &mut QuadtreeTileStorage,
        key: TileKey,
        frame_state: &FrameState,
        occluder: &EllipsoidalOccluder,
    ) {
        let Some(tile) = storage.get(&key) else {
            return;
        };
        let terrain_only = tile.data.bounding_volume_source_tile != Some(key)
            || tile.needs_terrain_only();
        let terrain_state_before = tile.data.terrain_state();

        process_state_machine(storage, key, &mut self.load_context(), terrain_only);

        let Some(tile) = storage.get(&key) else {
            return;
        };
        if terrain_only && terrain_state_before != tile.data.terrain_state() {
            // Bounds are refreshed by the visibility check; once they are
            // the tile's own and it is visible, imagery can load too.
            let visible =
                self.compute_tile_visibility(storage, key, frame_state, occluder) != TileVisibility::None;
            let accurate = storage
                .get(&key)
                .map_or(false, |tile| tile.data.bounding_volume_source_tile == Some(key));
            if visible && accurate {
                process_state_machine(storage, key, &mut self.load_context(), false);
            }
        }
    }

    pub fn compute_tile_visibility(
        &self,
        storage: &mut QuadtreeTileStorage,
        key: TileKey,
        frame_state: &FrameState,
        occluder: &EllipsoidalOccluder,
    ) -> TileVisibility {
        let distance = self.compute_distance_to_tile(storage, key, frame_state, occluder);
        let Some(tile) = storage.get_mut(&key) else {
            return TileVisibility::None;
        };
        tile.distance = distance;

        let rectangle = tile.rectangle;
        let surface_tile = &mut tile.data;
        if surface_tile.bounding_volume_source_tile.is_none() {
            return TileVisibility::Partial;
        }
        let Some(region) = surface_tile.tile_bounding_region.as_ref() else {
            return TileVisibility::Partial;
        };

        surface_tile.clipped_by_boundaries = false;
        let limit = clip_rectangle_antimeridian(&rectangle, &self.options.cartographic_limit_rectangle);
        let Some(area_limit_intersection) = limit.simple_intersection(&rectangle) else {
            return TileVisibility::None;
        };
        if area_limit_intersection != rectangle {
            surface_tile.clipped_by_boundaries = true;
        }

        let intersection = match (region.bounding_volume(), region.bounding_sphere()) {
            (Some(obb), _) => frame_state.culling_volume.compute_visibility(obb),
            (None, Some(sphere)) => frame_state.culling_volume.compute_visibility(sphere),
            (None, None) => return TileVisibility::Partial,
        };
        let visibility = match intersection {
            Intersect::Outside => return TileVisibility::None,
            Intersect::Intersecting => TileVisibility::Partial,
            Intersect::Inside => TileVisibility::Full,
        };

        let Some(occludee_point_in_scaled_space) = surface_tile.occludee_point_in_scaled_space else {
            return visibility;
        };
        if occluder.is_scaled_space_point_visible_possibly_under_ellipsoid(
            occludee_point_in_scaled_space,
            Some(region.minimum_height),
        ) {
            visibility
        } else {
            TileVisibility::None
        }
    }

    /// Distance from the camera to the tile's bounds. Bounds borrowed from
    /// an ancestor are collapsed to the ancestor height farther from the
    /// camera, so the estimate errs on the far side.
    pub fn compute_distance_to_tile(
        &self,
        storage: &mut QuadtreeTileStorage,
        key: TileKey,
        frame_state: &FrameState,
        occluder: &EllipsoidalOccluder,
    ) -> f64 {
        update_tile_bounding_region(storage, key, occluder, &self.options);
        let Some(tile) = storage.get_mut(&key) else {
            return UNKNOWN_TILE_DISTANCE;
        };
        let Some(source) = tile.data.bounding_volume_source_tile else {
            return UNKNOWN_TILE_DISTANCE;
        };
        let Some(region) = tile.data.tile_bounding_region.as_mut() else {
            return UNKNOWN_TILE_DISTANCE;
        };

        let camera = &frame_state.camera;
        let minimum_height = region.minimum_height;
        let maximum_height = region.maximum_height;
        if source != key {
            let camera_height = camera.position_cartographic.height;
            let distance_to_min = (camera_height - minimum_height).abs();
            let distance_to_max = (camera_height - maximum_height).abs();
            let farther = if distance_to_min > distance_to_max {
                minimum_height
            } else {
                maximum_height
            };
            region.minimum_height = farther;
            region.maximum_height = farther;
        }

        let result = region.distance_to_camera(camera.position_wc, &camera.position_cartographic);

        region.minimum_height = minimum_height;
        region.maximum_height = maximum_height;
        result
    }

    /// Lower loads first: tiles near the view direction and close to the
    /// camera.
    pub fn compute_tile_load_priority(&self, tile: &QuadtreeTile, frame_state: &FrameState) -> f64 {
        let Some(obb) = tile
            .data
            .tile_bounding_region
            .as_ref()
            .and_then(TileBoundingRegion::bounding_volume)
        else {
            return 0.0;
        };
        let camera = &frame_state.camera;
        let tile_direction = obb.center - camera.position_wc;
        let magnitude = tile_direction.length();
        if magnitude < EPSILON5 {
            return 0.0;
        }
        (1.0 - (tile_direction / magnitude).dot(camera.direction_wc)) * tile.distance
    }

    pub fn can_refine(&self, tile: &QuadtreeTile) -> bool {
        if tile.key.level >= MAXIMUM_TILE_LEVEL {
            return false;
        }
        if tile.data.terrain_data.is_some() {
            return true;
        }
        let child = TileKey::new(tile.key.x * 2, tile.key.y * 2, tile.key.level + 1);
        self.terrain_provider.get_tile_data_available(&child).is_some()
    }

    /// Whether drawing this tile instead of the descendants drawn last frame
    /// keeps at least the detail they showed.
    pub fn can_render_without_losing_detail(
        &self,
        storage: &QuadtreeTileStorage,
        key: TileKey,
        last_selection_frame: Option<u64>,
    ) -> bool {
        let Some(tile) = storage.get(&key) else {
            return false;
        };
        let terrain_ready = tile.data.terrain_state() == TerrainState::Ready;

        // A layer is ready on this tile when every one of its imagery records
        // has settled.
        let mut ready_imagery: HashMap<ImageryLayerId, bool> =
            self.imagery_layers.ids().map(|id| (id, true)).collect();
        for imagery in &tile.data.imagery {
            let ready = ready_imagery.entry(imagery.layer).or_insert(true);
            *ready = *ready && imagery.is_done();
        }

        let mut stack: Vec<TileKey> = tile.children().map(Vec::from).unwrap_or_default();
        while let Some(descendant_key) = stack.pop() {
            let Some(descendant) = storage.get(&descendant_key) else {
                continue;
            };
            if descendant.was_rendered_in_frame(last_selection_frame) {
                if !terrain_ready && descendant.data.terrain_state() == TerrainState::Ready {
                    return false;
                }
                for imagery in &descendant.data.imagery {
                    let layer_ready = ready_imagery.get(&imagery.layer).copied().unwrap_or(true);
                    if imagery.is_done() && !layer_ready {
                        return false;
                    }
                }
            } else if descendant.selection_result_in_frame(last_selection_frame)
                == TileSelectionResult::Refined
            {
                if let Some(children) = descendant.children() {
                    stack.extend(children);
                }
            }
        }
        true
    }
}

/// Splits a limit rectangle crossing the antimeridian at +-pi, keeping
/// the half on the tile's side.
pub fn clip_rectangle_antimeridian(tile_rectangle: &Rectangle, limit: &Rectangle) -> Rectangle {
    if limit.west < limit.east {
        return *limit;
    }
    let mut split = *limit;
    if tile_rectangle.center().longitude > 0.0 {
        split.east = PI;
    } else {
        split.west = -PI;
    }
    split
}

/// Points the tile's bounds at the best height information available:
/// its own mesh, its own terrain data, or the nearest ancestor with either.
fn update_tile_bounding_region(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    occluder: &EllipsoidalOccluder,
    options: &SurfaceTileProviderOptions,
) {
    let exaggerate = |height: f64| {
        let relative = options.terrain_exaggeration_relative_height;
        (height - relative) * options.terrain_exaggeration + relative
    };

    let Some(tile) = storage.get(&key) else {
        return;
    };

    // Mesh heights already carry the exaggeration; raw terrain heights do
    // not.
    let mut source = None;
    let mut candidate = Some(tile);
    while let Some(current) = candidate {
        if let Some(mesh) = &current.data.mesh {
            source = Some((current.key, mesh.minimum_height, mesh.maximum_height));
            break;
        }
        if let Some((minimum, maximum)) = current
            .data
            .terrain_data
            .as_ref()
            .and_then(|data| data.height_range())
        {
            source = Some((current.key, exaggerate(minimum), exaggerate(maximum)));
            break;
        }
        candidate = current.parent.and_then(|parent| storage.get(&parent));
    }
    let from_mesh = tile.data.mesh.is_some();

    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    let rectangle = tile.rectangle;
    let ellipsoid = occluder.ellipsoid;
    let surface_tile = &mut tile.data;
    let region = surface_tile
        .tile_bounding_region
        .get_or_insert_with(|| TileBoundingRegion::new(rectangle, 0.0, 0.0, &ellipsoid, false));

    let Some((source_key, minimum_height, maximum_height)) = source else {
        region.minimum_height = f64::NAN;
        region.maximum_height = f64::NAN;
        surface_tile.bounding_volume_source_tile = None;
        surface_tile.bounding_volume_is_from_mesh = false;
        return;
    };

    let old_minimum_height = region.minimum_height;
    let old_maximum_height = region.maximum_height;
    region.minimum_height = minimum_height;
    region.maximum_height = maximum_height;

    if from_mesh {
        if !surface_tile.bounding_volume_is_from_mesh {
            if let Some(mesh) = &surface_tile.mesh {
                region.oriented_bounding_box = Some(mesh.oriented_bounding_box);
                region.bounding_sphere = Some(mesh.bounding_sphere_3d);
                surface_tile.occludee_point_in_scaled_space =
                    mesh.occludee_point_in_scaled_space.or_else(|| {
                        compute_occludee_point(
                            occluder,
                            mesh.oriented_bounding_box.center,
                            &rectangle,
                            minimum_height,
                            maximum_height,
                        )
                    });
            }
        }
    } else {
        let needs_bounds = region.oriented_bounding_box.is_none() || region.bounding_sphere.is_none();
        let height_changed =
            old_minimum_height != minimum_height || old_maximum_height != maximum_height;
        if height_changed || needs_bounds || surface_tile.bounding_volume_is_from_mesh {
            region.compute_bounding_volumes(&ellipsoid);
            surface_tile.occludee_point_in_scaled_space = region.bounding_volume().and_then(|obb| {
                compute_occludee_point(occluder, obb.center, &rectangle, minimum_height, maximum_height)
            });
        }
    }

    surface_tile.bounding_volume_source_tile = Some(source_key);
    surface_tile.bounding_volume_is_from_mesh = from_mesh;
}

fn compute_occludee_point(
    occluder: &EllipsoidalOccluder,
    center: DVec3,
    rectangle: &Rectangle,
    minimum_height: f64,
    maximum_height: f64,
) -> Option<DVec3> {
    let ellipsoid = &occluder.ellipsoid;
    let corner_positions = [
        (rectangle.west, rectangle.south),
        (rectangle.east, rectangle.south),
        (rectangle.west, rectangle.north),
        (rectangle.east, rectangle.north),
    ]
    .map(|(longitude, latitude)| {
        ellipsoid.cartographic_to_cartesian(&Cartographic::new(longitude, latitude, maximum_height))
    });
    occluder.compute_horizon_culling_point_possibly_under_ellipsoid(
        center,
        &corner_positions,
        Some(minimum_height),
    )
}
