use std::cmp::Ordering;
use std::mem;
use std::time::Duration;

use bevy::log::debug;
use bevy::prelude::Resource;
use quadglobe_scene::{Cartographic, EllipsoidalOccluder, TileKey};

use crate::config::{GlobeOptions, QuadtreePrimitiveOptions};
use crate::frame_state::FrameState;
use crate::geometry_sink::TileGeometrySink;
use crate::globe_surface_tile_provider::{GlobeSurfaceTileProvider, TileVisibility};
use crate::imagery::{ImageryLayer, ImageryLayerId};
use crate::quadtree_primitive_debug::QuadtreePrimitiveDebug;
use crate::quadtree_tile::{QuadtreeTile, QuadtreeTileLoadState};
use crate::quadtree_tile_storage::QuadtreeTileStorage;
use crate::terrain_provider::TerrainProvider;
use crate::tile_replacement_queue::TileReplacementQueue;
use crate::tile_selection_result::TileSelectionResult;
use crate::traversal_details::{Quadrant, TraversalDetails, TraversalQuadDetails};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueType {
    /// Tiles blocking refinement.
    High,
    /// Tiles being rendered.
    Medium,
    /// Ancestors and culled tiles worth having.
    Low,
}

/// Children visit orders, nearest quadrant first, indexed like
/// [`Quadrant::ALL`].
const NEAR_TO_FAR_FROM_SOUTHWEST: [usize; 4] = [0, 1, 2, 3];
const NEAR_TO_FAR_FROM_NORTHWEST: [usize; 4] = [2, 0, 3, 1];
const NEAR_TO_FAR_FROM_SOUTHEAST: [usize; 4] = [1, 0, 3, 2];
const NEAR_TO_FAR_FROM_NORTHEAST: [usize; 4] = [3, 2, 1, 0];

/// Selects the tiles to render each frame and schedules their loading
/// under a time and memory budget.
#[derive(Resource)]
pub struct QuadtreePrimitive {
    options: QuadtreePrimitiveOptions,
    tile_provider: GlobeSurfaceTileProvider,
    storage: QuadtreeTileStorage,
    tile_replacement_queue: TileReplacementQueue,
    occluder: EllipsoidalOccluder,
    tile_load_queue_high: Vec<TileKey>,
    tile_load_queue_medium: Vec<TileKey>,
    tile_load_queue_low: Vec<TileKey>,
    tiles_to_render: Vec<TileKey>,
    tiles_invalidated: bool,
    last_tile_load_queue_length: usize,
    tile_load_progress: Option<usize>,
    last_selection_frame_number: Option<u64>,
    camera_position_cartographic: Option<Cartographic>,
    camera_reference_frame_origin_cartographic: Option<Cartographic>,
    pub debug: QuadtreePrimitiveDebug,
}

impl QuadtreePrimitive {
    pub fn new(options: &GlobeOptions, terrain_provider: Box<dyn TerrainProvider>) -> Self {
        let tile_provider = GlobeSurfaceTileProvider::new(options.surface.clone(), terrain_provider);
        let storage = QuadtreeTileStorage::new(tile_provider.tiling_scheme().clone());
        let occluder = EllipsoidalOccluder::new(tile_provider.ellipsoid());
        Self {
            options: options.quadtree.clone(),
            tile_provider,
            storage,
            tile_replacement_queue: TileReplacementQueue::new(),
            occluder,
            tile_load_queue_high: vec![],
            tile_load_queue_medium: vec![],
            tile_load_queue_low: vec![],
            tiles_to_render: vec![],
            tiles_invalidated: false,
            last_tile_load_queue_length: 0,
            tile_load_progress: None,
            last_selection_frame_number: None,
            camera_position_cartographic: None,
            camera_reference_frame_origin_cartographic: None,
            debug: QuadtreePrimitiveDebug::default(),
        }
    }

    pub fn with_geometry_sink(mut self, geometry_sink: Box<dyn TileGeometrySink>) -> Self {
        self.tile_provider = self.tile_provider.with_geometry_sink(geometry_sink);
        self
    }

    pub fn options(&self) -> &QuadtreePrimitiveOptions {
        &self.options
    }

    pub fn tile_provider(&self) -> &GlobeSurfaceTileProvider {
        &self.tile_provider
    }

    pub fn storage(&self) -> &QuadtreeTileStorage {
        &self.storage
    }

    pub fn tile(&self, key: &TileKey) -> Option<&QuadtreeTile> {
        self.storage.get(key)
    }

    pub fn tile_replacement_queue(&self) -> &TileReplacementQueue {
        &self.tile_replacement_queue
    }

    /// Tiles selected by the last [`QuadtreePrimitive::render`].
    pub fn tiles_to_render(&self) -> &[TileKey] {
        &self.tiles_to_render
    }

    pub fn last_selection_frame_number(&self) -> Option<u64> {
        self.last_selection_frame_number
    }

    pub fn last_tile_load_queue_length(&self) -> usize {
        self.last_tile_load_queue_length
    }

    /// The load queue length, if it changed during the last frame.
    pub fn take_tile_load_progress(&mut self) -> Option<usize> {
        self.tile_load_progress.take()
    }

    /// Discards every tile at the start of the next frame.
    pub fn invalidate_all_tiles(&mut self) {
        self.tiles_invalidated = true;
    }

    pub fn set_terrain_provider(&mut self, terrain_provider: Box<dyn TerrainProvider>) {
        self.tile_provider.set_terrain_provider(terrain_provider);
        self.storage
            .set_tiling_scheme(self.tile_provider.tiling_scheme().clone());
        self.occluder = EllipsoidalOccluder::new(self.tile_provider.ellipsoid());
        self.invalidate_all_tiles();
    }

    /// Adds a layer on top of the others. Loaded tiles pick it up and go
    /// back to loading; tiles not shown last frame wait for it before they
    /// are drawn again.
    pub fn add_imagery_layer(&mut self, layer: Box<dyn ImageryLayer>) -> ImageryLayerId {
        let id = self.tile_provider.imagery_layers_mut().add(layer);
        let last_selection_frame_number = self.last_selection_frame_number;
        let loaded: Vec<TileKey> = self.loaded_tiles();
        for key in loaded {
            let Some(tile) = self.storage.get_mut(&key) else {
                continue;
            };
            if !self
                .tile_provider
                .imagery_layers()
                .create_tile_imagery_skeletons_for_layer(id, tile)
            {
                continue;
            }
            tile.state = QuadtreeTileLoadState::Loading;
            if tile.key.level != 0 && !tile.was_rendered_in_frame(last_selection_frame_number) {
                tile.renderable = false;
            }
        }
        id
    }

    pub fn remove_imagery_layer(&mut self, id: ImageryLayerId) -> Option<Box<dyn ImageryLayer>> {
        let layer = self.tile_provider.imagery_layers_mut().remove(id)?;
        for key in self.loaded_tiles() {
            if let Some(tile) = self.storage.get_mut(&key) {
                tile.data.imagery.retain(|imagery| imagery.layer != id);
            }
        }
        Some(layer)
    }

    fn loaded_tiles(&self) -> Vec<TileKey> {
        self.tile_replacement_queue
            .iter(&self.storage)
            .filter(|key| {
                self.storage
                    .get(key)
                    .map_or(false, |tile| tile.state != QuadtreeTileLoadState::Start)
            })
            .collect()
    }

    /// Calls `f` for every tile that has started loading, most recently
    /// used first.
    pub fn for_each_loaded_tile(&self, mut f: impl FnMut(&QuadtreeTile)) {
        for key in self.tile_replacement_queue.iter(&self.storage) {
            if let Some(tile) = self.storage.get(&key) {
                if tile.state != QuadtreeTileLoadState::Start {
                    f(tile);
                }
            }
        }
    }

    pub fn for_each_rendered_tile(&self, mut f: impl FnMut(&QuadtreeTile)) {
        for key in &self.tiles_to_render {
            if let Some(tile) = self.storage.get(key) {
                f(tile);
            }
        }
    }

    /// One whole frame.
    pub fn update(&mut self, frame_state: &FrameState) {
        self.begin_frame();
        self.render(frame_state);
        self.end_frame(frame_state);
    }

    pub fn begin_frame(&mut self) {
        if self.tiles_invalidated {
            self.free_all_tiles();
            self.tiles_invalidated = false;
        }

        self.tile_provider.process_job_outcomes(&mut self.storage);

        self.clear_tile_load_queue();
        if self.debug.suspend_lod_update {
            return;
        }
        self.tile_replacement_queue.mark_start_of_render_frame();
    }

    pub fn render(&mut self, frame_state: &FrameState) {
        self.tile_provider.begin_update();
        self.select_tiles_for_rendering(frame_state);
        for key in &self.tiles_to_render {
            if let Some(tile) = self.storage.get(key) {
                self.tile_provider.show_tile_this_frame(tile);
            }
        }
    }

    pub fn end_frame(&mut self, frame_state: &FrameState) {
        self.process_tile_load_queue(frame_state);
        self.update_tile_load_progress();
    }

    fn free_all_tiles(&mut self) {
        self.tile_replacement_queue.clear();
        self.clear_tile_load_queue();
        self.tiles_to_render.clear();
        for data in self.storage.clear() {
            self.tile_provider.free_resources(data);
        }
        self.tile_provider.discard_pending_jobs();
        self.last_tile_load_queue_length = 0;
        self.tile_load_progress = Some(0);
    }

    fn clear_tile_load_queue(&mut self) {
        self.tile_load_queue_high.clear();
        self.tile_load_queue_medium.clear();
        self.tile_load_queue_low.clear();
        self.debug.reset();
    }

    fn queue_mut(&mut self, queue_type: QueueType) -> &mut Vec<TileKey> {
        match queue_type {
            QueueType::High => &mut self.tile_load_queue_high,
            QueueType::Medium => &mut self.tile_load_queue_medium,
            QueueType::Low => &mut self.tile_load_queue_low,
        }
    }

    fn queue_tile_load(&mut self, queue_type: QueueType, key: TileKey, frame_state: &FrameState) {
        let Some(tile) = self.storage.get(&key) else {
            return;
        };
        if !tile.needs_loading() {
            return;
        }
        let load_priority = self.tile_provider.compute_tile_load_priority(tile, frame_state);
        if let Some(tile) = self.storage.get_mut(&key) {
            tile.load_priority = load_priority;
        }
        self.queue_mut(queue_type).push(key);
    }

    fn select_tiles_for_rendering(&mut self, frame_state: &FrameState) {
        if self.debug.suspend_lod_update {
            return;
        }
        self.tiles_to_render.clear();

        if self.storage.root_len() == 0 {
            self.storage.create_level_zero_tiles();
        }

        let camera = &frame_state.camera;
        self.occluder.set_camera_position(camera.position_wc);
        self.camera_position_cartographic = Some(camera.position_cartographic);
        self.camera_reference_frame_origin_cartographic = self
            .tile_provider
            .ellipsoid()
            .cartesian_to_cartographic(camera.reference_frame_origin);

        // Nearest roots first.
        let position = camera.position_cartographic;
        let mut roots: Vec<(f64, TileKey)> = self
            .storage
            .roots()
            .iter()
            .filter_map(|key| self.storage.get(key))
            .map(|tile| {
                let center = tile.rectangle.center();
                let longitude = center.longitude - position.longitude;
                let latitude = center.latitude - position.latitude;
                (longitude * longitude + latitude * latitude, tile.key)
            })
            .collect();
        roots.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        for (_, key) in roots {
            self.tile_replacement_queue
                .mark_tile_rendered(&mut self.storage, key);
            let renderable = self.storage.get(&key).map_or(false, |tile| tile.renderable);
            if renderable {
                self.visit_if_visible(key, frame_state, false);
            } else {
                self.queue_tile_load(QueueType::High, key, frame_state);
                self.debug.tiles_waiting_for_children += 1;
            }
        }

        self.last_selection_frame_number = Some(frame_state.frame_number);
    }

    fn visit_if_visible(
        &mut self,
        key: TileKey,
        frame_state: &FrameState,
        ancestor_meets_sse: bool,
    ) -> TraversalDetails {
        let visibility = self.tile_provider.compute_tile_visibility(
            &mut self.storage,
            key,
            frame_state,
            &self.occluder,
        );
        if visibility != TileVisibility::None {
            return self.visit_tile(key, frame_state, ancestor_meets_sse);
        }

        self.debug.tiles_culled += 1;
        self.tile_replacement_queue
            .mark_tile_rendered(&mut self.storage, key);

        let Some(tile) = self.storage.get(&key) else {
            return TraversalDetails::default();
        };
        let selection_result = if self.contains_needed_position(tile) {
            // Only the terrain is needed, for the camera's height.
            if tile.data.geometry.is_none() {
                self.queue_tile_load(QueueType::Medium, key, frame_state);
            }
            TileSelectionResult::CulledButNeeded
        } else if self.options.preload_siblings || key.level == 0 {
            self.queue_tile_load(QueueType::Low, key, frame_state);
            TileSelectionResult::Culled
        } else {
            TileSelectionResult::Culled
        };

        if let Some(tile) = self.storage.get_mut(&key) {
            tile.last_selection_result = selection_result;
            tile.last_selection_result_frame = Some(frame_state.frame_number);
            tile.drawn_for_descendants = false;
        }
        TraversalDetails::default()
    }

    fn contains_needed_position(&self, tile: &QuadtreeTile) -> bool {
        [
            self.camera_position_cartographic,
            self.camera_reference_frame_origin_cartographic,
        ]
        .iter()
        .flatten()
        .any(|position| tile.rectangle.contains(position))
    }

    fn screen_space_error(&self, tile: &QuadtreeTile, frame_state: &FrameState) -> f64 {
        let max_geometric_error = self
            .tile_provider
            .get_level_maximum_geometric_error(tile.key.level);
        let sse_denominator = frame_state.camera.frustum.sse_denominator();
        let error = (max_geometric_error * frame_state.drawing_buffer_height)
            / (tile.distance * sse_denominator);
        error / frame_state.pixel_ratio
    }

    fn visit_tile(
        &mut self,
        key: TileKey,
        frame_state: &FrameState,
        mut ancestor_meets_sse: bool,
    ) -> TraversalDetails {
        self.debug.tiles_visited += 1;
        self.tile_replacement_queue
            .mark_tile_rendered(&mut self.storage, key);
        self.debug.max_depth_visited = self.debug.max_depth_visited.max(key.level);

        let Some(tile) = self.storage.get(&key) else {
            return TraversalDetails::default();
        };
        let meets_sse =
            self.screen_space_error(tile, frame_state) < self.options.maximum_screen_space_error;
        let last_frame_selection_result =
            tile.selection_result_in_frame(self.last_selection_frame_number);
        let rendered_last_frame = tile.was_rendered_in_frame(self.last_selection_frame_number);

        if meets_sse || ancestor_meets_sse {
            // Drawing this tile is fine unless it would take away detail that
            // was on screen last frame.
            let original_result = last_frame_selection_result.original_result();
            let mut renderable = original_result == TileSelectionResult::Rendered
                || original_result == TileSelectionResult::Culled
                || last_frame_selection_result == TileSelectionResult::None
                || tile.state == QuadtreeTileLoadState::Done;
            if !renderable {
                renderable = self.tile_provider.can_render_without_losing_detail(
                    &self.storage,
                    key,
                    self.last_selection_frame_number,
                );
            }

            if renderable {
                if meets_sse {
                    self.queue_tile_load(QueueType::Medium, key, frame_state);
                }
                return self.render_tile(key, frame_state, rendered_last_frame);
            }

            // Keep drawing the descendants seen last frame instead.
            ancestor_meets_sse = true;
            if meets_sse {
                self.queue_tile_load(QueueType::High, key, frame_state);
            }
        }

        let can_refine = self
            .storage
            .get(&key)
            .map_or(false, |tile| self.tile_provider.can_refine(tile));
        let children = if can_refine {
            self.storage.subdivide(&key)
        } else {
            None
        };
        let Some(children) = children else {
            // Children availability is unknown until this tile loads.
            let details = self.render_tile(key, frame_state, rendered_last_frame);
            self.queue_tile_load(QueueType::High, key, frame_state);
            return details;
        };

        let all_are_upsampled = children.iter().all(|child| {
            self.storage
                .get(child)
                .map_or(false, |tile| tile.upsampled_from_parent)
        });
        if all_are_upsampled {
            // The children add nothing over this tile.
            let details = self.render_tile(key, frame_state, rendered_last_frame);
            self.queue_tile_load(QueueType::Medium, key, frame_state);
            for child in children {
                self.tile_replacement_queue
                    .mark_tile_rendered(&mut self.storage, child);
            }
            return details;
        }

        if let Some(tile) = self.storage.get_mut(&key) {
            tile.last_selection_result_frame = Some(frame_state.frame_number);
            tile.last_selection_result = TileSelectionResult::Refined;
            tile.drawn_for_descendants = false;
        }

        let first_rendered_descendant_index = self.tiles_to_render.len();
        let load_index_low = self.tile_load_queue_low.len();
        let load_index_medium = self.tile_load_queue_medium.len();
        let load_index_high = self.tile_load_queue_high.len();

        let mut details =
            self.visit_visible_children_near_to_far(children, frame_state, ancestor_meets_sse);

        if first_rendered_descendant_index == self.tiles_to_render.len() {
            // Every child was culled.
            return details;
        }

        let mut queued_for_load = false;
        if !details.all_are_renderable && !details.any_were_rendered_last_frame {
            // Some descendants are not ready and none were drawn last frame:
            // draw this tile in their place and keep loading them.
            self.kick_rendered_descendants(key, first_rendered_descendant_index);
            self.tiles_to_render.truncate(first_rendered_descendant_index);
            self.tiles_to_render.push(key);

            let renderable = self.storage.get(&key).map_or(false, |tile| tile.renderable);
            if let Some(tile) = self.storage.get_mut(&key) {
                tile.last_selection_result = TileSelectionResult::CulledButNeeded;
                tile.drawn_for_descendants = true;
            }

            if !rendered_last_frame
                && details.not_yet_renderable_count > self.options.loading_descendant_limit
            {
                // Too many descendants to wait for: load this tile instead.
                self.tile_load_queue_low.truncate(load_index_low);
                self.tile_load_queue_medium.truncate(load_index_medium);
                self.tile_load_queue_high.truncate(load_index_high);
                self.queue_tile_load(QueueType::Medium, key, frame_state);
                details.not_yet_renderable_count = u32::from(!renderable);
                queued_for_load = true;
            } else {
                self.queue_children_blocking_refinement(children, frame_state);
            }

            details.all_are_renderable = renderable;
            details.any_were_rendered_last_frame = rendered_last_frame;
            self.debug.tiles_waiting_for_children += 1;
        }

        if self.options.preload_ancestors && !queued_for_load {
            self.queue_tile_load(QueueType::Low, key, frame_state);
        }
        details
    }

    /// Adds the tile to the render list and stamps it as rendered.
    fn render_tile(
        &mut self,
        key: TileKey,
        frame_state: &FrameState,
        rendered_last_frame: bool,
    ) -> TraversalDetails {
        self.tiles_to_render.push(key);
        let Some(tile) = self.storage.get_mut(&key) else {
            return TraversalDetails::default();
        };
        tile.last_selection_result_frame = Some(frame_state.frame_number);
        tile.last_selection_result = TileSelectionResult::Rendered;
        tile.drawn_for_descendants = false;
        TraversalDetails::rendered(tile.renderable, rendered_last_frame)
    }

    /// Moves the kicked children that are not ready yet to the high
    /// priority queue.
    fn queue_children_blocking_refinement(&mut self, children: [TileKey; 4], frame_state: &FrameState) {
        let frame = Some(frame_state.frame_number);
        for child in children {
            let blocking = self.storage.get(&child).map_or(false, |tile| {
                tile.selection_result_in_frame(frame).was_kicked()
                    && !tile.renderable
                    && tile.needs_loading()
            });
            if !blocking {
                continue;
            }
            for queue in [
                &mut self.tile_load_queue_high,
                &mut self.tile_load_queue_medium,
                &mut self.tile_load_queue_low,
            ] {
                queue.retain(|queued| *queued != child);
            }
            self.queue_tile_load(QueueType::High, child, frame_state);
        }
    }

    /// Marks the tiles rendered below `key`, and their ancestors up to
    /// `key`, as kicked. A tile drawn for its own descendants counts as
    /// rendered.
    fn kick_rendered_descendants(&mut self, key: TileKey, first_rendered_descendant_index: usize) {
        let rendered = self
            .tiles_to_render
            .get(first_rendered_descendant_index..)
            .unwrap_or_default()
            .to_vec();
        for descendant in rendered {
            let mut work_tile = Some(descendant);
            while let Some(work_key) = work_tile {
                if work_key == key {
                    break;
                }
                let Some(tile) = self.storage.get_mut(&work_key) else {
                    break;
                };
                if tile.last_selection_result.was_kicked() {
                    break;
                }
                tile.last_selection_result = if tile.drawn_for_descendants {
                    tile.drawn_for_descendants = false;
                    TileSelectionResult::RenderedAndKicked
                } else {
                    tile.last_selection_result.kick()
                };
                work_tile = tile.parent;
            }
        }
    }

    fn visit_visible_children_near_to_far(
        &mut self,
        children: [TileKey; 4],
        frame_state: &FrameState,
        ancestor_meets_sse: bool,
    ) -> TraversalDetails {
        let [southwest, ..] = children;
        let Some(southwest_rectangle) = self.storage.get(&southwest).map(|tile| tile.rectangle) else {
            return TraversalDetails::default();
        };
        let camera_position = frame_state.camera.position_cartographic;
        let order = if camera_position.longitude < southwest_rectangle.east {
            if camera_position.latitude < southwest_rectangle.north {
                NEAR_TO_FAR_FROM_SOUTHWEST
            } else {
                NEAR_TO_FAR_FROM_NORTHWEST
            }
        } else if camera_position.latitude < southwest_rectangle.north {
            NEAR_TO_FAR_FROM_SOUTHEAST
        } else {
            NEAR_TO_FAR_FROM_NORTHEAST
        };

        let mut quad_details = TraversalQuadDetails::default();
        for index in order {
            let (Some(&quadrant), Some(&child)) = (Quadrant::ALL.get(index), children.get(index)) else {
                continue;
            };
            *quad_details.get_mut(quadrant) =
                self.visit_if_visible(child, frame_state, ancestor_meets_sse);
        }
        quad_details.combine()
    }

    fn process_tile_load_queue(&mut self, frame_state: &FrameState) {
        if self.tile_load_queue_high.is_empty()
            && self.tile_load_queue_medium.is_empty()
            && self.tile_load_queue_low.is_empty()
        {
            return;
        }

        // Drop tiles unused this frame beyond the number allowed to stay.
        let freed = self
            .tile_replacement_queue
            .trim_tiles(&mut self.storage, self.options.tile_cache_size);
        for data in freed {
            self.tile_provider.free_resources(data);
        }

        let end_time = instant::Instant::now()
            + Duration::from_secs_f64(self.options.load_queue_time_slice_ms.max(0.0) / 1000.0);
        let mut did_some_loading = false;
        for queue_type in [QueueType::High, QueueType::Medium, QueueType::Low] {
            did_some_loading =
                self.process_single_priority_load_queue(queue_type, frame_state, end_time, did_some_loading);
        }
    }

    fn process_single_priority_load_queue(
        &mut self,
        queue_type: QueueType,
        frame_state: &FrameState,
        end_time: instant::Instant,
        mut did_some_loading: bool,
    ) -> bool {
        let mut queue = mem::take(self.queue_mut(queue_type));
        queue.sort_by(|a, b| {
            let priority = |key: &TileKey| self.storage.get(key).map_or(0.0, |tile| tile.load_priority);
            priority(a).partial_cmp(&priority(b)).unwrap_or(Ordering::Equal)
        });

        for &key in &queue {
            if did_some_loading && instant::Instant::now() >= end_time {
                break;
            }
            self.tile_replacement_queue
                .mark_tile_rendered(&mut self.storage, key);
            self.tile_provider
                .load_tile(&mut self.storage, key, frame_state, &self.occluder);
            did_some_loading = true;
        }

        *self.queue_mut(queue_type) = queue;
        did_some_loading
    }

    fn update_tile_load_progress(&mut self) {
        let current_load_queue_length = self.tile_load_queue_high.len()
            + self.tile_load_queue_medium.len()
            + self.tile_load_queue_low.len();
        if current_load_queue_length != self.last_tile_load_queue_length {
            debug!("{} tiles waiting to load", current_load_queue_length);
            self.tile_load_progress = Some(current_load_queue_length);
            self.last_tile_load_queue_length = current_load_queue_length;
        }

        if self.debug.enable_debug_output && !self.debug.suspend_lod_update {
            self.debug.max_depth = self
                .tiles_to_render
                .iter()
                .map(|key| key.level)
                .max()
                .unwrap_or_default();
            self.debug.tiles_rendered = self.tiles_to_render.len() as u32;
            self.debug.log_if_changed();
        }
    }
}
