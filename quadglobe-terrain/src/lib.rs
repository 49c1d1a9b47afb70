#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::expect_used
)]
//! Quadtree level-of-detail terrain for a globe.
//!
//! [`QuadtreePrimitive`] decides every frame which tiles to draw, and
//! [`GlobeSurfaceTileProvider`] drives each tile from nothing to a finished
//! mesh through jobs that run off the frame.

use bevy::prelude::*;

mod config;
mod create_terrain_mesh_job;
mod ellipsoid_terrain_provider;
mod frame_state;
mod geometry_sink;
mod globe_surface_tile;
mod globe_surface_tile_provider;
mod imagery;
mod quadtree_primitive;
mod quadtree_primitive_debug;
mod quadtree_tile;
mod quadtree_tile_storage;
mod request_tile_geometry_job;
mod terrain_provider;
mod tile_replacement_queue;
mod tile_selection_result;
mod traversal_details;
mod upsample_job;

pub use config::{ConfigError, GlobeOptions, QuadtreePrimitiveOptions, SurfaceTileProviderOptions};
pub use ellipsoid_terrain_provider::EllipsoidTerrainProvider;
pub use frame_state::{Camera, FrameState};
pub use geometry_sink::{CountingGeometrySink, GeometryHandle, GeometryStats, TileGeometrySink};
pub use globe_surface_tile::{GlobeSurfaceTile, TerrainState};
pub use globe_surface_tile_provider::{
    clip_rectangle_antimeridian, GlobeSurfaceTileProvider, TileVisibility,
};
pub use imagery::{
    ImageryLayer, ImageryLayerCollection, ImageryLayerId, ImageryState, TileCoordinatesImageryLayer,
    TileImagery,
};
pub use quadtree_primitive::QuadtreePrimitive;
pub use quadtree_primitive_debug::QuadtreePrimitiveDebug;
pub use quadtree_tile::{QuadtreeTile, QuadtreeTileLoadState};
pub use quadtree_tile_storage::QuadtreeTileStorage;
pub use terrain_provider::{TerrainProvider, TerrainRequest, TerrainRequestError, TileProviderError};
pub use tile_replacement_queue::TileReplacementQueue;
pub use tile_selection_result::TileSelectionResult;
pub use traversal_details::{Quadrant, TraversalDetails, TraversalQuadDetails};

/// Sent whenever the number of tiles waiting to load changes.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLoadProgress(pub usize);

/// Keeps a globe over the ellipsoid up to date, once per frame, while a
/// [`FrameState`] resource exists.
#[derive(Default)]
pub struct Plugin {
    pub options: GlobeOptions,
}

impl bevy::prelude::Plugin for Plugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(QuadtreePrimitive::new(
            &self.options,
            Box::<EllipsoidTerrainProvider>::default(),
        ))
        .add_event::<TileLoadProgress>()
        .add_systems(Update, update_system.run_if(resource_exists::<FrameState>()));
    }
}

fn update_system(
    mut primitive: ResMut<QuadtreePrimitive>,
    frame_state: Res<FrameState>,
    mut tile_load_progress: EventWriter<TileLoadProgress>,
) {
    primitive.update(&frame_state);
    if let Some(length) = primitive.take_tile_load_progress() {
        tile_load_progress.send(TileLoadProgress(length));
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::DVec3;
    use quadglobe_jobs::JobMode;
    use quadglobe_scene::{Ellipsoid, PerspectiveFrustum};

    use super::*;

    fn app() -> App {
        let mut options = GlobeOptions::default();
        options.quadtree.load_queue_time_slice_ms = 60_000.0;
        options.surface.job_mode = JobMode::Inline;
        let mut app = App::new();
        app.add_plugins(Plugin { options });
        app
    }

    fn frame_state() -> FrameState {
        let ellipsoid = Ellipsoid::wgs84();
        let camera = Camera::looking_at(
            &ellipsoid,
            DVec3::new(2.0e7, 0.0, 0.0),
            DVec3::ZERO,
            PerspectiveFrustum::default(),
        );
        FrameState::new(1, camera, 768.0)
    }

    #[test]
    fn nothing_happens_without_a_frame_state() {
        let mut app = app();
        app.update();
        let primitive = app.world.resource::<QuadtreePrimitive>();
        assert!(primitive.last_selection_frame_number().is_none());
        assert!(primitive.tiles_to_render().is_empty());
    }

    #[test]
    fn globe_is_selected_every_frame() {
        let mut app = app();
        app.insert_resource(frame_state());
        for _ in 0..6 {
            app.update();
            let next = {
                let current = app.world.resource::<FrameState>();
                current.next(current.camera.clone())
            };
            app.insert_resource(next);
        }

        let primitive = app.world.resource::<QuadtreePrimitive>();
        assert_eq!(primitive.last_selection_frame_number(), Some(6));
        assert!(!primitive.tiles_to_render().is_empty());
    }

    #[test]
    fn load_progress_is_reported_as_an_event() {
        let mut app = app();
        app.insert_resource(frame_state());
        app.update();

        let events = app.world.resource::<Events<TileLoadProgress>>();
        let mut reader = events.get_reader();
        let sent: Vec<_> = reader.iter(events).copied().collect();
        let primitive = app.world.resource::<QuadtreePrimitive>();
        assert_eq!(sent, vec![TileLoadProgress(primitive.last_tile_load_queue_length())]);
    }
}
