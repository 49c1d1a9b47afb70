use quadglobe_scene::{Rectangle, TileKey};

use crate::globe_surface_tile::GlobeSurfaceTile;
use crate::tile_selection_result::TileSelectionResult;
use crate::traversal_details::Quadrant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuadtreeTileLoadState {
    #[default]
    Start,
    Loading,
    Done,
    /// Will never be loaded.
    Failed,
}

/// A node of the quadtree. Tiles refer to each other by key; the tiles
/// themselves live in [`crate::QuadtreeTileStorage`].
#[derive(Debug)]
pub struct QuadtreeTile {
    pub key: TileKey,
    /// `None` for level zero tiles.
    pub location: Option<Quadrant>,
    pub parent: Option<TileKey>,
    pub southwest: Option<TileKey>,
    pub southeast: Option<TileKey>,
    pub northwest: Option<TileKey>,
    pub northeast: Option<TileKey>,
    pub rectangle: Rectangle,
    pub state: QuadtreeTileLoadState,
    /// Whether the tile can be drawn without a hole, though perhaps not at
    /// full detail yet.
    pub renderable: bool,
    pub upsampled_from_parent: bool,
    pub distance: f64,
    pub load_priority: f64,
    pub last_selection_result: TileSelectionResult,
    pub last_selection_result_frame: Option<u64>,
    /// Set with [`TileSelectionResult::CulledButNeeded`] when the tile was
    /// drawn in place of descendants that were not ready.
    pub drawn_for_descendants: bool,
    pub replacement_previous: Option<TileKey>,
    pub replacement_next: Option<TileKey>,
    pub data: GlobeSurfaceTile,
}

impl QuadtreeTile {
    pub fn new(
        key: TileKey,
        location: Option<Quadrant>,
        parent: Option<TileKey>,
        rectangle: Rectangle,
    ) -> Self {
        Self {
            key,
            location,
            parent,
            southwest: None,
            southeast: None,
            northwest: None,
            northeast: None,
            rectangle,
            state: QuadtreeTileLoadState::Start,
            renderable: false,
            upsampled_from_parent: false,
            distance: 0.0,
            load_priority: 0.0,
            last_selection_result: TileSelectionResult::None,
            last_selection_result_frame: None,
            drawn_for_descendants: false,
            replacement_previous: None,
            replacement_next: None,
            data: GlobeSurfaceTile::default(),
        }
    }

    pub fn needs_loading(&self) -> bool {
        self.state < QuadtreeTileLoadState::Done
    }

    pub fn eligible_for_unloading(&self) -> bool {
        self.data.eligible_for_unloading()
    }

    /// All four children, once the tile has been subdivided.
    pub fn children(&self) -> Option<[TileKey; 4]> {
        Some([self.southwest?, self.southeast?, self.northwest?, self.northeast?])
    }

    /// The selection result of the given frame, `None` if the tile was not
    /// visited then.
    pub fn selection_result_in_frame(&self, frame_number: Option<u64>) -> TileSelectionResult {
        if frame_number.is_some() && self.last_selection_result_frame == frame_number {
            self.last_selection_result
        } else {
            TileSelectionResult::None
        }
    }

    /// Whether the tile ended up in the render list of the given frame.
    pub fn was_rendered_in_frame(&self, frame_number: Option<u64>) -> bool {
        match self.selection_result_in_frame(frame_number) {
            TileSelectionResult::Rendered => true,
            TileSelectionResult::CulledButNeeded => self.drawn_for_descendants,
            _ => false,
        }
    }

    /// Culled but holding the camera: only its terrain is wanted.
    pub fn needs_terrain_only(&self) -> bool {
        self.last_selection_result == TileSelectionResult::CulledButNeeded
            && !self.drawn_for_descendants
    }

    /// Returns the tile to its initial state, forgets its children and
    /// hands back its surface data so the caller can release it.
    pub fn free_resources(&mut self) -> GlobeSurfaceTile {
        self.state = QuadtreeTileLoadState::Start;
        self.renderable = false;
        self.upsampled_from_parent = false;
        self.southwest = None;
        self.southeast = None;
        self.northwest = None;
        self.northeast = None;
        std::mem::take(&mut self.data)
    }
}
