use std::fmt::{self, Debug};

use quadglobe_scene::{Rectangle, TileKey};

use crate::quadtree_tile::QuadtreeTile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageryLayerId(u32);

impl fmt::Display for ImageryLayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imagery layer {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageryState {
    #[default]
    Unloaded,
    /// Being fetched or reprojected.
    Transitioning,
    Ready,
    Failed,
}

/// A raster draped over the terrain.
pub trait ImageryLayer: Debug + Send + Sync {
    fn name(&self) -> String;

    fn show(&self) -> bool {
        true
    }

    fn alpha(&self) -> f64 {
        1.0
    }

    fn rectangle(&self) -> Rectangle {
        Rectangle::MAX_VALUE
    }

    /// Advances the imagery covering one terrain tile. Called every time
    /// the tile is loaded until it reports `Ready` or `Failed`.
    fn process_imagery(&mut self, key: &TileKey, rectangle: &Rectangle) -> ImageryState;
}

/// The imagery of one layer attached to one terrain tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileImagery {
    pub layer: ImageryLayerId,
    pub state: ImageryState,
}

impl TileImagery {
    pub fn new(layer: ImageryLayerId) -> Self {
        Self {
            layer,
            state: ImageryState::Unloaded,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ImageryState::Ready | ImageryState::Failed)
    }
}

#[derive(Debug, Default)]
pub struct ImageryLayerCollection {
    layers: Vec<(ImageryLayerId, Box<dyn ImageryLayer>)>,
    next_id: u32,
}

impl ImageryLayerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn add(&mut self, layer: Box<dyn ImageryLayer>) -> ImageryLayerId {
        let id = ImageryLayerId(self.next_id);
        self.next_id += 1;
        bevy::log::debug!("Adding {} ({})", id, layer.name());
        self.layers.push((id, layer));
        id
    }

    pub fn remove(&mut self, id: ImageryLayerId) -> Option<Box<dyn ImageryLayer>> {
        let index = self.layers.iter().position(|(layer_id, _)| *layer_id == id)?;
        Some(self.layers.remove(index).1)
    }

    pub fn get(&self, id: ImageryLayerId) -> Option<&dyn ImageryLayer> {
        self.layers
            .iter()
            .find(|(layer_id, _)| *layer_id == id)
            .map(|(_, layer)| layer.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = ImageryLayerId> + '_ {
        self.layers.iter().map(|(id, _)| *id)
    }

    /// Attaches an unloaded record of every shown layer overlapping the
    /// tile. Returns whether any was attached.
    pub fn create_tile_imagery_skeletons(&self, tile: &mut QuadtreeTile) -> bool {
        let mut created = false;
        for (id, _) in &self.layers {
            created |= self.create_tile_imagery_skeletons_for_layer(*id, tile);
        }
        created
    }

    pub fn create_tile_imagery_skeletons_for_layer(
        &self,
        id: ImageryLayerId,
        tile: &mut QuadtreeTile,
    ) -> bool {
        let Some(layer) = self.get(id) else {
            return false;
        };
        if !layer.show() || layer.rectangle().simple_intersection(&tile.rectangle).is_none() {
            return false;
        }
        if tile.data.imagery.iter().any(|imagery| imagery.layer == id) {
            return false;
        }
        tile.data.imagery.push(TileImagery::new(id));
        true
    }

    /// Advances one tile's imagery of layer `id`. Imagery of a layer that
    /// no longer exists has failed.
    pub fn process_imagery(
        &mut self,
        id: ImageryLayerId,
        key: &TileKey,
        rectangle: &Rectangle,
    ) -> ImageryState {
        match self.layers.iter_mut().find(|(layer_id, _)| *layer_id == id) {
            Some((_, layer)) => layer.process_imagery(key, rectangle),
            None => ImageryState::Failed,
        }
    }
}

/// Debug layer labelling every tile with its coordinates. Its imagery is
/// ready as soon as it is asked for.
#[derive(Debug, Default, Clone)]
pub struct TileCoordinatesImageryLayer {
    pub labels_created: usize,
}

impl TileCoordinatesImageryLayer {
    pub fn label(key: &TileKey) -> String {
        format!("L{}X{}Y{}", key.level, key.x, key.y)
    }
}

impl ImageryLayer for TileCoordinatesImageryLayer {
    fn name(&self) -> String {
        "Tile coordinates".into()
    }

    fn process_imagery(&mut self, key: &TileKey, _rectangle: &Rectangle) -> ImageryState {
        bevy::log::trace!("Labelling {}", Self::label(key));
        self.labels_created += 1;
        ImageryState::Ready
    }
}
