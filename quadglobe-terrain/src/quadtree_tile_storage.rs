use std::sync::Arc;

use bevy::utils::HashMap;
use quadglobe_scene::{TileKey, TilingScheme};

use crate::globe_surface_tile::GlobeSurfaceTile;
use crate::quadtree_tile::QuadtreeTile;
use crate::traversal_details::Quadrant;

/// Arena owning every tile of the quadtree, keyed by [`TileKey`].
#[derive(Debug)]
pub struct QuadtreeTileStorage {
    map: HashMap<TileKey, QuadtreeTile>,
    root: Vec<TileKey>,
    tiling_scheme: Arc<dyn TilingScheme>,
}

impl QuadtreeTileStorage {
    pub fn new(tiling_scheme: Arc<dyn TilingScheme>) -> Self {
        Self {
            map: HashMap::default(),
            root: vec![],
            tiling_scheme,
        }
    }

    pub fn tiling_scheme(&self) -> &Arc<dyn TilingScheme> {
        &self.tiling_scheme
    }

    /// Only valid on an empty storage; see [`QuadtreeTileStorage::clear`].
    pub fn set_tiling_scheme(&mut self, tiling_scheme: Arc<dyn TilingScheme>) {
        debug_assert!(self.map.is_empty());
        self.tiling_scheme = tiling_scheme;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn root_len(&self) -> usize {
        self.root.len()
    }

    pub fn roots(&self) -> &[TileKey] {
        &self.root
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &TileKey) -> Option<&QuadtreeTile> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &TileKey) -> Option<&mut QuadtreeTile> {
        self.map.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuadtreeTile> {
        self.map.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut QuadtreeTile> {
        self.map.values_mut()
    }

    pub fn create_level_zero_tiles(&mut self) {
        let number_of_level_zero_tiles_x = self.tiling_scheme.number_of_x_tiles_at_level(0);
        let number_of_level_zero_tiles_y = self.tiling_scheme.number_of_y_tiles_at_level(0);
        for y in 0..number_of_level_zero_tiles_y {
            for x in 0..number_of_level_zero_tiles_x {
                let key = TileKey::new(x, y, 0);
                if self.map.contains_key(&key) {
                    continue;
                }
                let rectangle = self.tiling_scheme.tile_x_y_to_rectangle(x, y, 0);
                self.map.insert(key, QuadtreeTile::new(key, None, None, rectangle));
                self.root.push(key);
            }
        }
    }

    /// Creates the four children of `parent_key` unless they already
    /// exist. Returns them in south-west, south-east, north-west,
    /// north-east order.
    pub fn subdivide(&mut self, parent_key: &TileKey) -> Option<[TileKey; 4]> {
        let parent = self.map.get(parent_key)?;
        if let Some(children) = parent.children() {
            return Some(children);
        }
        let children = parent_key.children();
        for (quadrant, child_key) in Quadrant::ALL.into_iter().zip(children) {
            if !self.map.contains_key(&child_key) {
                let rectangle = self.tiling_scheme.tile_x_y_to_rectangle(
                    child_key.x,
                    child_key.y,
                    child_key.level,
                );
                self.map.insert(
                    child_key,
                    QuadtreeTile::new(child_key, Some(quadrant), Some(*parent_key), rectangle),
                );
            }
        }
        let parent = self.map.get_mut(parent_key)?;
        let [southwest, southeast, northwest, northeast] = children;
        parent.southwest = Some(southwest);
        parent.southeast = Some(southeast);
        parent.northwest = Some(northwest);
        parent.northeast = Some(northeast);
        Some(children)
    }

    /// Every tile below `key`, parents before their children.
    pub fn descendants(&self, key: &TileKey) -> Vec<TileKey> {
        let mut result = vec![];
        let mut stack: Vec<TileKey> = self
            .get(key)
            .and_then(QuadtreeTile::children)
            .map(Vec::from)
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            let Some(tile) = self.get(&next) else {
                continue;
            };
            result.push(next);
            if let Some(children) = tile.children() {
                stack.extend(children);
            }
        }
        result
    }

    /// Resets `key` to its initial state and removes its whole subtree.
    /// The surface data of every affected tile is handed back.
    pub fn free_resources(&mut self, key: &TileKey) -> Vec<GlobeSurfaceTile> {
        let mut freed: Vec<GlobeSurfaceTile> = self
            .descendants(key)
            .into_iter()
            .filter_map(|descendant| self.map.remove(&descendant))
            .map(|mut tile| tile.free_resources())
            .collect();
        if let Some(tile) = self.map.get_mut(key) {
            freed.push(tile.free_resources());
        }
        freed
    }

    /// Removes every tile, root tiles included.
    pub fn clear(&mut self) -> Vec<GlobeSurfaceTile> {
        self.root.clear();
        self.map
            .drain()
            .map(|(_, mut tile)| tile.free_resources())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use quadglobe_scene::GeographicTilingScheme;

    use super::*;

    fn storage() -> QuadtreeTileStorage {
        let mut storage = QuadtreeTileStorage::new(Arc::new(GeographicTilingScheme::default()));
        storage.create_level_zero_tiles();
        storage
    }

    #[test]
    fn level_zero_tiles_cover_the_scheme() {
        let mut storage = storage();
        assert_eq!(storage.root_len(), 2);
        assert_eq!(storage.len(), 2);
        storage.create_level_zero_tiles();
        assert_eq!(storage.root_len(), 2);
        let west = storage.get(&TileKey::new(0, 0, 0)).unwrap();
        assert!(west.parent.is_none());
        assert!(west.location.is_none());
        assert!((west.rectangle.west + std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn subdivide_links_children() {
        let mut storage = storage();
        let root = TileKey::new(1, 0, 0);
        let children = storage.subdivide(&root).unwrap();
        assert_eq!(children, root.children());
        assert_eq!(storage.len(), 6);
        for child in children {
            let tile = storage.get(&child).unwrap();
            assert_eq!(tile.parent, Some(root));
            let parent_rectangle = storage.get(&root).unwrap().rectangle;
            assert!(tile.rectangle.west >= parent_rectangle.west - 1e-12);
            assert!(tile.rectangle.east <= parent_rectangle.east + 1e-12);
        }
        assert_eq!(
            storage.get(&root.northeast_child()).unwrap().location,
            Some(Quadrant::Northeast)
        );
        assert_eq!(storage.subdivide(&root), Some(children));
        assert_eq!(storage.len(), 6);
        assert!(storage.subdivide(&TileKey::new(9, 9, 9)).is_none());
    }

    #[test]
    fn free_resources_drops_the_subtree() {
        let mut storage = storage();
        let root = TileKey::new(0, 0, 0);
        let children = storage.subdivide(&root).unwrap();
        storage.subdivide(&children[0]).unwrap();
        assert_eq!(storage.descendants(&root).len(), 8);

        let freed = storage.free_resources(&root);
        assert_eq!(freed.len(), 9);
        assert_eq!(storage.len(), 2);
        let tile = storage.get(&root).unwrap();
        assert!(tile.children().is_none());
        assert_eq!(storage.root_len(), 2);
    }

    #[test]
    fn clear_removes_everything() {
        let mut storage = storage();
        storage.subdivide(&TileKey::new(0, 0, 0));
        assert_eq!(storage.clear().len(), 6);
        assert!(storage.is_empty());
        assert_eq!(storage.root_len(), 0);
    }
}
