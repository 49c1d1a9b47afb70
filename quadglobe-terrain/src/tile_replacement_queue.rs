use quadglobe_scene::TileKey;

use crate::globe_surface_tile::GlobeSurfaceTile;
use crate::quadtree_tile_storage::QuadtreeTileStorage;

/// Least-recently-rendered list of tiles threaded through the tiles
/// themselves. The head is the most recently rendered tile; following
/// `replacement_next` leads to older tiles.
#[derive(Debug, Default)]
pub struct TileReplacementQueue {
    head: Option<TileKey>,
    tail: Option<TileKey>,
    count: usize,
    last_before_start_of_frame: Option<TileKey>,
}

impl TileReplacementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<TileKey> {
        self.head
    }

    pub fn tail(&self) -> Option<TileKey> {
        self.tail
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Forgets every tile. Only the links kept in the queue are reset, the
    /// storage is expected to be cleared alongside.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Tiles from most to least recently rendered.
    pub fn iter<'a>(&'a self, storage: &'a QuadtreeTileStorage) -> impl Iterator<Item = TileKey> + 'a {
        std::iter::successors(self.head, |key| {
            storage.get(key).and_then(|tile| tile.replacement_next)
        })
        .take(self.count)
    }

    pub fn mark_start_of_render_frame(&mut self) {
        self.last_before_start_of_frame = self.head;
    }

    /// Moves `key` to the head of the queue, adding it if needed.
    pub fn mark_tile_rendered(&mut self, storage: &mut QuadtreeTileStorage, key: TileKey) {
        let Some(item) = storage.get(&key) else {
            return;
        };
        if self.head == Some(key) {
            if self.last_before_start_of_frame == Some(key) {
                self.last_before_start_of_frame = item.replacement_next;
            }
            return;
        }
        let linked = item.replacement_previous.is_some() || item.replacement_next.is_some();

        self.count += 1;

        let Some(head) = self.head else {
            if let Some(item) = storage.get_mut(&key) {
                item.replacement_previous = None;
                item.replacement_next = None;
            }
            self.head = Some(key);
            self.tail = Some(key);
            return;
        };

        if linked {
            self.remove(storage, key);
        }

        if let Some(item) = storage.get_mut(&key) {
            item.replacement_previous = None;
            item.replacement_next = Some(head);
        }
        if let Some(old_head) = storage.get_mut(&head) {
            old_head.replacement_previous = Some(key);
        }
        self.head = Some(key);
    }

    /// Unlinks `key` from the queue.
    pub fn remove(&mut self, storage: &mut QuadtreeTileStorage, key: TileKey) {
        let Some(item) = storage.get(&key) else {
            return;
        };
        let previous = item.replacement_previous;
        let next = item.replacement_next;
        if previous.is_none() && next.is_none() && self.head != Some(key) {
            return;
        }

        if self.last_before_start_of_frame == Some(key) {
            self.last_before_start_of_frame = next;
        }

        if self.head == Some(key) {
            self.head = next;
        } else if let Some(previous) = previous.and_then(|p| storage.get_mut(&p)) {
            previous.replacement_next = next;
        }

        if self.tail == Some(key) {
            self.tail = previous;
        } else if let Some(next) = next.and_then(|n| storage.get_mut(&n)) {
            next.replacement_previous = previous;
        }

        if let Some(item) = storage.get_mut(&key) {
            item.replacement_previous = None;
            item.replacement_next = None;
        }
        self.count = self.count.saturating_sub(1);
    }

    /// Frees tiles not rendered since the start of the frame, oldest first,
    /// until at most `maximum_tiles` remain. Tiles that are still loading
    /// are skipped. A freed tile loses its whole subtree. Returns the surface
    /// data that was released.
    pub fn trim_tiles(
        &mut self,
        storage: &mut QuadtreeTileStorage,
        maximum_tiles: usize,
    ) -> Vec<GlobeSurfaceTile> {
        let mut freed = vec![];
        let mut tile_to_trim = self.tail;
        let mut keep_trimming = true;
        while keep_trimming && self.last_before_start_of_frame.is_some() && self.count > maximum_tiles {
            let Some(key) = tile_to_trim else {
                break;
            };
            // Stop after the last tile not used in the current frame.
            keep_trimming = Some(key) != self.last_before_start_of_frame;

            let Some(tile) = storage.get(&key) else {
                break;
            };
            let mut previous = tile.replacement_previous;

            if tile.eligible_for_unloading() {
                let descendants = storage.descendants(&key);
                if self
                    .last_before_start_of_frame
                    .map_or(false, |last| descendants.contains(&last))
                {
                    keep_trimming = false;
                }
                while let Some(p) = previous.filter(|p| descendants.contains(p)) {
                    previous = storage.get(&p).and_then(|t| t.replacement_previous);
                }
                for descendant in &descendants {
                    self.remove(storage, *descendant);
                }
                self.remove(storage, key);
                freed.extend(storage.free_resources(&key));
            }

            tile_to_trim = previous;
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quadglobe_scene::GeographicTilingScheme;

    use super::*;
    use crate::globe_surface_tile::TerrainState;

    fn storage_with_children() -> (QuadtreeTileStorage, [TileKey; 4]) {
        let mut storage = QuadtreeTileStorage::new(Arc::new(GeographicTilingScheme::default()));
        storage.create_level_zero_tiles();
        let children = storage.subdivide(&TileKey::new(0, 0, 0)).unwrap();
        (storage, children)
    }

    fn order(queue: &TileReplacementQueue, storage: &QuadtreeTileStorage) -> Vec<TileKey> {
        queue.iter(storage).collect()
    }

    #[test]
    fn rendered_tiles_move_to_the_head() {
        let (mut storage, [a, b, c, _]) = storage_with_children();
        let mut queue = TileReplacementQueue::new();
        queue.mark_tile_rendered(&mut storage, a);
        queue.mark_tile_rendered(&mut storage, b);
        queue.mark_tile_rendered(&mut storage, c);
        assert_eq!(order(&queue, &storage), vec![c, b, a]);
        assert_eq!(queue.count(), 3);

        queue.mark_tile_rendered(&mut storage, a);
        assert_eq!(order(&queue, &storage), vec![a, c, b]);
        assert_eq!(queue.tail(), Some(b));
        assert_eq!(queue.count(), 3);

        queue.mark_tile_rendered(&mut storage, a);
        assert_eq!(queue.count(), 3);

        queue.remove(&mut storage, c);
        assert_eq!(order(&queue, &storage), vec![a, b]);
        assert_eq!(queue.count(), 2);
        queue.remove(&mut storage, c);
        assert_eq!(queue.count(), 2);
    }

    #[test]
    fn trims_only_tiles_unused_this_frame() {
        let (mut storage, [a, b, c, d]) = storage_with_children();
        let mut queue = TileReplacementQueue::new();
        for key in [a, b, c] {
            queue.mark_tile_rendered(&mut storage, key);
        }
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(&mut storage, d);
        queue.mark_tile_rendered(&mut storage, a);

        let freed = queue.trim_tiles(&mut storage, 0);
        assert_eq!(freed.len(), 2);
        assert_eq!(order(&queue, &storage), vec![a, d]);
        assert_eq!(queue.count(), 2);
    }

    #[test]
    fn tiles_still_loading_are_not_trimmed() {
        let (mut storage, [a, b, c, _]) = storage_with_children();
        let mut queue = TileReplacementQueue::new();
        for key in [a, b, c] {
            queue.mark_tile_rendered(&mut storage, key);
        }
        let loading = storage.get_mut(&a).unwrap();
        loading.data.set_terrain_state(TerrainState::Receiving);
        queue.mark_start_of_render_frame();

        let freed = queue.trim_tiles(&mut storage, 1);
        assert_eq!(freed.len(), 2);
        assert_eq!(order(&queue, &storage), vec![a]);
        assert!(storage.contains(&a));
    }

    #[test]
    fn trimming_a_parent_unlinks_its_subtree() {
        let (mut storage, children) = storage_with_children();
        let root = TileKey::new(0, 0, 0);
        let other_root = TileKey::new(1, 0, 0);
        let mut queue = TileReplacementQueue::new();
        queue.mark_tile_rendered(&mut storage, root);
        for child in children {
            queue.mark_tile_rendered(&mut storage, child);
        }
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(&mut storage, other_root);

        let freed = queue.trim_tiles(&mut storage, 1);
        assert_eq!(freed.len(), 5);
        assert_eq!(order(&queue, &storage), vec![other_root]);
        assert_eq!(storage.len(), 2);
        assert!(storage.get(&root).unwrap().children().is_none());
    }

    #[test]
    fn nothing_is_trimmed_before_the_first_frame_mark() {
        let (mut storage, [a, b, _, _]) = storage_with_children();
        let mut queue = TileReplacementQueue::new();
        queue.mark_tile_rendered(&mut storage, a);
        queue.mark_tile_rendered(&mut storage, b);
        assert!(queue.trim_tiles(&mut storage, 0).is_empty());
        assert_eq!(queue.count(), 2);
    }
}
