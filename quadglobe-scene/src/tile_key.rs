use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a tile in the quadtree. `x` grows eastward and `y` grows
/// southward from the north-west corner of the tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub x: u32,
    pub y: u32,
    pub level: u32,
}

impl TileKey {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }

    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey::new(self.x / 2, self.y / 2, self.level - 1))
    }

    pub fn southwest_child(&self) -> TileKey {
        TileKey::new(self.x * 2, self.y * 2 + 1, self.level + 1)
    }

    pub fn southeast_child(&self) -> TileKey {
        TileKey::new(self.x * 2 + 1, self.y * 2 + 1, self.level + 1)
    }

    pub fn northwest_child(&self) -> TileKey {
        TileKey::new(self.x * 2, self.y * 2, self.level + 1)
    }

    pub fn northeast_child(&self) -> TileKey {
        TileKey::new(self.x * 2 + 1, self.y * 2, self.level + 1)
    }

    /// Children in the order southwest, southeast, northwest, northeast.
    pub fn children(&self) -> [TileKey; 4] {
        [
            self.southwest_child(),
            self.southeast_child(),
            self.northwest_child(),
            self.northeast_child(),
        ]
    }

    pub fn is_ancestor_of(&self, other: &TileKey) -> bool {
        if other.level <= self.level {
            return false;
        }
        let shift = other.level - self.level;
        other.x >> shift == self.x && other.y >> shift == self.y
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_point_back_to_parent() {
        let key = TileKey::new(3, 1, 2);
        for child in key.children() {
            assert_eq!(child.parent(), Some(key));
            assert!(key.is_ancestor_of(&child));
        }
        assert_eq!(TileKey::new(0, 0, 0).parent(), None);
        assert_eq!(key.northeast_child(), TileKey::new(7, 2, 3));
    }

    #[test]
    fn ancestry_spans_levels() {
        let root = TileKey::new(1, 0, 0);
        let deep = TileKey::new(13, 2, 3);
        assert!(root.is_ancestor_of(&deep));
        assert!(!TileKey::new(0, 0, 0).is_ancestor_of(&deep));
        assert!(!deep.is_ancestor_of(&deep));
        assert_eq!(deep.to_string(), "3/13/2");
    }
}
