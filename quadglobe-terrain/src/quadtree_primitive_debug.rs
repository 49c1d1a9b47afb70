/// Per-frame traversal counters, logged when they change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadtreePrimitiveDebug {
    pub enable_debug_output: bool,
    /// Keeps the previous selection instead of traversing the tree.
    pub suspend_lod_update: bool,

    pub max_depth: u32,
    pub max_depth_visited: u32,
    pub tiles_visited: u32,
    pub tiles_culled: u32,
    pub tiles_rendered: u32,
    pub tiles_waiting_for_children: u32,

    pub last_max_depth: u32,
    pub last_max_depth_visited: u32,
    pub last_tiles_visited: u32,
    pub last_tiles_culled: u32,
    pub last_tiles_rendered: u32,
    pub last_tiles_waiting_for_children: u32,
}

impl Default for QuadtreePrimitiveDebug {
    fn default() -> Self {
        Self {
            enable_debug_output: true,
            suspend_lod_update: false,
            max_depth: 0,
            max_depth_visited: 0,
            tiles_visited: 0,
            tiles_culled: 0,
            tiles_rendered: 0,
            tiles_waiting_for_children: 0,
            last_max_depth: 0,
            last_max_depth_visited: 0,
            last_tiles_visited: 0,
            last_tiles_culled: 0,
            last_tiles_rendered: 0,
            last_tiles_waiting_for_children: 0,
        }
    }
}

impl QuadtreePrimitiveDebug {
    pub fn reset(&mut self) {
        self.max_depth = 0;
        self.max_depth_visited = 0;
        self.tiles_visited = 0;
        self.tiles_culled = 0;
        self.tiles_rendered = 0;
        self.tiles_waiting_for_children = 0;
    }

    fn changed(&self) -> bool {
        self.tiles_visited != self.last_tiles_visited
            || self.tiles_rendered != self.last_tiles_rendered
            || self.tiles_waiting_for_children != self.last_tiles_waiting_for_children
            || self.max_depth != self.last_max_depth
            || self.max_depth_visited != self.last_max_depth_visited
            || self.tiles_culled != self.last_tiles_culled
    }

    /// Logs the counters if they differ from the previous frame. Returns
    /// whether anything was logged.
    pub fn log_if_changed(&mut self) -> bool {
        if !self.enable_debug_output || !self.changed() {
            return false;
        }
        bevy::log::info!(
            "Visited {}, Rendered: {}, Culled: {}, Max Depth Rendered: {}, Max Depth Visited: {}, Waiting for children: {}",
            self.tiles_visited,
            self.tiles_rendered,
            self.tiles_culled,
            self.max_depth,
            self.max_depth_visited,
            self.tiles_waiting_for_children
        );
        self.last_tiles_visited = self.tiles_visited;
        self.last_tiles_rendered = self.tiles_rendered;
        self.last_tiles_waiting_for_children = self.tiles_waiting_for_children;
        self.last_max_depth = self.max_depth;
        self.last_max_depth_visited = self.max_depth_visited;
        self.last_tiles_culled = self.tiles_culled;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_only_on_change() {
        let mut debug = QuadtreePrimitiveDebug::default();
        assert!(!debug.log_if_changed());
        debug.tiles_visited = 4;
        debug.tiles_rendered = 2;
        assert!(debug.log_if_changed());
        assert_eq!(debug.last_tiles_visited, 4);
        assert!(!debug.log_if_changed());

        debug.reset();
        assert_eq!(debug.tiles_visited, 0);
        assert_eq!(debug.last_tiles_rendered, 2);
        assert!(debug.log_if_changed());
    }

    #[test]
    fn disabled_output_stays_silent() {
        let mut debug = QuadtreePrimitiveDebug {
            enable_debug_output: false,
            ..Default::default()
        };
        debug.tiles_culled = 9;
        assert!(!debug.log_if_changed());
        assert_eq!(debug.last_tiles_culled, 0);
    }
}
