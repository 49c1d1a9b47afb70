/// Position of a child within its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    Southwest,
    Southeast,
    Northwest,
    Northeast,
}

impl Quadrant {
    /// Same order as [`quadglobe_scene::TileKey::children`].
    pub const ALL: [Quadrant; 4] = [
        Quadrant::Southwest,
        Quadrant::Southeast,
        Quadrant::Northwest,
        Quadrant::Northeast,
    ];

    pub fn index(self) -> usize {
        match self {
            Quadrant::Southwest => 0,
            Quadrant::Southeast => 1,
            Quadrant::Northwest => 2,
            Quadrant::Northeast => 3,
        }
    }
}

/// Summary of the tiles selected for rendering below some tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalDetails {
    pub all_are_renderable: bool,
    pub any_were_rendered_last_frame: bool,
    pub not_yet_renderable_count: u32,
}

impl Default for TraversalDetails {
    fn default() -> Self {
        Self {
            all_are_renderable: true,
            any_were_rendered_last_frame: false,
            not_yet_renderable_count: 0,
        }
    }
}

impl TraversalDetails {
    /// Details of a single tile that was selected for rendering.
    pub fn rendered(renderable: bool, rendered_last_frame: bool) -> Self {
        Self {
            all_are_renderable: renderable,
            any_were_rendered_last_frame: rendered_last_frame,
            not_yet_renderable_count: u32::from(!renderable),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalQuadDetails {
    pub southwest: TraversalDetails,
    pub southeast: TraversalDetails,
    pub northwest: TraversalDetails,
    pub northeast: TraversalDetails,
}

impl TraversalQuadDetails {
    pub fn get_mut(&mut self, quadrant: Quadrant) -> &mut TraversalDetails {
        match quadrant {
            Quadrant::Southwest => &mut self.southwest,
            Quadrant::Southeast => &mut self.southeast,
            Quadrant::Northwest => &mut self.northwest,
            Quadrant::Northeast => &mut self.northeast,
        }
    }

    pub fn combine(&self) -> TraversalDetails {
        let quads = [self.southwest, self.southeast, self.northwest, self.northeast];
        TraversalDetails {
            all_are_renderable: quads.iter().all(|d| d.all_are_renderable),
            any_were_rendered_last_frame: quads.iter().any(|d| d.any_were_rendered_last_frame),
            not_yet_renderable_count: quads.iter().map(|d| d.not_yet_renderable_count).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_folds_all_four() {
        let mut quad = TraversalQuadDetails::default();
        assert_eq!(quad.combine(), TraversalDetails::default());

        *quad.get_mut(Quadrant::Southeast) = TraversalDetails::rendered(false, false);
        *quad.get_mut(Quadrant::Northeast) = TraversalDetails::rendered(false, true);
        quad.northwest.not_yet_renderable_count = 3;
        let combined = quad.combine();
        assert!(!combined.all_are_renderable);
        assert!(combined.any_were_rendered_last_frame);
        assert_eq!(combined.not_yet_renderable_count, 5);
    }

    #[test]
    fn quadrant_indices_match_child_order() {
        let key = quadglobe_scene::TileKey::new(1, 0, 1);
        let children = key.children();
        assert_eq!(children[Quadrant::Southwest.index()], key.southwest_child());
        assert_eq!(children[Quadrant::Northeast.index()], key.northeast_child());
        assert_eq!(
            Quadrant::ALL.map(Quadrant::index),
            [0, 1, 2, 3]
        );
    }
}
