/// What the traversal did with a tile in the frame it was last visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TileSelectionResult {
    /// Not visited.
    #[default]
    None = 0,
    /// Outside the view frustum or below the horizon.
    Culled = 1,
    Rendered = 2,
    /// Its children or deeper descendants were selected instead.
    Refined = 3,
    /// Selected, then replaced by an ancestor because the descendants
    /// selected alongside it were not ready.
    RenderedAndKicked = 2 | 4,
    RefinedAndKicked = 3 | 4,
    /// Either culled but containing the camera, so its terrain is loaded
    /// anyway, or drawn in place of descendants that were not ready yet.
    /// [`crate::QuadtreeTile::drawn_for_descendants`] tells the two apart.
    CulledButNeeded = 1 | 8,
}

impl TileSelectionResult {
    pub fn was_kicked(self) -> bool {
        matches!(self, Self::RenderedAndKicked | Self::RefinedAndKicked)
    }

    /// The result before any kick.
    pub fn original_result(self) -> Self {
        match self {
            Self::RenderedAndKicked => Self::Rendered,
            Self::RefinedAndKicked => Self::Refined,
            Self::CulledButNeeded => Self::Culled,
            other => other,
        }
    }

    pub fn kick(self) -> Self {
        match self {
            Self::Rendered => Self::RenderedAndKicked,
            Self::Refined => Self::RefinedAndKicked,
            other => other,
        }
    }
}
