use std::sync::Arc;

use bevy::utils::HashMap;

use super::terrain_data::TerrainError;

/// Triangle indices of a regular grid plus the grid vertices along each
/// edge. Edge lists wind counter-clockwise around the tile.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicesAndEdges {
    pub indices: Vec<u32>,
    pub west_indices_south_to_north: Vec<u32>,
    pub south_indices_east_to_west: Vec<u32>,
    pub east_indices_north_to_south: Vec<u32>,
    pub north_indices_west_to_east: Vec<u32>,
    pub index_count_without_skirts: usize,
}

/// Memoizes grid triangulations by `(width, height)`. Owned by whoever
/// tessellates tiles and shared with mesh jobs behind a mutex.
#[derive(Debug, Default)]
pub struct IndicesAndEdgesCache {
    regular_grid_and_edge_indices: HashMap<(u32, u32), Arc<IndicesAndEdges>>,
    regular_grid_and_skirt_and_edge_indices: HashMap<(u32, u32), Arc<IndicesAndEdges>>,
}

impl IndicesAndEdgesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regular_grid_and_edge_indices.len() + self.regular_grid_and_skirt_and_edge_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_regular_grid_indices_and_edge_indices(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Arc<IndicesAndEdges>, TerrainError> {
        check_grid(width, height, 0)?;
        if let Some(cached) = self.regular_grid_and_edge_indices.get(&(width, height)) {
            return Ok(cached.clone());
        }

        let mut indices = Vec::with_capacity(((width - 1) * (height - 1) * 6) as usize);
        add_regular_grid_indices(width, height, &mut indices);
        let index_count_without_skirts = indices.len();
        let edges = get_edge_indices(width, height);

        let value = Arc::new(IndicesAndEdges {
            indices,
            west_indices_south_to_north: edges.west_indices_south_to_north,
            south_indices_east_to_west: edges.south_indices_east_to_west,
            east_indices_north_to_south: edges.east_indices_north_to_south,
            north_indices_west_to_east: edges.north_indices_west_to_east,
            index_count_without_skirts,
        });
        self.regular_grid_and_edge_indices
            .insert((width, height), value.clone());
        Ok(value)
    }

    /// Grid indices followed by skirt indices. Skirt vertices are expected
    /// after the grid vertices, one per edge vertex in the order west, south,
    /// east, north.
    pub fn get_regular_grid_and_skirt_indices_and_edge_indices(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Arc<IndicesAndEdges>, TerrainError> {
        let edge_vertex_count = (width + height) * 2;
        check_grid(width, height, edge_vertex_count)?;
        if let Some(cached) = self.regular_grid_and_skirt_and_edge_indices.get(&(width, height)) {
            return Ok(cached.clone());
        }

        let grid_vertex_count = width * height;
        let grid_index_count = (width - 1) * (height - 1) * 6;
        let edge_index_count = edge_vertex_count.saturating_sub(4) * 6;

        let mut indices = Vec::with_capacity((grid_index_count + edge_index_count) as usize);
        add_regular_grid_indices(width, height, &mut indices);
        let index_count_without_skirts = indices.len();

        let edges = get_edge_indices(width, height);
        let mut vertex_index = grid_vertex_count;
        for edge in [
            &edges.west_indices_south_to_north,
            &edges.south_indices_east_to_west,
            &edges.east_indices_north_to_south,
            &edges.north_indices_west_to_east,
        ] {
            add_skirt_indices(edge, vertex_index, &mut indices);
            vertex_index += edge.len() as u32;
        }

        let value = Arc::new(IndicesAndEdges {
            indices,
            west_indices_south_to_north: edges.west_indices_south_to_north,
            south_indices_east_to_west: edges.south_indices_east_to_west,
            east_indices_north_to_south: edges.east_indices_north_to_south,
            north_indices_west_to_east: edges.north_indices_west_to_east,
            index_count_without_skirts,
        });
        self.regular_grid_and_skirt_and_edge_indices
            .insert((width, height), value.clone());
        Ok(value)
    }
}

fn check_grid(width: u32, height: u32, extra_vertices: u32) -> Result<(), TerrainError> {
    if width < 2 || height < 2 {
        return Err(TerrainError::HeightmapTooSmall { width, height });
    }
    let vertex_count = u64::from(width) * u64::from(height) + u64::from(extra_vertices);
    if vertex_count >= u64::from(u32::MAX) {
        return Err(TerrainError::TooManyVertices { width, height });
    }
    Ok(())
}

struct EdgeIndices {
    west_indices_south_to_north: Vec<u32>,
    south_indices_east_to_west: Vec<u32>,
    east_indices_north_to_south: Vec<u32>,
    north_indices_west_to_east: Vec<u32>,
}

/// Row zero of the grid is the northern edge.
fn get_edge_indices(width: u32, height: u32) -> EdgeIndices {
    EdgeIndices {
        west_indices_south_to_north: (0..height).map(|i| (height - i - 1) * width).collect(),
        south_indices_east_to_west: (0..width).map(|i| width * height - 1 - i).collect(),
        east_indices_north_to_south: (0..height).map(|i| (i + 1) * width - 1).collect(),
        north_indices_west_to_east: (0..width).collect(),
    }
}

/// Two triangles per cell, split along the south-west to north-east
/// diagonal.
fn add_regular_grid_indices(width: u32, height: u32, indices: &mut Vec<u32>) {
    for row in 0..height - 1 {
        for column in 0..width - 1 {
            let upper_left = row * width + column;
            let lower_left = upper_left + width;
            let lower_right = lower_left + 1;
            let upper_right = upper_left + 1;
            indices.extend_from_slice(&[
                upper_left,
                lower_left,
                upper_right,
                upper_right,
                lower_left,
                lower_right,
            ]);
        }
    }
}

fn add_skirt_indices(edge_indices: &[u32], first_skirt_vertex: u32, indices: &mut Vec<u32>) {
    let mut skirt_vertex = first_skirt_vertex;
    for pair in edge_indices.windows(2) {
        let (previous_index, index) = (pair[0], pair[1]);
        indices.extend_from_slice(&[
            previous_index,
            index,
            skirt_vertex,
            skirt_vertex,
            index,
            skirt_vertex + 1,
        ]);
        skirt_vertex += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_without_skirts() {
        let mut cache = IndicesAndEdgesCache::new();
        let value = cache
            .get_regular_grid_indices_and_edge_indices(3, 2)
            .expect("valid grid");
        assert_eq!(value.indices, vec![0, 3, 1, 1, 3, 4, 1, 4, 2, 2, 4, 5]);
        assert_eq!(value.index_count_without_skirts, 12);
        assert_eq!(value.north_indices_west_to_east, vec![0, 1, 2]);
        assert_eq!(value.south_indices_east_to_west, vec![5, 4, 3]);
        assert_eq!(value.east_indices_north_to_south, vec![2, 5]);
        assert_eq!(value.west_indices_south_to_north, vec![3, 0]);
    }

    #[test]
    fn skirts_reference_vertices_after_the_grid() {
        let mut cache = IndicesAndEdgesCache::new();
        let value = cache
            .get_regular_grid_and_skirt_indices_and_edge_indices(3, 3)
            .expect("valid grid");
        assert_eq!(value.index_count_without_skirts, 24);
        assert_eq!(value.indices.len(), 24 + (12 - 4) * 6);
        let max_index = value.indices.iter().copied().max().unwrap_or_default();
        assert_eq!(max_index, 9 + 12 - 1);
        // First skirt quad hangs below the western edge.
        assert_eq!(&value.indices[24..30], &[6, 3, 9, 9, 3, 10]);
    }

    #[test]
    fn results_are_memoized_per_size() {
        let mut cache = IndicesAndEdgesCache::new();
        let first = cache
            .get_regular_grid_and_skirt_indices_and_edge_indices(5, 5)
            .expect("valid grid");
        let second = cache
            .get_regular_grid_and_skirt_indices_and_edge_indices(5, 5)
            .expect("valid grid");
        assert!(Arc::ptr_eq(&first, &second));
        cache
            .get_regular_grid_indices_and_edge_indices(5, 5)
            .expect("valid grid");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        let mut cache = IndicesAndEdgesCache::new();
        assert_eq!(
            cache.get_regular_grid_indices_and_edge_indices(1, 4),
            Err(TerrainError::HeightmapTooSmall { width: 1, height: 4 })
        );
        assert!(matches!(
            cache.get_regular_grid_indices_and_edge_indices(70_000, 70_000),
            Err(TerrainError::TooManyVertices { .. })
        ));
        assert!(cache.is_empty());
    }
}
