use std::sync::Arc;

use bevy::math::{DVec2, DVec3};

use crate::bounding_sphere::BoundingSphere;
use crate::oriented_bounding_box::OrientedBoundingBox;

use super::indices_and_edges_cache::IndicesAndEdges;

/// A tessellated tile. Positions are relative to `center`; skirt vertices
/// follow the `vertex_count_without_skirts` grid vertices.
#[derive(Clone, Debug)]
pub struct TerrainMesh {
    pub center: DVec3,
    pub positions: Vec<DVec3>,
    pub heights: Vec<f64>,
    pub uvs: Vec<DVec2>,
    pub encoded_normals: Vec<[u8; 2]>,
    pub indices_and_edges: Arc<IndicesAndEdges>,
    pub vertex_count_without_skirts: usize,
    pub minimum_height: f64,
    pub maximum_height: f64,
    pub bounding_sphere_3d: BoundingSphere,
    pub oriented_bounding_box: OrientedBoundingBox,
    pub occludee_point_in_scaled_space: Option<DVec3>,
}

impl TerrainMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices_and_edges.indices
    }

    pub fn index_count_without_skirts(&self) -> usize {
        self.indices_and_edges.index_count_without_skirts
    }
}
