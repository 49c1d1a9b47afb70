#![warn(clippy::indexing_slicing)]

use bevy::math::{DVec2, DVec3};

use crate::attribute_compression::oct_encode;
use crate::bounding_sphere::BoundingSphere;
use crate::cartographic::Cartographic;
use crate::ellipsoid::Ellipsoid;
use crate::ellipsoidal_occluder::EllipsoidalOccluder;
use crate::oriented_bounding_box::OrientedBoundingBox;
use crate::rectangle::Rectangle;

use super::indices_and_edges_cache::IndicesAndEdges;

const SKIRT_OFFSET_PERCENTAGE: f64 = 0.00001;

pub struct HeightmapTessellatorOptions<'a> {
    /// Decoded heights in meters, row zero is the northern edge.
    pub heights: &'a [f64],
    pub width: u32,
    pub height: u32,
    pub rectangle: Rectangle,
    pub ellipsoid: &'a Ellipsoid,
    pub skirt_height: f64,
    pub exaggeration: f64,
    pub exaggeration_relative_height: f64,
    /// Skirt vertices are emitted for each of these edges when
    /// `skirt_height` is positive.
    pub edges: &'a IndicesAndEdges,
}

#[derive(Debug, Clone)]
pub struct TessellatedHeightmap {
    pub center: DVec3,
    pub positions: Vec<DVec3>,
    pub heights: Vec<f64>,
    pub uvs: Vec<DVec2>,
    pub encoded_normals: Vec<[u8; 2]>,
    pub vertex_count_without_skirts: usize,
    pub minimum_height: f64,
    pub maximum_height: f64,
    pub bounding_sphere_3d: BoundingSphere,
    pub oriented_bounding_box: OrientedBoundingBox,
    pub occludee_point_in_scaled_space: Option<DVec3>,
}

struct Vertex {
    cartographic: Cartographic,
    uv: DVec2,
}

/// Builds tile-centered vertices for a geographic heightmap grid plus one
/// lowered skirt vertex per edge vertex.
pub fn compute_vertices(options: &HeightmapTessellatorOptions<'_>) -> TessellatedHeightmap {
    let HeightmapTessellatorOptions {
        heights,
        width,
        height,
        rectangle,
        ellipsoid,
        skirt_height,
        exaggeration,
        exaggeration_relative_height,
        edges,
    } = *options;

    let rectangle_width = rectangle.compute_width();
    let rectangle_height = rectangle.compute_height();
    let granularity_x = rectangle_width / f64::from(width - 1);
    let granularity_y = rectangle_height / f64::from(height - 1);

    let center = ellipsoid.cartographic_to_cartesian(&rectangle.center());

    let grid_vertex_count = (width * height) as usize;
    let mut grid = Vec::with_capacity(grid_vertex_count);
    let mut minimum_height = f64::MAX;
    let mut maximum_height = f64::MIN;

    for row in 0..height {
        let latitude = if row == height - 1 {
            rectangle.south
        } else {
            rectangle.north - granularity_y * f64::from(row)
        };
        let v = ((latitude - rectangle.south) / rectangle_height).clamp(0.0, 1.0);
        for column in 0..width {
            let longitude = if column == width - 1 {
                rectangle.west + rectangle_width
            } else {
                rectangle.west + granularity_x * f64::from(column)
            };
            let u = ((longitude - rectangle.west) / rectangle_width).clamp(0.0, 1.0);

            let sample = heights
                .get((row * width + column) as usize)
                .copied()
                .unwrap_or_default();
            let sample = (sample - exaggeration_relative_height) * exaggeration
                + exaggeration_relative_height;
            minimum_height = minimum_height.min(sample);
            maximum_height = maximum_height.max(sample);

            grid.push(Vertex {
                cartographic: Cartographic::new(longitude, latitude, sample),
                uv: DVec2::new(u, v),
            });
        }
    }

    let mut vertices = grid;
    if skirt_height > 0.0 {
        let skirt_edges = [
            (&edges.west_indices_south_to_north, DVec2::new(-1.0, 0.0)),
            (&edges.south_indices_east_to_west, DVec2::new(0.0, -1.0)),
            (&edges.east_indices_north_to_south, DVec2::new(1.0, 0.0)),
            (&edges.north_indices_west_to_east, DVec2::new(0.0, 1.0)),
        ];
        for (edge, outward) in skirt_edges {
            for &index in edge.iter() {
                let Some(source) = vertices.get(index as usize) else {
                    continue;
                };
                let mut cartographic = source.cartographic;
                cartographic.longitude += outward.x * SKIRT_OFFSET_PERCENTAGE * rectangle_width;
                cartographic.latitude += outward.y * SKIRT_OFFSET_PERCENTAGE * rectangle_height;
                cartographic.height -= skirt_height;
                let uv = source.uv;
                vertices.push(Vertex { cartographic, uv });
            }
        }
    }

    let mut world_positions = Vec::with_capacity(vertices.len());
    let mut positions = Vec::with_capacity(vertices.len());
    let mut vertex_heights = Vec::with_capacity(vertices.len());
    let mut uvs = Vec::with_capacity(vertices.len());
    let mut encoded_normals = Vec::with_capacity(vertices.len());
    for vertex in &vertices {
        let world = ellipsoid.cartographic_to_cartesian(&vertex.cartographic);
        world_positions.push(world);
        positions.push(world - center);
        vertex_heights.push(vertex.cartographic.height);
        uvs.push(vertex.uv);
        encoded_normals.push(oct_encode(
            ellipsoid.geodetic_surface_normal_cartographic(&vertex.cartographic),
        ));
    }

    let bounding_sphere_3d = BoundingSphere::from_points(&world_positions);
    let oriented_bounding_box =
        OrientedBoundingBox::from_rectangle(&rectangle, minimum_height, maximum_height, ellipsoid);

    let grid_positions = positions.get(..grid_vertex_count).unwrap_or(&positions);
    let occludee_point_in_scaled_space = EllipsoidalOccluder::new(ellipsoid)
        .compute_horizon_culling_point_from_vertices_possibly_under_ellipsoid(
            center,
            grid_positions,
            center,
            Some(minimum_height),
        );

    TessellatedHeightmap {
        center,
        positions,
        heights: vertex_heights,
        uvs,
        encoded_normals,
        vertex_count_without_skirts: grid_vertex_count,
        minimum_height,
        maximum_height,
        bounding_sphere_3d,
        oriented_bounding_box,
        occludee_point_in_scaled_space,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::terrain::IndicesAndEdgesCache;

    fn tessellate(heights: &[f64], size: u32, skirt_height: f64) -> TessellatedHeightmap {
        let ellipsoid = Ellipsoid::wgs84();
        let mut cache = IndicesAndEdgesCache::new();
        let edges = cache
            .get_regular_grid_and_skirt_indices_and_edge_indices(size, size)
            .expect("valid grid");
        compute_vertices(&HeightmapTessellatorOptions {
            heights,
            width: size,
            height: size,
            rectangle: Rectangle::from_degrees(10.0, 20.0, 12.0, 22.0),
            ellipsoid: &ellipsoid,
            skirt_height,
            exaggeration: 1.0,
            exaggeration_relative_height: 0.0,
            edges: &edges,
        })
    }

    #[test]
    fn grid_then_skirt_vertices() {
        let heights = vec![50.0; 9];
        let result = tessellate(&heights, 3, 100.0);
        assert_eq!(result.vertex_count_without_skirts, 9);
        assert_eq!(result.positions.len(), 9 + 12);
        assert_eq!(result.minimum_height, 50.0);
        assert_eq!(result.maximum_height, 50.0);
        assert!(result.heights[9..].iter().all(|h| *h == -50.0));
        assert_eq!(result.uvs[0], DVec2::new(0.0, 1.0));
        assert_eq!(result.uvs[8], DVec2::new(1.0, 0.0));
    }

    #[test]
    fn volumes_enclose_the_grid() {
        let heights: Vec<f64> = (0..16).map(|i| f64::from(i) * 10.0).collect();
        let result = tessellate(&heights, 4, 0.0);
        assert_eq!(result.positions.len(), 16);
        assert_eq!(result.maximum_height, 150.0);
        for p in &result.positions {
            let world = *p + result.center;
            assert!(world.distance(result.bounding_sphere_3d.center) <= result.bounding_sphere_3d.radius + 1e-6);
        }
        assert!(result.occludee_point_in_scaled_space.is_some());
    }

    #[test]
    fn encoded_normals_point_up() {
        let result = tessellate(&[0.0; 4], 2, 0.0);
        for (p, normal) in result.positions.iter().zip(&result.encoded_normals) {
            let up = crate::attribute_compression::oct_decode(*normal);
            assert!(up.dot((*p + result.center).normalize()) > 0.99);
        }
    }
}
