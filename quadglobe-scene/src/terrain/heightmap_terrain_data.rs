use std::sync::{Arc, PoisonError};

use serde::{Deserialize, Serialize};

use crate::rectangle::Rectangle;
use crate::tiling_scheme::TilingScheme;

use super::heightmap_tessellator::{compute_vertices, HeightmapTessellatorOptions};
use super::terrain_data::{
    get_estimated_level_zero_geometric_error_for_a_heightmap, CreateMeshOptions, TerrainData,
    TerrainError,
};
use super::terrain_mesh::TerrainMesh;

/// How heights are packed in a heightmap buffer. A height is
/// `elements_per_height` consecutive elements combined in base
/// `element_multiplier`, then `height * height_scale + height_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightmapTerrainStructure {
    pub height_scale: f64,
    pub height_offset: f64,
    pub elements_per_height: u32,
    pub stride: u32,
    pub element_multiplier: u32,
    pub is_big_endian: bool,
    pub lowest_encoded_height: Option<f64>,
    pub highest_encoded_height: Option<f64>,
}

impl Default for HeightmapTerrainStructure {
    fn default() -> Self {
        Self {
            height_scale: 1.0,
            height_offset: 0.0,
            elements_per_height: 1,
            stride: 1,
            element_multiplier: 256,
            is_big_endian: false,
            lowest_encoded_height: None,
            highest_encoded_height: None,
        }
    }
}

/// Terrain delivered as a regular grid of heights covering the tile
/// rectangle, row zero at the north edge.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapTerrainData {
    buffer: Vec<f32>,
    width: u32,
    height: u32,
    child_tile_mask: u8,
    structure: HeightmapTerrainStructure,
    created_by_upsampling: bool,
    height_range: Option<(f64, f64)>,
}

impl HeightmapTerrainData {
    /// All four children are marked available.
    pub fn new(buffer: Vec<f32>, width: u32, height: u32) -> Self {
        Self {
            buffer,
            width,
            height,
            child_tile_mask: 15,
            structure: HeightmapTerrainStructure::default(),
            created_by_upsampling: false,
            height_range: None,
        }
        .with_height_range()
    }

    pub fn with_structure(mut self, structure: HeightmapTerrainStructure) -> Self {
        self.structure = structure;
        self.with_height_range()
    }

    fn with_height_range(mut self) -> Self {
        self.height_range = self.compute_height_range();
        self
    }

    /// Bit 0 is the southwest child, then southeast, northwest and
    /// northeast.
    pub fn with_child_tile_mask(mut self, child_tile_mask: u8) -> Self {
        self.child_tile_mask = child_tile_mask;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn structure(&self) -> &HeightmapTerrainStructure {
        &self.structure
    }

    fn validate(&self) -> Result<(), TerrainError> {
        if self.width < 2 || self.height < 2 {
            return Err(TerrainError::HeightmapTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.buffer_length()?;
        if self.buffer.len() < expected {
            return Err(TerrainError::BufferTooShort {
                expected,
                actual: self.buffer.len(),
            });
        }
        Ok(())
    }

    fn sample_count(&self) -> Result<usize, TerrainError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or(TerrainError::HeightmapTooLarge {
                width: self.width,
                height: self.height,
            })
    }

    fn buffer_length(&self) -> Result<usize, TerrainError> {
        self.sample_count()?
            .checked_mul(self.structure.stride as usize)
            .ok_or(TerrainError::HeightmapTooLarge {
                width: self.width,
                height: self.height,
            })
    }

    fn compute_height_range(&self) -> Option<(f64, f64)> {
        self.validate().ok()?;
        (0..self.sample_count().ok()?)
            .map(|index| self.decode(self.encoded_height(index)))
            .fold(None, |range, h| match range {
                None => Some((h, h)),
                Some((min, max)) => Some((f64::min(min, h), f64::max(max, h))),
            })
    }

    fn encoded_height(&self, index: usize) -> f64 {
        let structure = &self.structure;
        let base = index * structure.stride as usize;
        let multiplier = f64::from(structure.element_multiplier);
        element_order(structure)
            .try_fold(0.0, |height, offset| {
                self.buffer
                    .get(base + offset)
                    .map(|element| height * multiplier + f64::from(*element))
            })
            .unwrap_or_default()
    }

    fn decode(&self, encoded: f64) -> f64 {
        encoded * self.structure.height_scale + self.structure.height_offset
    }

    /// Encoded height at a position inside `source_rectangle`, sampling the
    /// triangle the position falls in.
    fn interpolate_encoded_height(&self, source_rectangle: &Rectangle, longitude: f64, latitude: f64) -> f64 {
        let width = self.width;
        let height = self.height;
        let from_west = ((longitude - source_rectangle.west) * f64::from(width - 1)
            / (source_rectangle.east - source_rectangle.west))
            .max(0.0);
        let from_south = ((latitude - source_rectangle.south) * f64::from(height - 1)
            / (source_rectangle.north - source_rectangle.south))
            .max(0.0);

        let mut west_integer = from_west.floor() as u32;
        let mut east_integer = west_integer + 1;
        if east_integer >= width {
            east_integer = width - 1;
            west_integer = width - 2;
        }

        let mut south_integer = from_south.floor() as u32;
        let mut north_integer = south_integer + 1;
        if north_integer >= height {
            north_integer = height - 1;
            south_integer = height - 2;
        }

        let dx = from_west - f64::from(west_integer);
        let dy = from_south - f64::from(south_integer);

        let south_row = height - 1 - south_integer;
        let north_row = height - 1 - north_integer;

        let sample = |row: u32, column: u32| {
            self.encoded_height(row as usize * width as usize + column as usize)
        };
        triangle_interpolate_height(
            dx,
            dy,
            sample(south_row, west_integer),
            sample(south_row, east_integer),
            sample(north_row, west_integer),
            sample(north_row, east_integer),
        )
    }
}

impl TerrainData for HeightmapTerrainData {
    fn create_mesh(&self, options: &CreateMeshOptions<'_>) -> Result<TerrainMesh, TerrainError> {
        self.validate()?;
        let tiling_scheme = options.tiling_scheme;
        let ellipsoid = tiling_scheme.ellipsoid();
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(options.x, options.y, options.level);

        let level_zero_max_error = get_estimated_level_zero_geometric_error_for_a_heightmap(
            ellipsoid,
            self.width,
            tiling_scheme.number_of_x_tiles_at_level(0),
        );
        let this_level_max_error = level_zero_max_error / f64::from(1u32 << options.level.min(31));
        let skirt_height = (this_level_max_error * 4.0).min(1000.0);

        let indices_and_edges = {
            let mut cache = options
                .indices_and_edges_cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if skirt_height > 0.0 {
                cache.get_regular_grid_and_skirt_indices_and_edge_indices(self.width, self.height)?
            } else {
                cache.get_regular_grid_indices_and_edge_indices(self.width, self.height)?
            }
        };

        let heights: Vec<f64> = (0..self.sample_count()?)
            .map(|index| self.decode(self.encoded_height(index)))
            .collect();

        let tessellated = compute_vertices(&HeightmapTessellatorOptions {
            heights: &heights,
            width: self.width,
            height: self.height,
            rectangle,
            ellipsoid,
            skirt_height,
            exaggeration: options.exaggeration,
            exaggeration_relative_height: options.exaggeration_relative_height,
            edges: &indices_and_edges,
        });

        Ok(TerrainMesh {
            center: tessellated.center,
            positions: tessellated.positions,
            heights: tessellated.heights,
            uvs: tessellated.uvs,
            encoded_normals: tessellated.encoded_normals,
            indices_and_edges,
            vertex_count_without_skirts: tessellated.vertex_count_without_skirts,
            minimum_height: tessellated.minimum_height,
            maximum_height: tessellated.maximum_height,
            bounding_sphere_3d: tessellated.bounding_sphere_3d,
            oriented_bounding_box: tessellated.oriented_bounding_box,
            occludee_point_in_scaled_space: tessellated.occludee_point_in_scaled_space,
        })
    }

    fn upsample(
        &self,
        tiling_scheme: &dyn TilingScheme,
        this_x: u32,
        this_y: u32,
        this_level: u32,
        descendant_x: u32,
        descendant_y: u32,
        descendant_level: u32,
    ) -> Result<Arc<dyn TerrainData>, TerrainError> {
        let levels = descendant_level.saturating_sub(this_level);
        if levels != 1 {
            return Err(TerrainError::UpsampleLevelDifference { levels });
        }
        self.validate()?;

        let width = self.width;
        let height = self.height;
        let structure = self.structure;
        let mut heights = vec![0.0f32; self.buffer_length()?];

        let source_rectangle = tiling_scheme.tile_x_y_to_rectangle(this_x, this_y, this_level);
        let destination_rectangle =
            tiling_scheme.tile_x_y_to_rectangle(descendant_x, descendant_y, descendant_level);

        for j in 0..height {
            let latitude = lerp(
                destination_rectangle.north,
                destination_rectangle.south,
                f64::from(j) / f64::from(height - 1),
            );
            for i in 0..width {
                let longitude = lerp(
                    destination_rectangle.west,
                    destination_rectangle.east,
                    f64::from(i) / f64::from(width - 1),
                );
                let mut sample = self.interpolate_encoded_height(&source_rectangle, longitude, latitude);
                if let Some(lowest) = structure.lowest_encoded_height {
                    sample = sample.max(lowest);
                }
                if let Some(highest) = structure.highest_encoded_height {
                    sample = sample.min(highest);
                }
                let index = j as usize * width as usize + i as usize;
                set_height(&mut heights, &structure, index, sample);
            }
        }

        Ok(Arc::new(
            HeightmapTerrainData {
                buffer: heights,
                width,
                height,
                child_tile_mask: 0,
                structure,
                created_by_upsampling: true,
                height_range: None,
            }
            .with_height_range(),
        ))
    }

    fn is_child_available(&self, this_x: u32, this_y: u32, child_x: u32, child_y: u32) -> bool {
        // northwest
        let mut bit_number = 2;
        if child_x != this_x * 2 {
            bit_number += 1;
        }
        if child_y != this_y * 2 {
            bit_number -= 2;
        }
        self.child_tile_mask & (1 << bit_number) != 0
    }

    fn was_created_by_upsampling(&self) -> bool {
        self.created_by_upsampling
    }

    fn height_range(&self) -> Option<(f64, f64)> {
        self.height_range
    }

    fn interpolate_height(&self, rectangle: &Rectangle, longitude: f64, latitude: f64) -> Option<f64> {
        self.validate().ok()?;
        Some(self.decode(self.interpolate_encoded_height(rectangle, longitude, latitude)))
    }
}

fn lerp(start: f64, end: f64, t: f64) -> f64 {
    (1.0 - t) * start + t * end
}

/// Tessellated cells are split from southwest to northeast.
fn triangle_interpolate_height(
    dx: f64,
    dy: f64,
    south_west_height: f64,
    south_east_height: f64,
    north_west_height: f64,
    north_east_height: f64,
) -> f64 {
    if dy < dx {
        // lower right
        south_west_height
            + dx * (south_east_height - south_west_height)
            + dy * (north_east_height - south_east_height)
    } else {
        south_west_height
            + dx * (north_east_height - north_west_height)
            + dy * (north_west_height - south_west_height)
    }
}

/// Element offsets from most to least significant.
fn element_order(structure: &HeightmapTerrainStructure) -> impl Iterator<Item = usize> {
    let count = structure.elements_per_height as usize;
    let is_big_endian = structure.is_big_endian;
    (0..count).map(move |k| if is_big_endian { k } else { count - 1 - k })
}

fn set_height(heights: &mut [f32], structure: &HeightmapTerrainStructure, index: usize, height: f64) {
    let elements_per_height = structure.elements_per_height as usize;
    if elements_per_height == 0 {
        return;
    }
    let multiplier = f64::from(structure.element_multiplier);
    let base = index * structure.stride as usize;
    let mut divisor = multiplier.powi(elements_per_height as i32 - 1);
    let mut height = height;

    // The remainder goes into the least significant element.
    let order: Vec<usize> = element_order(structure).collect();
    let Some((&last, leading)) = order.split_last() else {
        return;
    };
    for &offset in leading {
        let element = (height / divisor).trunc();
        if let Some(slot) = heights.get_mut(base + offset) {
            *slot = element as f32;
        }
        height -= element * divisor;
        divisor /= multiplier;
    }
    if let Some(slot) = heights.get_mut(base + last) {
        *slot = height as f32;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::geographic_tiling_scheme::GeographicTilingScheme;
    use crate::terrain::IndicesAndEdgesCache;

    fn ramp(width: u32, height: u32) -> Vec<f32> {
        (0..height)
            .flat_map(|_| (0..width).map(|column| column as f32 * 10.0))
            .collect()
    }

    #[test]
    fn child_mask_bits() {
        let data = HeightmapTerrainData::new(vec![0.0; 4], 2, 2).with_child_tile_mask(0b0001);
        assert!(data.is_child_available(0, 0, 0, 1));
        assert!(!data.is_child_available(0, 0, 1, 1));
        assert!(!data.is_child_available(0, 0, 0, 0));
        assert!(!data.is_child_available(0, 0, 1, 0));

        let all = HeightmapTerrainData::new(vec![0.0; 4], 2, 2);
        assert!(all.is_child_available(3, 5, 7, 10));
    }

    #[test]
    fn height_range_applies_scale_and_offset() {
        let plain = HeightmapTerrainData::new(vec![0.0, 5.0, 10.0, 20.0], 2, 2);
        assert_eq!(plain.height_range(), Some((0.0, 20.0)));
        let data = plain.with_structure(
            HeightmapTerrainStructure {
                height_scale: 2.0,
                height_offset: -100.0,
                ..Default::default()
            },
        );
        assert_eq!(data.height_range(), Some((-100.0, -60.0)));
        assert_eq!(HeightmapTerrainData::new(vec![0.0], 2, 2).height_range(), None);
    }

    #[test]
    fn upsample_reproduces_a_linear_ramp() {
        let tiling_scheme = GeographicTilingScheme::default();
        let data = HeightmapTerrainData::new(ramp(5, 5), 5, 5);
        let child = data
            .upsample(&tiling_scheme, 1, 0, 0, 3, 0, 1)
            .expect("one level");
        assert!(child.was_created_by_upsampling());
        assert!(!child.is_child_available(3, 0, 6, 0));

        // The eastern child covers the eastern half of the ramp.
        let (min, max) = child.height_range().expect("valid");
        assert!((min - 20.0).abs() < 1e-4);
        assert!((max - 40.0).abs() < 1e-4);

        let rectangle = tiling_scheme.tile_x_y_to_rectangle(3, 0, 1);
        let center = rectangle.center();
        let h = child
            .interpolate_height(&rectangle, center.longitude, center.latitude)
            .expect("valid");
        assert!((h - 30.0).abs() < 1e-4);
    }

    #[test]
    fn upsample_keeps_multi_element_encoding() {
        let structure = HeightmapTerrainStructure {
            elements_per_height: 2,
            stride: 2,
            is_big_endian: true,
            ..Default::default()
        };
        // 1000 = 3 * 256 + 232 in every sample.
        let buffer: Vec<f32> = std::iter::repeat([3.0, 232.0]).take(4).flatten().collect();
        let data = HeightmapTerrainData::new(buffer, 2, 2).with_structure(structure);
        assert_eq!(data.height_range(), Some((1000.0, 1000.0)));

        let child = data
            .upsample(&GeographicTilingScheme::default(), 0, 0, 0, 1, 1, 1)
            .expect("one level");
        assert_eq!(child.height_range(), Some((1000.0, 1000.0)));
    }

    #[test]
    fn upsample_only_one_level() {
        let data = HeightmapTerrainData::new(ramp(3, 3), 3, 3);
        let result = data.upsample(&GeographicTilingScheme::default(), 0, 0, 0, 0, 0, 2);
        assert_eq!(
            result.err(),
            Some(TerrainError::UpsampleLevelDifference { levels: 2 })
        );
    }

    #[test]
    fn mesh_has_skirts_and_exaggerated_heights() {
        let tiling_scheme = GeographicTilingScheme::default();
        let cache = Mutex::new(IndicesAndEdgesCache::new());
        let data = HeightmapTerrainData::new(vec![100.0; 25], 5, 5);
        let mesh = data
            .create_mesh(&CreateMeshOptions {
                tiling_scheme: &tiling_scheme,
                x: 5,
                y: 2,
                level: 3,
                exaggeration: 2.0,
                exaggeration_relative_height: 0.0,
                indices_and_edges_cache: &cache,
            })
            .expect("mesh");
        assert_eq!(mesh.vertex_count_without_skirts, 25);
        assert_eq!(mesh.vertex_count(), 25 + 20);
        assert_eq!(mesh.minimum_height, 200.0);
        assert_eq!(mesh.maximum_height, 200.0);
        assert!(mesh.index_count_without_skirts() < mesh.indices().len());
        assert!(mesh.occludee_point_in_scaled_space.is_some());
        // Skirts are capped at a kilometer.
        assert!(mesh.heights[25..].iter().all(|h| *h == -800.0));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let cache = Mutex::new(IndicesAndEdgesCache::new());
        let tiling_scheme = GeographicTilingScheme::default();
        let options = |cache| CreateMeshOptions {
            tiling_scheme: &tiling_scheme,
            x: 0,
            y: 0,
            level: 0,
            exaggeration: 1.0,
            exaggeration_relative_height: 0.0,
            indices_and_edges_cache: cache,
        };

        // 65536 * 65536 wraps to zero in 32 bits.
        let wrapping = HeightmapTerrainData::new(vec![0.0; 4], 65_536, 65_536);
        assert_eq!(wrapping.height_range(), None);
        assert!(matches!(
            wrapping.create_mesh(&options(&cache)),
            Err(TerrainError::BufferTooShort { actual: 4, .. } | TerrainError::HeightmapTooLarge { .. })
        ));

        let huge = HeightmapTerrainData::new(vec![0.0; 4], u32::MAX, u32::MAX).with_structure(
            HeightmapTerrainStructure {
                elements_per_height: 2,
                stride: 2,
                ..Default::default()
            },
        );
        assert_eq!(huge.height_range(), None);
        assert_eq!(
            huge.create_mesh(&options(&cache)).err(),
            Some(TerrainError::HeightmapTooLarge {
                width: u32::MAX,
                height: u32::MAX,
            })
        );
        let upsampled = huge.upsample(&GeographicTilingScheme::default(), 0, 0, 0, 0, 0, 1);
        assert!(matches!(upsampled, Err(TerrainError::HeightmapTooLarge { .. })));
    }

    #[test]
    fn mesh_rejects_short_buffers() {
        let cache = Mutex::new(IndicesAndEdgesCache::new());
        let data = HeightmapTerrainData::new(vec![0.0; 3], 2, 2);
        let result = data.create_mesh(&CreateMeshOptions {
            tiling_scheme: &GeographicTilingScheme::default(),
            x: 0,
            y: 0,
            level: 0,
            exaggeration: 1.0,
            exaggeration_relative_height: 0.0,
            indices_and_edges_cache: &cache,
        });
        assert!(matches!(result, Err(TerrainError::BufferTooShort { expected: 4, actual: 3 })));
    }
}
