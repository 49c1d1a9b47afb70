use quadglobe_jobs::JobMode;
use quadglobe_scene::Rectangle;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse globe options: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{field}` must be {expected}, got {value}")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
}

/// Tuning of the quadtree traversal and load scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadtreePrimitiveOptions {
    /// Pixels of error a tile may show before it is refined.
    pub maximum_screen_space_error: f64,
    /// Tiles kept in memory beyond the ones used in the current frame.
    pub tile_cache_size: usize,
    pub load_queue_time_slice_ms: f64,
    /// Descendants that may be loading at once before an ancestor is
    /// loaded and rendered in their place.
    pub loading_descendant_limit: u32,
    pub preload_ancestors: bool,
    pub preload_siblings: bool,
}

impl Default for QuadtreePrimitiveOptions {
    fn default() -> Self {
        Self {
            maximum_screen_space_error: 2.0,
            tile_cache_size: 100,
            load_queue_time_slice_ms: 5.0,
            loading_descendant_limit: 20,
            preload_ancestors: true,
            preload_siblings: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceTileProviderOptions {
    /// Tiles entirely outside this rectangle are never shown.
    pub cartographic_limit_rectangle: Rectangle,
    /// Mesh jobs and upsample jobs may each have this many in flight.
    pub maximum_asynchronous_tasks: usize,
    pub maximum_terrain_requests: usize,
    pub terrain_exaggeration: f64,
    pub terrain_exaggeration_relative_height: f64,
    pub job_mode: JobMode,
}

impl Default for SurfaceTileProviderOptions {
    fn default() -> Self {
        Self {
            cartographic_limit_rectangle: Rectangle::MAX_VALUE,
            maximum_asynchronous_tasks: 5,
            maximum_terrain_requests: 18,
            terrain_exaggeration: 1.0,
            terrain_exaggeration_relative_height: 0.0,
            job_mode: JobMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeOptions {
    pub quadtree: QuadtreePrimitiveOptions,
    pub surface: SurfaceTileProviderOptions,
}

impl GlobeOptions {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: GlobeOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let quadtree = &self.quadtree;
        let surface = &self.surface;
        if !(quadtree.maximum_screen_space_error > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "quadtree.maximum_screen_space_error",
                expected: "positive",
                value: quadtree.maximum_screen_space_error,
            });
        }
        if !(quadtree.load_queue_time_slice_ms >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "quadtree.load_queue_time_slice_ms",
                expected: "zero or more",
                value: quadtree.load_queue_time_slice_ms,
            });
        }
        if surface.maximum_asynchronous_tasks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "surface.maximum_asynchronous_tasks",
                expected: "at least 1",
                value: 0.0,
            });
        }
        if surface.maximum_terrain_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "surface.maximum_terrain_requests",
                expected: "at least 1",
                value: 0.0,
            });
        }
        if !surface.terrain_exaggeration.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "surface.terrain_exaggeration",
                expected: "finite",
                value: surface.terrain_exaggeration,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let options = GlobeOptions::from_json_str("{}").unwrap();
        assert_eq!(options, GlobeOptions::default());
        assert_eq!(options.quadtree.tile_cache_size, 100);
        assert_eq!(options.surface.maximum_terrain_requests, 18);
        assert_eq!(options.surface.job_mode, JobMode::Background);
    }

    #[test]
    fn partial_override() {
        let options = GlobeOptions::from_json_str(
            r#"{
                "quadtree": { "maximum_screen_space_error": 4.0, "preload_siblings": true },
                "surface": { "job_mode": "inline", "terrain_exaggeration": 2.5 }
            }"#,
        )
        .unwrap();
        assert_eq!(options.quadtree.maximum_screen_space_error, 4.0);
        assert!(options.quadtree.preload_siblings);
        assert!(options.quadtree.preload_ancestors);
        assert_eq!(options.surface.job_mode, JobMode::Inline);
        assert_eq!(options.surface.terrain_exaggeration, 2.5);
        assert_eq!(options.surface.maximum_asynchronous_tasks, 5);
    }

    #[test]
    fn rejects_invalid_values() {
        let error = GlobeOptions::from_json_str(r#"{ "quadtree": { "maximum_screen_space_error": 0 } }"#)
            .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue {
                field: "quadtree.maximum_screen_space_error",
                ..
            }
        ));

        let error = GlobeOptions::from_json_str(r#"{ "surface": { "maximum_terrain_requests": 0 } }"#)
            .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let error = GlobeOptions::from_json_str("{ quadtree: ").unwrap_err();
        assert!(matches!(error, ConfigError::Json(_)));
    }
}
