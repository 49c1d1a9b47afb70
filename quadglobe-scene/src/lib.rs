#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::expect_used
)]
//! Geometry for a quadtree-tiled globe: the ellipsoid and its coordinate
//! systems, bounding volumes, frustum culling, horizon occlusion and the
//! heightmap terrain payload the tiles carry.

mod attribute_compression;
mod bounding_sphere;
mod bounding_volume;
mod cartographic;
mod culling_volume;
mod ellipsoid;
mod ellipsoid_tangent_plane;
mod ellipsoidal_occluder;
mod geographic_tiling_scheme;
mod intersection_tests;
pub mod math;
mod oriented_bounding_box;
mod perspective_frustum;
mod plane;
mod ray;
mod rectangle;
pub mod terrain;
mod tile_bounding_region;
mod tile_key;
mod tiling_scheme;

pub use attribute_compression::*;
pub use bounding_sphere::*;
pub use bounding_volume::*;
pub use cartographic::*;
pub use culling_volume::*;
pub use ellipsoid::*;
pub use ellipsoid_tangent_plane::*;
pub use ellipsoidal_occluder::*;
pub use geographic_tiling_scheme::*;
pub use intersection_tests::*;
pub use oriented_bounding_box::*;
pub use perspective_frustum::*;
pub use plane::*;
pub use ray::*;
pub use rectangle::*;
pub use tile_bounding_region::*;
pub use tile_key::*;
pub use tiling_scheme::*;
