//! Terrain payloads carried by quadtree tiles and the tessellation that
//! turns them into meshes.

mod heightmap_terrain_data;
mod heightmap_tessellator;
mod indices_and_edges_cache;
mod terrain_data;
mod terrain_mesh;

pub use heightmap_terrain_data::*;
pub use heightmap_tessellator::*;
pub use indices_and_edges_cache::*;
pub use terrain_data::*;
pub use terrain_mesh::*;
