//! Grid - terrain resolution and the world grid of cells

mod terrain_source;
mod world_grid;

pub use terrain_source::*;
pub use world_grid::*;
