//! Manaflow Core - Tick-Based Mana Diffusion Simulation
//!
//! Simulates a scalar resource ("mana") spreading over a 2D tile grid.
//! Each cell has a terrain kind that sets its diffusivity; mana pools
//! generate mana with a saturating output curve, and mana flows from
//! fuller cells to emptier neighbours.
//!
//! # Architecture
//!
//! - **Components**: terrain, cells and per-cell mana state
//! - **Grid**: cells resolved from tile layers, with a read-only view for consumers
//! - **Systems**: generation and diffusion, run once per tick
//! - **Engine**: fixed-rate ticks, each split into a compute phase (systems
//!   queue pending deltas) and a commit phase (every cell applies its deltas)
//!
//! # Example
//!
//! ```rust,no_run
//! use manaflow_core::prelude::*;
//!
//! let layers = TerrainLayers::from_ascii("#~..#\n#...#", GridCoord::ZERO);
//! let config = SimulationConfig::default();
//! let grid = WorldGrid::from_layers(&layers, &config.grid_settings()).unwrap();
//! let mut engine = SimulationEngine::new(config).unwrap().with_grid(grid);
//!
//! // Frame loop
//! loop {
//!     engine.update(1.0 / 60.0);
//! }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod grid;
pub mod persistence;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::SimulationConfig;
    pub use crate::engine::{RunState, SimulationEngine};
    pub use crate::grid::{build_grid, GridSettings, TerrainLayers, TerrainSource, WorldGrid};
    pub use crate::systems::TickSystem;
}
