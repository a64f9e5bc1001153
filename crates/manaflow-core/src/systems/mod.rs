//! Systems - per-tick logic that reads the grid and queues pending changes

mod diffusion;
mod generation;

pub use diffusion::*;
pub use generation::*;

use crate::config::SimulationConfig;
use crate::grid::WorldGrid;

/// A simulation step run once per tick during the compute phase.
///
/// `compute` reads committed mana and may only queue pending changes;
/// the engine commits every cell after all systems have run.
pub trait TickSystem {
    fn name(&self) -> &str;

    fn compute(&self, grid: &mut WorldGrid);

    /// Pick up new parameters after the engine's config changes
    fn configure(&mut self, _config: &SimulationConfig) {}
}
