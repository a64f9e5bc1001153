//! Generation system - mana sources produce mana each tick, tapering off as they fill

use serde::{Deserialize, Serialize};

use super::TickSystem;
use crate::config::SimulationConfig;
use crate::grid::WorldGrid;

/// Amounts at or below this are not worth queueing
pub const MIN_GENERATION: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Mana per tick produced by an empty source
    pub base_rate: f32,
    /// Mana level at which output has halved
    pub decay_threshold: f32,
    /// How abruptly output drops around the threshold
    pub decay_sharpness: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_rate: 10.0,
            decay_threshold: 10.0,
            decay_sharpness: 2.0,
        }
    }
}

/// Fraction of `base_rate` a source holding `current` mana produces, in 0-1.
///
/// `1 / (1 + (current / threshold)^sharpness)`: 1 when empty, 0.5 at the
/// threshold, tending to 0 above it. A non-positive threshold disables decay.
pub fn generation_factor(current: f32, decay_threshold: f32, decay_sharpness: f32) -> f32 {
    if decay_threshold <= 0.0 {
        return 1.0;
    }
    let ratio = (current / decay_threshold).max(0.0);
    let factor = 1.0 / (1.0 + ratio.powf(decay_sharpness));
    factor.clamp(0.0, 1.0)
}

/// Queue generated mana on every source cell
pub fn compute_generation(grid: &mut WorldGrid, config: &GenerationConfig) {
    for index in 0..grid.len() {
        let cell = grid.cell_by_index(index);
        if !cell.is_mana_source() {
            continue;
        }

        let factor = generation_factor(
            cell.mana().current(),
            config.decay_threshold,
            config.decay_sharpness,
        );
        let amount = config.base_rate * factor;
        if amount > MIN_GENERATION {
            grid.mana_by_index_mut(index).add_pending_change(amount);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationSystem {
    pub config: GenerationConfig,
}

impl GenerationSystem {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }
}

impl TickSystem for GenerationSystem {
    fn name(&self) -> &str {
        "generation"
    }

    fn compute(&self, grid: &mut WorldGrid) {
        compute_generation(grid, &self.config);
    }

    fn configure(&mut self, config: &SimulationConfig) {
        self.config = config.generation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::GridCoord;
    use crate::grid::{GridSettings, TerrainLayers};

    fn grid_from(map: &str) -> WorldGrid {
        let layers = TerrainLayers::from_ascii(map, GridCoord::ZERO);
        WorldGrid::from_layers(&layers, &GridSettings::default()).unwrap()
    }

    #[test]
    fn test_factor_is_one_when_empty() {
        assert_eq!(generation_factor(0.0, 10.0, 2.0), 1.0);
    }

    #[test]
    fn test_factor_half_at_threshold() {
        assert!((generation_factor(10.0, 10.0, 2.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_factor_non_increasing() {
        for sharpness in [0.5, 1.0, 2.0, 4.0] {
            let mut previous = generation_factor(0.0, 10.0, sharpness);
            for step in 1..200 {
                let current = step as f32 * 0.5;
                let factor = generation_factor(current, 10.0, sharpness);
                assert!(factor <= previous + 1e-7, "rose at {} (sharpness {})", current, sharpness);
                assert!((0.0..=1.0).contains(&factor));
                previous = factor;
            }
        }
    }

    #[test]
    fn test_factor_tends_to_zero() {
        assert!(generation_factor(1.0e6, 10.0, 2.0) < 1e-6);
    }

    #[test]
    fn test_factor_guards() {
        // No threshold means no decay
        assert_eq!(generation_factor(500.0, 0.0, 2.0), 1.0);
        assert_eq!(generation_factor(500.0, -1.0, 2.0), 1.0);
        // Negative mana treated as empty
        assert_eq!(generation_factor(-5.0, 10.0, 2.0), 1.0);
    }

    #[test]
    fn test_only_sources_generate() {
        let mut grid = grid_from("~.#");
        compute_generation(&mut grid, &GenerationConfig::default());

        assert!((grid.cell(0, 0).unwrap().mana().pending() - 10.0).abs() < 1e-6);
        assert_eq!(grid.cell(1, 0).unwrap().mana().pending(), 0.0);
        assert_eq!(grid.cell(2, 0).unwrap().mana().pending(), 0.0);
    }

    #[test]
    fn test_generation_only_touches_pending() {
        let mut grid = grid_from("~");
        compute_generation(&mut grid, &GenerationConfig::default());
        assert_eq!(grid.cell(0, 0).unwrap().mana().current(), 0.0);

        grid.commit_pending();
        assert!((grid.cell(0, 0).unwrap().mana().current() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_tiny_amounts_skipped() {
        let mut grid = grid_from("~");
        let config = GenerationConfig {
            base_rate: 0.00005,
            ..Default::default()
        };
        compute_generation(&mut grid, &config);
        assert_eq!(grid.cell(0, 0).unwrap().mana().pending(), 0.0);
    }

    #[test]
    fn test_source_output_tapers() {
        let mut grid = grid_from("~");
        let config = GenerationConfig::default();
        let mut gains = Vec::new();
        for _ in 0..5 {
            let before = grid.cell(0, 0).unwrap().mana().current();
            compute_generation(&mut grid, &config);
            grid.commit_pending();
            gains.push(grid.cell(0, 0).unwrap().mana().current() - before);
        }
        for pair in gains.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }
}
