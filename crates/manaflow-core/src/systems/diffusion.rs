//! Diffusion system - mana flows from fuller cells to emptier neighbours
//!
//! Flow between two cells uses the harmonic mean of their diffusivities as
//! conductance. A donor's outflows are scaled down together so it never
//! sends more than it holds, which keeps every transfer conservative.

use serde::{Deserialize, Serialize};

use super::TickSystem;
use crate::config::SimulationConfig;
use crate::grid::WorldGrid;

/// Donors whose combined outflow is below this are skipped
pub const MIN_TOTAL_OUTFLOW: f32 = 1e-4;

/// Largest rate that keeps the explicit scheme stable
pub const MAX_STABLE_RATE: f32 = 0.125;

/// Flow directions, in the order weights are given: right, left, up, down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Right,
    Left,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
    ];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Left => (-1, 0),
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
        }
    }
}

/// Per-direction flow multipliers, e.g. to bias flow downhill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionWeights {
    pub right: f32,
    pub left: f32,
    pub up: f32,
    pub down: f32,
}

impl DirectionWeights {
    pub fn uniform(weight: f32) -> Self {
        Self {
            right: weight,
            left: weight,
            up: weight,
            down: weight,
        }
    }

    pub fn get(&self, direction: Direction) -> f32 {
        match direction {
            Direction::Right => self.right,
            Direction::Left => self.left,
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        Direction::ALL.map(|d| self.get(d))
    }
}

impl Default for DirectionWeights {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    pub rate: f32,
    pub weights: DirectionWeights,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            rate: 0.03,
            weights: DirectionWeights::default(),
        }
    }
}

/// Harmonic mean of two diffusivities: `2ab / (a + b)`
pub fn harmonic_conductance(a: f32, b: f32) -> f32 {
    let sum = a + b;
    if sum <= 0.0 {
        0.0
    } else {
        2.0 * a * b / sum
    }
}

/// Queue this tick's flows for every donor cell.
///
/// Negative (or NaN) direction weights count as 0. Every raw flow is then
/// non-negative, so the outflow total is the sum of all four and the
/// `min(total, current) / total` scaling keeps a donor from emitting more
/// than it holds.
pub fn compute_diffusion(grid: &mut WorldGrid, config: &DiffusionConfig) {
    let (width, height) = grid.size();
    let weights = config.weights.as_array().map(|w| w.max(0.0));

    for iy in 0..height {
        for ix in 0..width {
            let Some(from_index) = grid.index(ix, iy) else {
                continue;
            };
            let from = grid.cell_by_index(from_index);
            let from_diffusivity = from.diffusivity();
            let from_mana = from.mana().current();
            if from_diffusivity <= 0.0 || from_mana <= 0.0 {
                continue;
            }

            let mut flows: [Option<(usize, f32)>; 4] = [None; 4];
            let mut total_outflow = 0.0;

            for (slot, direction) in Direction::ALL.iter().enumerate() {
                let (dx, dy) = direction.delta();
                let Some(to_index) = grid.neighbor_index(ix, iy, dx, dy) else {
                    continue;
                };
                let to = grid.cell_by_index(to_index);
                if to.diffusivity() <= 0.0 {
                    continue;
                }

                let potential = from_mana - to.mana().current();
                if potential <= 0.0 {
                    continue;
                }

                let conductance = harmonic_conductance(from_diffusivity, to.diffusivity());
                let flow = potential * config.rate * conductance * weights[slot];
                if flow > 0.0 {
                    flows[slot] = Some((to_index, flow));
                    total_outflow += flow;
                }
            }

            if total_outflow < MIN_TOTAL_OUTFLOW {
                continue;
            }

            let scale = total_outflow.min(from_mana) / total_outflow;
            for (to_index, flow) in flows.into_iter().flatten() {
                let actual = flow * scale;
                grid.mana_by_index_mut(from_index).add_pending_change(-actual);
                grid.mana_by_index_mut(to_index).add_pending_change(actual);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiffusionSystem {
    pub config: DiffusionConfig,
}

impl DiffusionSystem {
    pub fn new(config: DiffusionConfig) -> Self {
        Self { config }
    }
}

impl TickSystem for DiffusionSystem {
    fn name(&self) -> &str {
        "diffusion"
    }

    fn compute(&self, grid: &mut WorldGrid) {
        compute_diffusion(grid, &self.config);
    }

    fn configure(&mut self, config: &SimulationConfig) {
        self.config = config.diffusion;
    }
}
