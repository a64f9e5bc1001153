//! World grid - the fixed-size 2D array of cells the simulation runs on

use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::terrain_source::{resolve_terrain, TerrainLayers, TerrainSource};
use crate::components::{Cell, DiffusivityTable, GridCoord, ManaBounds, ManaState};

/// Material settings applied to every cell when a grid is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    pub diffusivity: DiffusivityTable,
    pub mana_bounds: ManaBounds,
}

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("invalid grid dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("invalid mana bounds [{min}, {max}]")]
    InvalidBounds { min: f32, max: f32 },
}

/// Grid of cells indexed by array position `(ix, iy)`.
///
/// Array index `(ix, iy)` corresponds to world coordinate
/// `(ix + origin.x, iy + origin.y)`. Cells are stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldGrid {
    width: usize,
    height: usize,
    origin: GridCoord,
    cells: Vec<Cell>,
}

/// Build a grid by resolving every cell's terrain from `source`
pub fn build_grid<S: TerrainSource + ?Sized>(
    source: &S,
    width: i32,
    height: i32,
    origin: GridCoord,
    settings: &GridSettings,
) -> Result<WorldGrid, GridError> {
    if width <= 0 || height <= 0 {
        log::warn!(
            "Refusing to build grid with invalid size {}x{} at origin {}",
            width,
            height,
            origin
        );
        return Err(GridError::InvalidDimensions { width, height });
    }
    let bounds = settings.mana_bounds;
    if !bounds.is_valid() {
        log::warn!(
            "Refusing to build grid with mana bounds [{}, {}]",
            bounds.min,
            bounds.max
        );
        return Err(GridError::InvalidBounds {
            min: bounds.min,
            max: bounds.max,
        });
    }

    let mut cells = Vec::with_capacity(width as usize * height as usize);
    for iy in 0..height {
        for ix in 0..width {
            let coord = origin.offset(ix, iy);
            let terrain = resolve_terrain(source, coord);
            cells.push(Cell::new(
                coord,
                terrain,
                &settings.diffusivity,
                settings.mana_bounds,
            ));
        }
    }

    log::info!("Grid built: size {}x{}, origin {}", width, height, origin);

    Ok(WorldGrid {
        width: width as usize,
        height: height as usize,
        origin,
        cells,
    })
}

impl WorldGrid {
    /// Build a grid covering the bounding box of the ground layer
    pub fn from_layers(layers: &TerrainLayers, settings: &GridSettings) -> Result<Self, GridError> {
        match layers.ground_bounds() {
            Some((origin, width, height)) => build_grid(layers, width, height, origin, settings),
            None => {
                log::warn!("Ground layer is empty, no grid to build");
                Err(GridError::InvalidDimensions {
                    width: 0,
                    height: 0,
                })
            }
        }
    }

    /// Reassemble a grid from stored cells
    pub(crate) fn from_cells(
        width: usize,
        height: usize,
        origin: GridCoord,
        cells: Vec<Cell>,
    ) -> Option<Self> {
        if width == 0 || height == 0 || cells.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            origin,
            cells,
        })
    }

    /// (width, height) in cells
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// World coordinate of array index (0, 0)
    pub fn origin(&self) -> GridCoord {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn index(&self, ix: usize, iy: usize) -> Option<usize> {
        if ix < self.width && iy < self.height {
            Some(iy * self.width + ix)
        } else {
            None
        }
    }

    /// Index of the neighbour at `(ix + dx, iy + dy)`, if inside the grid
    pub(crate) fn neighbor_index(&self, ix: usize, iy: usize, dx: i32, dy: i32) -> Option<usize> {
        let nx = ix as i64 + dx as i64;
        let ny = iy as i64 + dy as i64;
        if nx < 0 || ny < 0 {
            return None;
        }
        self.index(nx as usize, ny as usize)
    }

    pub fn cell(&self, ix: usize, iy: usize) -> Option<&Cell> {
        self.index(ix, iy).map(|i| &self.cells[i])
    }

    /// Look up a cell by world coordinate
    pub fn cell_at_world(&self, coord: GridCoord) -> Option<&Cell> {
        let ix = coord.x as i64 - self.origin.x as i64;
        let iy = coord.y as i64 - self.origin.y as i64;
        if ix < 0 || iy < 0 {
            return None;
        }
        self.cell(ix as usize, iy as usize)
    }

    pub(crate) fn cell_by_index(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub(crate) fn mana_by_index_mut(&mut self, index: usize) -> &mut ManaState {
        &mut self.cells[index].mana
    }

    /// All cells in storage order (row-major, from array index (0, 0))
    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter()
    }

    /// All cells with their array indices
    pub fn indexed_cells(&self) -> impl Iterator<Item = (usize, usize, &Cell)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i % width, i / width, cell))
    }

    /// Sum of committed mana over the whole grid
    pub fn total_mana(&self) -> f32 {
        self.cells.iter().map(|c| c.mana.current()).sum()
    }

    /// Queue a mana change for the current tick. Returns false if out of range.
    pub fn add_pending(&mut self, ix: usize, iy: usize, delta: f32) -> bool {
        match self.index(ix, iy) {
            Some(i) => {
                self.cells[i].mana.add_pending_change(delta);
                true
            }
            None => false,
        }
    }

    /// Commit every cell's pending change
    pub fn commit_pending(&mut self) {
        for cell in &mut self.cells {
            cell.mana.apply_pending_changes();
        }
    }

    /// Seed a cell's mana directly. Returns false if out of range.
    pub fn set_mana(&mut self, ix: usize, iy: usize, value: f32) -> bool {
        match self.index(ix, iy) {
            Some(i) => {
                self.cells[i].mana.initialize(value);
                true
            }
            None => false,
        }
    }

    /// Seed every cell with a uniform random amount from `range`
    pub fn randomize_mana<R: Rng + ?Sized>(&mut self, rng: &mut R, range: Range<f32>) {
        if range.is_empty() {
            return;
        }
        for cell in &mut self.cells {
            cell.mana.initialize(rng.gen_range(range.clone()));
        }
    }
}
