//! Save/Load functionality for persisting the grid
//!
//! Uses bincode for compact binary serialization. Pending deltas are not
//! stored; saves are only taken between ticks when they are all zero.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

use crate::components::{Cell, GridCoord};
use crate::grid::WorldGrid;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the simulation state
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Ticks committed when the save was taken
    pub tick_count: u64,
    pub width: u32,
    pub height: u32,
    pub origin: GridCoord,
    /// Cells in row-major order
    pub cells: Vec<Cell>,
}

/// Result of loading a simulation
pub struct LoadedSimulation {
    pub grid: WorldGrid,
    pub tick_count: u64,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Corrupt save: {0}")]
    Corrupt(String),
    #[error("No grid to save")]
    NoGrid,
}

/// Save the grid to a writer
pub fn save_simulation<W: Write>(
    writer: W,
    grid: &WorldGrid,
    tick_count: u64,
) -> Result<(), SaveError> {
    let (width, height) = grid.size();
    let save_data = SaveData {
        version: SAVE_VERSION,
        tick_count,
        width: width as u32,
        height: height as u32,
        origin: grid.origin(),
        cells: grid.cells().cloned().collect(),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a grid from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<LoadedSimulation, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    for (index, cell) in save_data.cells.iter().enumerate() {
        check_cell(index, cell)?;
    }

    let cell_count = save_data.cells.len();
    let grid = WorldGrid::from_cells(
        save_data.width as usize,
        save_data.height as usize,
        save_data.origin,
        save_data.cells,
    )
    .ok_or_else(|| {
        SaveError::Corrupt(format!(
            "{} cells stored for a {}x{} grid",
            cell_count, save_data.width, save_data.height
        ))
    })?;

    Ok(LoadedSimulation {
        grid,
        tick_count: save_data.tick_count,
    })
}

/// Reject cells whose values the simulation could not have produced
fn check_cell(index: usize, cell: &Cell) -> Result<(), SaveError> {
    let diffusivity = cell.diffusivity();
    if !diffusivity.is_finite() || diffusivity < 0.0 {
        return Err(SaveError::Corrupt(format!(
            "cell {} at {} has diffusivity {}",
            index,
            cell.coordinates(),
            diffusivity
        )));
    }
    let mana = cell.mana();
    if !mana.is_consistent() {
        return Err(SaveError::Corrupt(format!(
            "cell {} at {} has mana {} outside [{}, {}]",
            index,
            cell.coordinates(),
            mana.current(),
            mana.min(),
            mana.max()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::TerrainKind;
    use crate::config::SimulationConfig;
    use crate::engine::SimulationEngine;
    use crate::grid::TerrainLayers;

    #[test]
    fn test_save_load_roundtrip() {
        let config = SimulationConfig::default();
        let layers = TerrainLayers::from_ascii("#~..\n..#.\n.~ .", GridCoord::new(-1, 3));
        let grid = WorldGrid::from_layers(&layers, &config.grid_settings()).unwrap();

        let mut engine = SimulationEngine::new(config).unwrap().with_grid(grid);
        for _ in 0..10 {
            engine.force_tick();
        }

        let mut save_buffer = Vec::new();
        engine.save(&mut save_buffer).expect("Save failed");

        let mut loaded_engine = SimulationEngine::new(config).unwrap();
        loaded_engine.load(&save_buffer[..]).expect("Load failed");

        assert_eq!(loaded_engine.tick_count(), 10);
        assert_eq!(loaded_engine.grid(), engine.grid());
    }

    #[test]
    fn test_save_without_grid() {
        let engine = SimulationEngine::new(SimulationConfig::default()).unwrap();
        let mut buffer = Vec::new();
        assert!(matches!(engine.save(&mut buffer), Err(SaveError::NoGrid)));
    }

    #[test]
    fn test_version_mismatch() {
        let data = SaveData {
            version: SAVE_VERSION + 1,
            tick_count: 0,
            width: 0,
            height: 0,
            origin: GridCoord::ZERO,
            cells: Vec::new(),
        };
        let bytes = bincode::serialize(&data).unwrap();
        assert!(matches!(
            load_simulation(&bytes[..]),
            Err(SaveError::VersionMismatch { found, .. }) if found == SAVE_VERSION + 1
        ));
    }

    #[test]
    fn test_cell_count_mismatch() {
        let data = SaveData {
            version: SAVE_VERSION,
            tick_count: 0,
            width: 3,
            height: 3,
            origin: GridCoord::ZERO,
            cells: Vec::new(),
        };
        let bytes = bincode::serialize(&data).unwrap();
        assert!(matches!(load_simulation(&bytes[..]), Err(SaveError::Corrupt(_))));
    }

    /// Mirror of a stored cell with every field open for tampering
    #[derive(Serialize)]
    struct RawCell {
        coordinates: GridCoord,
        terrain: TerrainKind,
        diffusivity: f32,
        current: f32,
        min: f32,
        max: f32,
    }

    #[derive(Serialize)]
    struct RawSave {
        version: u32,
        tick_count: u64,
        width: u32,
        height: u32,
        origin: GridCoord,
        cells: Vec<RawCell>,
    }

    fn raw_cell(diffusivity: f32, current: f32, min: f32, max: f32) -> RawCell {
        RawCell {
            coordinates: GridCoord::ZERO,
            terrain: TerrainKind::Ground,
            diffusivity,
            current,
            min,
            max,
        }
    }

    fn load_single_cell(cell: RawCell) -> Result<LoadedSimulation, SaveError> {
        let bytes = bincode::serialize(&RawSave {
            version: SAVE_VERSION,
            tick_count: 3,
            width: 1,
            height: 1,
            origin: GridCoord::ZERO,
            cells: vec![cell],
        })
        .unwrap();
        load_simulation(&bytes[..])
    }

    #[test]
    fn test_raw_cell_layout_matches_cell() {
        let loaded = load_single_cell(raw_cell(1.2, 40.0, 0.0, 100.0)).unwrap();
        let cell = loaded.grid.cell(0, 0).unwrap();
        assert_eq!(cell.terrain(), TerrainKind::Ground);
        assert_eq!(cell.diffusivity(), 1.2);
        assert_eq!(cell.mana().current(), 40.0);
        assert_eq!(loaded.tick_count, 3);
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let result = load_single_cell(raw_cell(1.0, 500.0, 10.0, 5.0));
        assert!(matches!(result, Err(SaveError::Corrupt(_))));
    }

    #[test]
    fn test_rejects_nan_bounds() {
        let result = load_single_cell(raw_cell(1.0, 0.0, f32::NAN, 100.0));
        assert!(matches!(result, Err(SaveError::Corrupt(_))));
    }

    #[test]
    fn test_rejects_mana_outside_bounds() {
        for current in [150.0, -1.0, f32::NAN] {
            let result = load_single_cell(raw_cell(1.0, current, 0.0, 100.0));
            assert!(matches!(result, Err(SaveError::Corrupt(_))), "current {}", current);
        }
    }

    #[test]
    fn test_rejects_bad_diffusivity() {
        for diffusivity in [-0.5, f32::NAN, f32::INFINITY] {
            let result = load_single_cell(raw_cell(diffusivity, 1.0, 0.0, 100.0));
            assert!(matches!(result, Err(SaveError::Corrupt(_))), "diffusivity {}", diffusivity);
        }
    }

    #[test]
    fn test_rejected_load_keeps_engine_usable() {
        let config = SimulationConfig::default();
        let layers = TerrainLayers::from_ascii("~.", GridCoord::ZERO);
        let grid = WorldGrid::from_layers(&layers, &config.grid_settings()).unwrap();
        let mut engine = SimulationEngine::new(config).unwrap().with_grid(grid);

        let bytes = bincode::serialize(&RawSave {
            version: SAVE_VERSION,
            tick_count: 0,
            width: 1,
            height: 1,
            origin: GridCoord::ZERO,
            cells: vec![raw_cell(1.0, 500.0, 10.0, 5.0)],
        })
        .unwrap();
        assert!(engine.load(&bytes[..]).is_err());

        assert!(engine.force_tick());
        assert_eq!(engine.grid().unwrap().size(), (2, 1));
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(load_simulation(&[1u8, 0][..]), Err(SaveError::Bincode(_))));
    }
}
