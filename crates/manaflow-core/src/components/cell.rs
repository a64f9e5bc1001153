//! A single grid cell: terrain, diffusivity and mana.

use super::mana::{ManaBounds, ManaState};
use super::terrain::{DiffusivityTable, GridCoord, TerrainKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    coordinates: GridCoord,
    terrain: TerrainKind,
    diffusivity: f32,
    pub(crate) mana: ManaState,
}

impl Cell {
    pub fn new(
        coordinates: GridCoord,
        terrain: TerrainKind,
        diffusivity: &DiffusivityTable,
        bounds: ManaBounds,
    ) -> Self {
        Self {
            coordinates,
            terrain,
            diffusivity: diffusivity.for_terrain(terrain),
            mana: ManaState::new(bounds),
        }
    }

    /// World coordinate of this cell
    pub fn coordinates(&self) -> GridCoord {
        self.coordinates
    }

    pub fn terrain(&self) -> TerrainKind {
        self.terrain
    }

    pub fn diffusivity(&self) -> f32 {
        self.diffusivity
    }

    pub fn mana(&self) -> &ManaState {
        &self.mana
    }

    pub fn is_mana_source(&self) -> bool {
        self.terrain.is_mana_source()
    }

    pub fn is_walkable(&self) -> bool {
        self.terrain.is_walkable()
    }

    /// Cells with no diffusivity neither give nor take mana.
    ///
    /// Decided by diffusivity, not terrain: walls conduct under the default
    /// table and are only blocked with [`DiffusivityTable::blocking_walls`].
    pub fn is_mana_blocked(&self) -> bool {
        self.diffusivity <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_derives_from_terrain() {
        let table = DiffusivityTable::default();
        let cell = Cell::new(
            GridCoord::new(3, -2),
            TerrainKind::ManaSource,
            &table,
            ManaBounds::default(),
        );
        assert_eq!(cell.coordinates(), GridCoord::new(3, -2));
        assert_eq!(cell.diffusivity(), 2.0);
        assert!(cell.is_mana_source());
        assert!(cell.is_walkable());
        assert!(!cell.is_mana_blocked());
        assert_eq!(cell.mana().current(), 0.0);
    }

    #[test]
    fn test_blocking_wall_cell() {
        let cell = Cell::new(
            GridCoord::ZERO,
            TerrainKind::Wall,
            &DiffusivityTable::blocking_walls(),
            ManaBounds::default(),
        );
        assert!(cell.is_mana_blocked());
        assert!(!cell.is_mana_source());
    }

    #[test]
    fn test_default_wall_is_not_blocked() {
        let cell = Cell::new(
            GridCoord::ZERO,
            TerrainKind::Wall,
            &DiffusivityTable::default(),
            ManaBounds::default(),
        );
        assert!(!cell.is_mana_blocked());
        assert!(!cell.is_walkable());
    }
}
