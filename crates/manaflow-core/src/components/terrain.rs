//! Terrain classification and per-terrain material properties.

use serde::{Deserialize, Serialize};

/// Integer tile coordinate in world (tile-layer) space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Terrain category of a single cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    #[default]
    Empty,
    Ground,
    Wall,
    ManaSource,
}

impl TerrainKind {
    pub fn is_mana_source(&self) -> bool {
        matches!(self, TerrainKind::ManaSource)
    }

    /// Creatures can stand on ground and mana pools
    pub fn is_walkable(&self) -> bool {
        matches!(self, TerrainKind::Ground | TerrainKind::ManaSource)
    }
}

/// A tile layer a terrain source can be queried for.
///
/// `RESOLUTION_ORDER` is the priority used when several layers overlap
/// at one coordinate; the first layer that reports a feature wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainLayer {
    Wall,
    ManaSource,
    Ground,
}

impl TerrainLayer {
    pub const RESOLUTION_ORDER: [TerrainLayer; 3] =
        [TerrainLayer::Wall, TerrainLayer::ManaSource, TerrainLayer::Ground];

    pub fn terrain(&self) -> TerrainKind {
        match self {
            TerrainLayer::Wall => TerrainKind::Wall,
            TerrainLayer::ManaSource => TerrainKind::ManaSource,
            TerrainLayer::Ground => TerrainKind::Ground,
        }
    }
}

/// Diffusivity assigned to each terrain kind when a cell is built.
///
/// Walls default to 1.0 so mana passes through them. Use
/// [`DiffusivityTable::blocking_walls`] for walls that halt flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusivityTable {
    pub empty: f32,
    pub ground: f32,
    pub wall: f32,
    pub mana_source: f32,
}

impl DiffusivityTable {
    pub fn blocking_walls() -> Self {
        Self {
            wall: 0.0,
            ..Self::default()
        }
    }

    /// Diffusivity for a terrain kind, never negative
    pub fn for_terrain(&self, terrain: TerrainKind) -> f32 {
        let value = match terrain {
            TerrainKind::Empty => self.empty,
            TerrainKind::Ground => self.ground,
            TerrainKind::Wall => self.wall,
            TerrainKind::ManaSource => self.mana_source,
        };
        value.max(0.0)
    }
}

impl Default for DiffusivityTable {
    fn default() -> Self {
        Self {
            empty: 1.2,
            ground: 0.01,
            wall: 1.0,
            mana_source: 2.0,
        }
    }
}
