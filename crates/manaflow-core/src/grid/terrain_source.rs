//! Terrain sources - the tile layers a grid is resolved from

use std::collections::HashSet;

use crate::components::{GridCoord, TerrainKind, TerrainLayer};

/// Answers whether a tile layer has a tile at a world coordinate
pub trait TerrainSource {
    fn has_feature(&self, layer: TerrainLayer, coord: GridCoord) -> bool;
}

impl<F> TerrainSource for F
where
    F: Fn(TerrainLayer, GridCoord) -> bool,
{
    fn has_feature(&self, layer: TerrainLayer, coord: GridCoord) -> bool {
        self(layer, coord)
    }
}

/// Resolve a coordinate to a terrain kind. Wall > ManaSource > Ground > Empty.
pub fn resolve_terrain<S: TerrainSource + ?Sized>(source: &S, coord: GridCoord) -> TerrainKind {
    TerrainLayer::RESOLUTION_ORDER
        .iter()
        .find(|layer| source.has_feature(**layer, coord))
        .map(|layer| layer.terrain())
        .unwrap_or(TerrainKind::Empty)
}

/// In-memory tile layers, one coordinate set per layer
#[derive(Debug, Clone, Default)]
pub struct TerrainLayers {
    walls: HashSet<GridCoord>,
    mana_sources: HashSet<GridCoord>,
    ground: HashSet<GridCoord>,
}

impl TerrainLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a character map.
    ///
    /// `#` is a wall, `~` a mana pool, `.` bare ground; any other character
    /// leaves the tile empty. Walls and pools also get a ground tile beneath
    /// them so the ground layer spans the whole drawn area. Line `n` is
    /// `y = origin.y + n` and column `m` is `x = origin.x + m`.
    pub fn from_ascii(map: &str, origin: GridCoord) -> Self {
        let mut layers = Self::new();
        for (row, line) in map.lines().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let coord = origin.offset(col as i32, row as i32);
                match ch {
                    '#' => {
                        layers.insert(TerrainLayer::Wall, coord);
                        layers.insert(TerrainLayer::Ground, coord);
                    }
                    '~' => {
                        layers.insert(TerrainLayer::ManaSource, coord);
                        layers.insert(TerrainLayer::Ground, coord);
                    }
                    '.' => {
                        layers.insert(TerrainLayer::Ground, coord);
                    }
                    _ => {}
                }
            }
        }
        layers
    }

    pub fn insert(&mut self, layer: TerrainLayer, coord: GridCoord) {
        self.layer_mut(layer).insert(coord);
    }

    pub fn remove(&mut self, layer: TerrainLayer, coord: GridCoord) -> bool {
        self.layer_mut(layer).remove(&coord)
    }

    pub fn layer(&self, layer: TerrainLayer) -> &HashSet<GridCoord> {
        match layer {
            TerrainLayer::Wall => &self.walls,
            TerrainLayer::ManaSource => &self.mana_sources,
            TerrainLayer::Ground => &self.ground,
        }
    }

    fn layer_mut(&mut self, layer: TerrainLayer) -> &mut HashSet<GridCoord> {
        match layer {
            TerrainLayer::Wall => &mut self.walls,
            TerrainLayer::ManaSource => &mut self.mana_sources,
            TerrainLayer::Ground => &mut self.ground,
        }
    }

    /// Bottom-left corner and (width, height) of the ground layer's bounding box
    pub fn ground_bounds(&self) -> Option<(GridCoord, i32, i32)> {
        let min_x = self.ground.iter().map(|c| c.x).min()?;
        let max_x = self.ground.iter().map(|c| c.x).max()?;
        let min_y = self.ground.iter().map(|c| c.y).min()?;
        let max_y = self.ground.iter().map(|c| c.y).max()?;
        Some((
            GridCoord::new(min_x, min_y),
            max_x - min_x + 1,
            max_y - min_y + 1,
        ))
    }
}

impl TerrainSource for TerrainLayers {
    fn has_feature(&self, layer: TerrainLayer, coord: GridCoord) -> bool {
        self.layer(layer).contains(&coord)
    }
}
