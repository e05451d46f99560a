use std::fmt;

use worldspace_common::Location;

/// A 2D cell coordinate in the region grid (ignoring Y axis for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Identifies one independently ticking region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    pub world: String,
    pub cell: CellCoord,
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{},{}]", self.world, self.cell.x, self.cell.z)
    }
}

/// Fixed-size grid mapping world positions to regions.
#[derive(Debug, Clone)]
pub struct RegionPartition {
    cell_size: f32,
}

impl RegionPartition {
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        Self { cell_size }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert a world position to a cell coordinate.
    pub fn position_to_cell(&self, pos: glam::Vec3) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    pub fn region_of(&self, location: &Location) -> RegionKey {
        RegionKey {
            world: location.world.clone(),
            cell: self.position_to_cell(location.position),
        }
    }
}
