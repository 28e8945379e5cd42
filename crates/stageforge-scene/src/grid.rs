//! Collision grid descriptor
//!
//! Each collision group partitions its triangles into an axis-aligned 2D grid
//! on the X/Z plane (Y is up and is ignored by the partition). The runtime
//! uses the grid for O(1) broad-phase lookups, so the descriptor is written
//! verbatim into the group's collision header.

use serde::{Deserialize, Serialize};
use stageforge_core::math::{UVec2, Vec2};

/// Axis-aligned 2D uniform grid over the X/Z plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionGrid {
    /// World-space X/Z of the grid's minimum corner
    pub start: Vec2,
    /// Per-axis cell size
    pub step: Vec2,
    /// Per-axis cell count
    pub step_count: UVec2,
}

impl CollisionGrid {
    pub fn new(start: Vec2, step: Vec2, step_count: UVec2) -> Self {
        Self {
            start,
            step,
            step_count,
        }
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.step_count.x as usize * self.step_count.y as usize
    }
}

impl Default for CollisionGrid {
    /// The conventional whole-stage grid: 512x512 units centered on the
    /// origin, 16x16 cells
    fn default() -> Self {
        Self {
            start: Vec2::new(-256.0, -256.0),
            step: Vec2::new(32.0, 32.0),
            step_count: UVec2::new(16, 16),
        }
    }
}
