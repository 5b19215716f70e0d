// ============================================================
// Layer 3 — Position Domain Type
// ============================================================
// One record of the synthetic dataset: a point in 3-D space.
// Records are generated once and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Number of spatial dimensions of a record
pub const POSITION_DIM: usize = 3;

/// A 3-D position (x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub [f32; POSITION_DIM]);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self([x, y, z])
    }

    pub fn coords(&self) -> &[f32; POSITION_DIM] {
        &self.0
    }
}

impl From<[f32; POSITION_DIM]> for Position {
    fn from(coords: [f32; POSITION_DIM]) -> Self {
        Self(coords)
    }
}

/// Flatten records row-major into a `[n * 3]` buffer,
/// the layout every tensor constructor in this crate expects.
pub fn flatten(positions: &[Position]) -> Vec<f32> {
    positions.iter().flat_map(|p| p.0).collect()
}
