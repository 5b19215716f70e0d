use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::domain::position::Position;

/// Fixed-size collection of random positions, every coordinate in [0, 1).
pub struct PositionDataset {
    positions: Vec<Position>,
}

impl PositionDataset {
    pub fn new(positions: Vec<Position>) -> Self { Self { positions } }

    /// `len` uniformly random records. A seed makes the draw reproducible.
    pub fn random(len: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        let positions = (0..len)
            .map(|_| Position::new(rng.gen(), rng.gen(), rng.gen()))
            .collect();
        Self { positions }
    }

    pub fn positions(&self) -> &[Position] { &self.positions }
}

impl Dataset<Position> for PositionDataset {
    fn get(&self, index: usize) -> Option<Position> {
        self.positions.get(index).copied()
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}
