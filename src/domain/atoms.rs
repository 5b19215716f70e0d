// ============================================================
// Layer 3 — AtomSystem Domain Type
// ============================================================
// What a molecular-dynamics host hands to a pair style each step:
//   - one 1-based atom type per atom (host numbering)
//   - one position per atom
//   - the neighbour list as (i, j) index pairs
//
// Example:
//   types:     [1, 2, 2]
//   positions: [[0,0,0], [1,0,0], [0,1,0]]
//   neighbors: [(0,1), (1,0), (0,2), (2,0)]

use serde::{Deserialize, Serialize};

use crate::domain::position::Position;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomSystem {
    /// Host atom types, 1-based
    pub types: Vec<usize>,

    /// One position per atom, same order as `types`
    pub positions: Vec<Position>,

    /// Directed neighbour pairs (i, j), indices into `positions`
    pub neighbors: Vec<(usize, usize)>,
}

impl AtomSystem {
    pub fn new(types: Vec<usize>, positions: Vec<Position>, neighbors: Vec<(usize, usize)>) -> Self {
        Self { types, positions, neighbors }
    }

    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }

    /// Every ordered pair of distinct atoms closer than `cutoff`.
    pub fn with_neighbors_within(mut self, cutoff: f32) -> Self {
        let n = self.positions.len();
        let cutoff_sq = cutoff * cutoff;
        self.neighbors = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .filter(|&(i, j)| i != j)
            .filter(|&(i, j)| {
                let a = self.positions[i].0;
                let b = self.positions[j].0;
                let d2: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                d2 < cutoff_sq
            })
            .collect();
        self
    }
}
