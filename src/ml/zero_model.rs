use burn::prelude::*;

/// Placeholder model: zero energy, zero forces, whatever the input.
///
/// Takes the full host calling convention (types, positions, edge index,
/// optional batch vector) but only reads the shape of `positions`. Used to
/// exercise the export pipeline end to end without a learned computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroModel;

impl ZeroModel {
    pub fn new() -> Self {
        Self
    }

    /// → (energy [1, 1], forces zeros_like(positions))
    pub fn forward<B: Backend>(
        &self,
        _types:      Tensor<B, 1, Int>,
        positions:   Tensor<B, 2>,
        _edge_index: Tensor<B, 2, Int>,
        _batch:      Option<Tensor<B, 1, Int>>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let energy = Tensor::<B, 2>::zeros([1, 1], &positions.device());
        let forces = positions.zeros_like();
        (energy, forces)
    }
}
