// ============================================================
// Layer 4 — Position Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<Position>
// into a single [batch_size, 3] tensor.
//
//   Input:  N positions
//   Output: PositionBatch with positions of shape [N, 3]
//
// Row i of the tensor is item i of the input, so batch order
// always follows the order the DataLoader handed us.
//
// Reference: Burn Book §4 (Batcher)

use std::marker::PhantomData;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::position::{flatten, Position, POSITION_DIM};

/// A batch of positions ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct PositionBatch<B: Backend> {
    /// Shape: [batch_size, 3]
    pub positions: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct PositionBatcher<B: Backend> {
    _backend: PhantomData<B>,
}

impl<B: Backend> PositionBatcher<B> {
    pub fn new() -> Self {
        Self { _backend: PhantomData }
    }
}

impl<B: Backend> Default for PositionBatcher<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Batcher<B, Position, PositionBatch<B>> for PositionBatcher<B> {
    fn batch(&self, items: Vec<Position>, device: &B::Device) -> PositionBatch<B> {
        PositionBatch { positions: positions_tensor(&items, device) }
    }
}

/// Build a [N, 3] float tensor from records.
pub fn positions_tensor<B: Backend>(items: &[Position], device: &B::Device) -> Tensor<B, 2> {
    let data = TensorData::new(flatten(items), [items.len(), POSITION_DIM]);
    Tensor::<B, 2>::from_data(data, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shape_and_order() {
        let device  = Default::default();
        let batcher = PositionBatcher::<TestBackend>::new();
        let items   = vec![Position::new(0.1, 0.2, 0.3), Position::new(0.4, 0.5, 0.6)];

        let batch = batcher.batch(items, &device);
        assert_eq!(batch.positions.dims(), [2, 3]);

        let values = batch.positions.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }
}
