use std::path::Path;

use anyhow::Result;
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::traits::Persistable;
use crate::infra::checkpoint::Checkpoint;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
/// Hyperparameters saved alongside the weights so a checkpoint
/// can rebuild the model before restoring its parameters.
#[derive(Config, Debug)]
pub struct EnergyModelConfig {
    pub input_size: usize,
}

impl EnergyModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EnergyModel<B> {
        let layer = LinearConfig::new(self.input_size, 1).init(device);
        EnergyModel { layer, input_size: self.input_size }
    }
}

/// Linear energy model: energy = x·W + b, forces = −∂energy/∂x.
#[derive(Module, Debug)]
pub struct EnergyModel<B: Backend> {
    pub layer:      Linear<B>,
    pub input_size: usize,
}

pub struct ModelOutput<B: Backend> {
    /// Shape: [N, 1]
    pub energy: Tensor<B, 2>,
    /// Shape: [N, input_size]
    pub forces: Tensor<B, 2>,
}

impl<B: Backend> EnergyModel<B> {
    pub fn config(&self) -> EnergyModelConfig {
        EnergyModelConfig::new(self.input_size)
    }

    /// positions: [N, input_size] → energy [N, 1], forces [N, input_size]
    pub fn forward(&self, positions: Tensor<B, 2>) -> ModelOutput<B> {
        let energy = self.layer.forward(positions);

        // Reverse pass seeded with a unit gradient per record.
        let grad_outputs = energy.ones_like();
        let forces = self.energy_backward(grad_outputs).neg();

        ModelOutput { energy, forces }
    }

    /// Vector-Jacobian product of the energy map with respect to its input.
    ///
    /// For energy = x·W + b the adjoint is g·Wᵀ. Built from ordinary tensor
    /// ops on W, so on an autodiff backend the result is itself
    /// differentiable with respect to the parameters.
    fn energy_backward(&self, grad_energy: Tensor<B, 2>) -> Tensor<B, 2> {
        grad_energy.matmul(self.layer.weight.val().transpose())
    }

    /// loss = mean(energy) + mean(forces), shared by every phase.
    pub fn common_step(&self, positions: Tensor<B, 2>) -> Tensor<B, 1> {
        let out = self.forward(positions);
        out.energy.mean() + out.forces.mean()
    }

    pub fn validation_step(&self, positions: Tensor<B, 2>) -> Tensor<B, 1> {
        self.common_step(positions)
    }

    pub fn test_step(&self, positions: Tensor<B, 2>) -> Tensor<B, 1> {
        self.common_step(positions)
    }

    /// Rebuild a model from a checkpoint file.
    pub fn load_from_checkpoint(path: impl AsRef<Path>, device: &B::Device) -> Result<Self> {
        Checkpoint::load(path.as_ref())?.restore(device)
    }
}

impl<B: AutodiffBackend> EnergyModel<B> {
    pub fn training_step(&self, positions: Tensor<B, 2>) -> Tensor<B, 1> {
        self.common_step(positions)
    }
}
