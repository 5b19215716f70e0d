// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// What's in this layer:
//
//   model.rs      — EnergyModel: linear energy head whose forces
//                   come from a reverse-mode adjoint pass, plus the
//                   shared step loss
//
//   zero_model.rs — ZeroModel: placeholder returning zero energy
//                   and zero forces under the host calling convention
//
//   trainer.rs    — fit / test / save_checkpoint
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

use burn::backend::{Autodiff, NdArray};

/// Backend used for training (gradients enabled)
pub type TrainBackend = Autodiff<NdArray>;

/// Backend used for checkpoint reload and plain inference
pub type InferBackend = NdArray;

/// Linear energy model and its step logic
pub mod model;

/// Zero-output placeholder model
pub mod zero_model;

/// Epoch loop, evaluation and checkpointing
pub mod trainer;
