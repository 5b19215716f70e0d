// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal per use case:
//
//   example_use_case.rs    — train, test, checkpoint, reload,
//                            export, reload the artifact, run it
//   zero_model_use_case.rs — export the zero placeholder
//   run_use_case.rs        — run any artifact on random inputs
//   pair_use_case.rs       — drive an artifact through the MD
//                            host adapter
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1); use cases return reports
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

use burn::backend::ndarray::NdArrayDevice;

// Train → checkpoint → export → run
pub mod example_use_case;

// Placeholder export
pub mod zero_model_use_case;

// Artifact smoke run
pub mod run_use_case;

// Host adapter demo
pub mod pair_use_case;

/// Every use case runs on the CPU ndarray backend.
pub(crate) fn device() -> NdArrayDevice {
    NdArrayDevice::default()
}
