// ============================================================
// Script Layer — Portable Artifacts
// ============================================================
// What's in this layer:
//
//   error.rs   — ScriptError, every way building or running an
//                artifact can fail
//
//   graph.rs   — ScriptArtifact: inputs, ordered op nodes, outputs
//                and state dict, plus static validation and the
//                readable code listing
//
//   trace.rs   — GraphBuilder and the Scriptable trait; exports
//                EnergyModel and ZeroModel
//
//   runtime.rs — ScriptModule: loads an artifact and runs it on an
//                autodiff backend, forces through a real backward pass

pub mod error;
pub mod graph;
pub mod runtime;
pub mod trace;

pub use error::ScriptError;
pub use graph::{InputSpec, IntTensor, ScriptArtifact, ScriptTensor, ScriptValue};
pub use runtime::{ScriptBackend, ScriptModule, ScriptOutput};
pub use trace::Scriptable;
