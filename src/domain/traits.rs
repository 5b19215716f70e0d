// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================

use anyhow::Result;
use std::path::Path;

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved to and restored from a single file.
///
/// Implementations:
///   - Checkpoint     → parameters + hyperparameters of a trained model
///   - ScriptArtifact → exported graph + parameter state dict
pub trait Persistable: Sized {
    /// Save this component's state to the given path
    fn save(&self, path: &Path) -> Result<()>;

    /// Load a component's state from the given path.
    fn load(path: &Path) -> Result<Self>;
}
