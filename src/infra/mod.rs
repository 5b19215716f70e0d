// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong to any one
// business layer:
//
//   checkpoint.rs — Checkpoint envelope: hyperparameters,
//                   counters and a BinBytesRecorder parameter
//                   record, stored as JSON so a model can be
//                   rebuilt before its weights are restored.
//
//   metrics.rs    — Per-epoch train/val loss appended to
//                   <log_dir>/metrics.csv.
//
//   pair_style.rs — MD host adapter: pair_style/pair_coeff
//                   argument handling, type map and compute()
//                   over an exported artifact.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Molecular-dynamics host adapter for exported artifacts
pub mod pair_style;
