// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From random numbers to tensor batches:
//
//   PositionDataset     → N random 3-D records, Burn Dataset
//       │
//       ▼
//   PositionBatcher     → stacks records into [batch, 3] tensors
//       │
//       ▼
//   PositionDataModule  → train / val / test DataLoaders
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Synthetic dataset of random positions
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Owns the dataset and builds the three data feeds
pub mod datamodule;
