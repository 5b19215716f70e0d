// ============================================================
// Layer 4 — Position Data Module
// ============================================================
// Owns the dataset and hands out the three data feeds the
// trainer asks for:
//
//   train_dataloader()  ─┐
//   val_dataloader()    ─┼──▶ the SAME Arc<PositionDataset>
//   test_dataloader()   ─┘
//
// There is no train/val/test split: every feed iterates the
// one dataset built by the last `setup()` call. `setup()`
// regenerates the data each time it is called, so the dataset
// seen by `fit` and the one seen by `test` differ.
//
// Worker threads only change how batches are prefetched, never
// the values inside them.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::sync::Arc;

use anyhow::{bail, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{PositionBatch, PositionBatcher},
    dataset::PositionDataset,
};

/// Which phase of a run a data module is being prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Fit,
    Validate,
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataModuleConfig {
    /// Records generated per `setup()`
    pub dataset_size: usize,

    /// Records per batch
    pub batch_size: usize,

    /// Background loader threads; 0 loads on the calling thread
    pub num_workers: usize,

    /// Shuffle seed for the loaders; `None` keeps dataset order
    pub shuffle: Option<u64>,

    /// Seed for dataset generation; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for DataModuleConfig {
    fn default() -> Self {
        Self {
            dataset_size: 1000,
            batch_size:   32,
            num_workers:  7,
            shuffle:      None,
            seed:         None,
        }
    }
}

pub struct PositionDataModule {
    config:  DataModuleConfig,
    dataset: Option<Arc<PositionDataset>>,
    setups:  u64,
}

impl PositionDataModule {
    pub fn new(config: DataModuleConfig) -> Self {
        Self { config, dataset: None, setups: 0 }
    }

    pub fn config(&self) -> &DataModuleConfig { &self.config }

    /// Build a fresh dataset. Every feed served afterwards shares it.
    pub fn setup(&mut self, stage: Stage) {
        // Offset the seed per call so repeated setups still differ
        // while staying reproducible.
        let seed = self.config.seed.map(|s| s.wrapping_add(self.setups));
        self.setups += 1;

        let dataset = PositionDataset::random(self.config.dataset_size, seed);
        tracing::debug!("setup({:?}): {} records", stage, dataset.positions().len());
        self.dataset = Some(Arc::new(dataset));
    }

    /// The dataset built by the last `setup()`.
    pub fn dataset(&self) -> Result<Arc<PositionDataset>> {
        match &self.dataset {
            Some(ds) => Ok(ds.clone()),
            None     => bail!("data module has no dataset; call setup() first"),
        }
    }

    pub fn train_dataloader<B: Backend>(&self) -> Result<Arc<dyn DataLoader<B, PositionBatch<B>>>> {
        self.build_loader()
    }

    pub fn val_dataloader<B: Backend>(&self) -> Result<Arc<dyn DataLoader<B, PositionBatch<B>>>> {
        self.build_loader()
    }

    pub fn test_dataloader<B: Backend>(&self) -> Result<Arc<dyn DataLoader<B, PositionBatch<B>>>> {
        self.build_loader()
    }

    /// Feed for an evaluation stage.
    pub fn dataloader<B: Backend>(&self, stage: Stage) -> Result<Arc<dyn DataLoader<B, PositionBatch<B>>>> {
        match stage {
            Stage::Fit      => self.train_dataloader(),
            Stage::Validate => self.val_dataloader(),
            Stage::Test     => self.test_dataloader(),
        }
    }

    fn build_loader<B: Backend>(&self) -> Result<Arc<dyn DataLoader<B, PositionBatch<B>>>> {
        let dataset = self.dataset()?;

        let mut builder = DataLoaderBuilder::new(PositionBatcher::<B>::new())
            .batch_size(self.config.batch_size);
        if let Some(seed) = self.config.shuffle {
            builder = builder.shuffle(seed);
        }
        if self.config.num_workers > 0 {
            builder = builder.num_workers(self.config.num_workers);
        }

        Ok(builder.build(dataset))
    }
}
