// ============================================================
// Layer 6 — Checkpoint
// ============================================================
// One file holds everything needed to rebuild a trained model:
//
//   {
//     "format":           "forcefield-checkpoint",
//     "version":          1,
//     "epoch":            1,
//     "global_step":      32,
//     "hyper_parameters": { "input_size": 3 },
//     "state_dict":       [ ...bytes... ]
//   }
//
// `state_dict` is the model record encoded by Burn's
// BinBytesRecorder at full precision, so parameters survive
// a save/load cycle bit for bit.
//
// Loading reads `hyper_parameters` first, builds a fresh model
// from them, then restores the weights with load_record().
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use std::{fs, path::Path};
use burn::{
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::domain::traits::Persistable;
use crate::ml::model::{EnergyModel, EnergyModelConfig, EnergyModelRecord};

const CHECKPOINT_FORMAT:  &str = "forcefield-checkpoint";
const CHECKPOINT_VERSION: u32  = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format:           String,
    pub version:          u32,
    pub epoch:            usize,
    pub global_step:      usize,
    pub hyper_parameters: EnergyModelConfig,
    pub state_dict:       Vec<u8>,
}

impl Checkpoint {
    /// Snapshot a model together with the trainer's progress counters.
    pub fn from_model<B: Backend>(
        model:       &EnergyModel<B>,
        epoch:       usize,
        global_step: usize,
    ) -> Result<Self> {
        let state_dict = BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(model.clone().into_record(), ())
            .context("Failed to encode model record")?;

        Ok(Self {
            format:           CHECKPOINT_FORMAT.to_string(),
            version:          CHECKPOINT_VERSION,
            epoch,
            global_step,
            hyper_parameters: model.config(),
            state_dict,
        })
    }

    /// Build a model from `hyper_parameters` and restore the saved weights.
    pub fn restore<B: Backend>(&self, device: &B::Device) -> Result<EnergyModel<B>> {
        let model: EnergyModel<B> = self.hyper_parameters.init(device);

        let record: EnergyModelRecord<B> = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(self.state_dict.clone(), device)
            .context("Checkpoint weights do not match the model architecture")?;

        Ok(model.load_record(record))
    }
}

impl Persistable for Checkpoint {
    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved checkpoint (epoch {}, step {}) to '{}'",
            self.epoch, self.global_step, path.display());
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

        let ckpt: Checkpoint = serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid checkpoint", path.display()))?;

        if ckpt.format != CHECKPOINT_FORMAT || ckpt.version != CHECKPOINT_VERSION {
            bail!(
                "Unsupported checkpoint '{}' (format '{}' v{})",
                path.display(), ckpt.format, ckpt.version
            );
        }
        Ok(ckpt)
    }
}
