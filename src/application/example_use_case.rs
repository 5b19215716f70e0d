// ============================================================
// Layer 2 — ExampleUseCase
// ============================================================
// The end-to-end pipeline, in order:
//
//   Step 1: Build the data module             (Layer 4 - data)
//   Step 2: Fit the energy model              (Layer 5 - ml)
//   Step 3: Test it                           (Layer 5 - ml)
//   Step 4: Save model.ckpt                   (Layer 6 - infra)
//   Step 5: Reload from the checkpoint        (Layer 5 - ml)
//   Step 6: Export and save model.pt          (script)
//   Step 7: Reload the artifact, run it on a
//           fresh random batch of 2 records   (script)
//
// Reference: Burn Book §5 (Training)

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::device;
use crate::data::{
    dataset::PositionDataset,
    datamodule::{DataModuleConfig, PositionDataModule},
};
use crate::domain::{position::{self, POSITION_DIM}, traits::Persistable};
use crate::ml::{
    model::{EnergyModel, EnergyModelConfig},
    trainer::{Trainer, TrainerConfig},
    InferBackend, TrainBackend,
};
use crate::script::{ScriptBackend, ScriptModule, ScriptOutput, ScriptTensor, ScriptValue, Scriptable};

pub const CHECKPOINT_FILE: &str = "model.ckpt";
pub const ARTIFACT_FILE:   &str = "model.pt";

/// Records fed to the reloaded artifact
const SAMPLE_SIZE: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleConfig {
    pub output_dir:        PathBuf,
    pub dataset_size:      usize,
    pub batch_size:        usize,
    pub num_workers:       usize,
    pub shuffle:           Option<u64>,
    pub seed:              Option<u64>,
    pub max_epochs:        usize,
    pub learning_rate:     f64,
    pub inference_mode:    bool,
    pub log_every_n_steps: usize,
    pub log_dir:           Option<PathBuf>,
}

impl Default for ExampleConfig {
    fn default() -> Self {
        let data    = DataModuleConfig::default();
        let trainer = TrainerConfig::default();
        Self {
            output_dir:        PathBuf::from("."),
            dataset_size:      data.dataset_size,
            batch_size:        data.batch_size,
            num_workers:       data.num_workers,
            shuffle:           data.shuffle,
            seed:              data.seed,
            max_epochs:        trainer.max_epochs,
            learning_rate:     trainer.learning_rate,
            inference_mode:    trainer.inference_mode,
            log_every_n_steps: trainer.log_every_n_steps,
            log_dir:           trainer.log_dir,
        }
    }
}

impl ExampleConfig {
    fn data(&self) -> DataModuleConfig {
        DataModuleConfig {
            dataset_size: self.dataset_size,
            batch_size:   self.batch_size,
            num_workers:  self.num_workers,
            shuffle:      self.shuffle,
            seed:         self.seed,
        }
    }

    fn trainer(&self) -> TrainerConfig {
        TrainerConfig {
            max_epochs:        self.max_epochs,
            learning_rate:     self.learning_rate,
            inference_mode:    self.inference_mode,
            log_every_n_steps: self.log_every_n_steps,
            log_dir:           self.log_dir.clone(),
        }
    }
}

/// Everything the pipeline produced, for the CLI to show.
#[derive(Debug, Clone)]
pub struct ExampleReport {
    pub test_loss:       f64,
    pub checkpoint_path: PathBuf,
    pub artifact_path:   PathBuf,
    pub state_dict:      BTreeMap<String, ScriptTensor>,
    pub sample:          ScriptTensor,
    pub output:          ScriptOutput,
    pub code:            String,
}

pub struct ExampleUseCase {
    config: ExampleConfig,
}

impl ExampleUseCase {
    pub fn new(config: ExampleConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ExampleReport> {
        let cfg    = &self.config;
        let device = device();

        fs::create_dir_all(&cfg.output_dir)
            .with_context(|| format!("Cannot create '{}'", cfg.output_dir.display()))?;
        let checkpoint_path = cfg.output_dir.join(CHECKPOINT_FILE);
        let artifact_path   = cfg.output_dir.join(ARTIFACT_FILE);

        // ── Steps 1-3: fit and test ──────────────────────────────────────────
        let mut data    = PositionDataModule::new(cfg.data());
        let mut trainer = Trainer::<TrainBackend>::new(cfg.trainer(), device.clone());
        let model       = EnergyModelConfig::new(POSITION_DIM).init::<TrainBackend>(&device);

        let model     = trainer.fit(model, &mut data)?;
        let test_loss = trainer.test(&model, &mut data)?;

        // ── Steps 4-5: checkpoint round trip ─────────────────────────────────
        trainer.save_checkpoint(&model, &checkpoint_path)?;
        let reloaded = EnergyModel::<InferBackend>::load_from_checkpoint(&checkpoint_path, &device)
            .context("Reloading the checkpoint failed")?;

        // ── Step 6: export ───────────────────────────────────────────────────
        let artifact = reloaded.to_scripted()?;
        artifact.save(&artifact_path)?;
        tracing::info!("Artifact saved to '{}'", artifact_path.display());

        // ── Step 7: reload and run ───────────────────────────────────────────
        let module = ScriptModule::<ScriptBackend>::load(&artifact_path, &device)?;
        let sample = PositionDataset::random(SAMPLE_SIZE, cfg.seed.map(|s| s.wrapping_add(1)));
        let sample = ScriptTensor::new(vec![SAMPLE_SIZE, POSITION_DIM], position::flatten(sample.positions()));
        let output = module.forward(&[ScriptValue::Float(sample.clone())])?;

        tracing::info!("Artifact run: energy {:?}, forces {:?}", output.energy.shape, output.forces.shape);

        Ok(ExampleReport {
            test_loss,
            checkpoint_path,
            artifact_path,
            state_dict: module.state_dict().clone(),
            sample,
            output,
            code: module.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExampleConfig {
            output_dir: dir.path().to_path_buf(),
            log_dir:    Some(dir.path().join("logs")),
            seed:       Some(5),
            ..ExampleConfig::default()
        };

        let report = ExampleUseCase::new(config).execute().unwrap();

        assert!(report.checkpoint_path.exists());
        assert!(report.artifact_path.exists());
        assert!(report.test_loss.is_finite());
        assert_eq!(report.sample.shape, vec![2, 3]);
        assert_eq!(report.output.energy.shape, vec![2, 1]);
        assert_eq!(report.output.forces.shape, vec![2, 3]);
        assert!(report.state_dict.contains_key("layer.weight"));
        assert!(report.code.contains("grad("));

        // One epoch over 1000 records
        let csv = fs::read_to_string(dir.path().join("logs").join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_artifact_forces_are_negated_weights() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExampleConfig {
            output_dir:   dir.path().to_path_buf(),
            log_dir:      None,
            dataset_size: 64,
            num_workers:  0,
            ..ExampleConfig::default()
        };

        let report = ExampleUseCase::new(config).execute().unwrap();
        let w = &report.state_dict["layer.weight"].values;
        for row in report.output.forces.values.chunks(3) {
            for (f, w) in row.iter().zip(w) {
                assert!((f + w).abs() < 1e-6);
            }
        }
    }
}
