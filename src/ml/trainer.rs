// ============================================================
// Layer 5 — Trainer
// ============================================================
// Drives epochs over the data module's feeds:
//
//   fit()   → setup(Fit), then per epoch:
//               train feed:  step loss → backward → one Adam update per batch
//               val feed:    step loss only
//   test()  → setup(Test), test feed: step loss only
//   save_checkpoint() → parameters + hyperparameters + counters
//
// Evaluation and gradients:
//   inference_mode = true  → evaluate model.valid() on the inner
//                            backend, no autodiff tape at all
//   inference_mode = false → evaluate the autodiff model itself,
//                            gradient tracking stays on
//   Forces come from the model's adjoint pass, so both settings
//   give the same loss values.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::PositionBatch,
    datamodule::{PositionDataModule, Stage},
};
use crate::domain::traits::Persistable;
use crate::infra::{
    checkpoint::Checkpoint,
    metrics::{EpochMetrics, LossAccumulator, MetricsLogger},
};
use crate::ml::model::EnergyModel;

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub max_epochs:        usize,
    pub learning_rate:     f64,
    pub inference_mode:    bool,
    pub log_every_n_steps: usize,
    /// Where metrics.csv goes; `None` disables the CSV
    pub log_dir:           Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epochs:        1,
            learning_rate:     1e-3,
            inference_mode:    false,
            log_every_n_steps: 50,
            log_dir:           Some(PathBuf::from("logs")),
        }
    }
}

pub struct Trainer<B: AutodiffBackend> {
    config:        TrainerConfig,
    device:        B::Device,
    current_epoch: usize,
    global_step:   usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainerConfig, device: B::Device) -> Self {
        Self { config, device, current_epoch: 0, global_step: 0 }
    }

    pub fn current_epoch(&self) -> usize { self.current_epoch }

    pub fn global_step(&self) -> usize { self.global_step }

    /// Train for `max_epochs`, validating after each one.
    pub fn fit(
        &mut self,
        mut model: EnergyModel<B>,
        data:      &mut PositionDataModule,
    ) -> Result<EnergyModel<B>> {
        data.setup(Stage::Fit);
        let train_loader = data.train_dataloader::<B>()?;
        let metrics = match &self.config.log_dir {
            Some(dir) => Some(MetricsLogger::new(dir)?),
            None      => None,
        };

        // θ ← θ − lr · m̂ / (√v̂ + ε)
        let mut optim = AdamConfig::new().init();

        tracing::info!(
            "Fitting for {} epoch(s), lr={}, batch_size={}",
            self.config.max_epochs, self.config.learning_rate, data.config().batch_size,
        );

        for _ in 0..self.config.max_epochs {
            self.current_epoch += 1;
            let mut train_loss = LossAccumulator::default();

            for batch in train_loader.iter() {
                let loss = model.training_step(batch.positions);
                train_loss.update(loss.clone().into_scalar().elem::<f64>());

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(self.config.learning_rate, model, grads);

                self.global_step += 1;
                if self.config.log_every_n_steps > 0
                    && self.global_step % self.config.log_every_n_steps == 0
                {
                    tracing::info!("step {:>5} | train_loss={:.4}", self.global_step, train_loss.mean());
                }
            }

            let val_loss = self.evaluate(&model, data, Stage::Validate)?;
            let epoch    = EpochMetrics::new(self.current_epoch, train_loss.mean(), val_loss);

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4}",
                epoch.epoch, self.config.max_epochs, epoch.train_loss, epoch.val_loss,
            );
            if let Some(logger) = &metrics {
                logger.log(&epoch)?;
            }
        }

        Ok(model)
    }

    /// Mean test loss; parameters are left untouched.
    pub fn test(&self, model: &EnergyModel<B>, data: &mut PositionDataModule) -> Result<f64> {
        data.setup(Stage::Test);
        let loss = self.evaluate(model, data, Stage::Test)?;
        tracing::info!("test_loss={:.4}", loss);
        Ok(loss)
    }

    /// Write the current parameters, hyperparameters and counters.
    pub fn save_checkpoint(&self, model: &EnergyModel<B>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        Checkpoint::from_model(model, self.current_epoch, self.global_step)?.save(path)?;
        tracing::info!("Checkpoint saved to '{}'", path.display());
        Ok(())
    }

    fn evaluate(&self, model: &EnergyModel<B>, data: &PositionDataModule, stage: Stage) -> Result<f64> {
        if self.config.inference_mode {
            let valid = model.valid();
            let loader = data.dataloader::<B::InnerBackend>(stage)?;
            Ok(eval_loop(&valid, loader, stage))
        } else {
            let loader = data.dataloader::<B>(stage)?;
            Ok(eval_loop(model, loader, stage))
        }
    }

    pub fn device(&self) -> &B::Device { &self.device }
}

fn eval_loop<EB: Backend>(
    model:  &EnergyModel<EB>,
    loader: Arc<dyn DataLoader<EB, PositionBatch<EB>>>,
    stage:  Stage,
) -> f64 {
    let mut acc = LossAccumulator::default();
    for batch in loader.iter() {
        let loss = match stage {
            Stage::Test => model.test_step(batch.positions),
            _           => model.validation_step(batch.positions),
        };
        acc.update(loss.into_scalar().elem::<f64>());
    }
    tracing::debug!("{:?}: {} batches", stage, acc.batches());
    acc.mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

    use crate::data::datamodule::DataModuleConfig;
    use crate::ml::model::EnergyModelConfig;

    type TestBackend = Autodiff<NdArray>;

    fn data() -> PositionDataModule {
        PositionDataModule::new(DataModuleConfig {
            dataset_size: 96,
            batch_size:   32,
            num_workers:  0,
            shuffle:      None,
            seed:         Some(11),
        })
    }

    fn config(inference_mode: bool) -> TrainerConfig {
        TrainerConfig { inference_mode, log_dir: None, ..TrainerConfig::default() }
    }

    fn params<B: Backend>(model: &EnergyModel<B>) -> Vec<f32> {
        model.layer.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_fit_updates_parameters_once_per_batch() {
        let device  = Default::default();
        let mut dm  = data();
        let mut tr  = Trainer::<TestBackend>::new(config(false), device);
        let model   = EnergyModelConfig::new(3).init::<TestBackend>(tr.device());
        let before  = params(&model);

        let model = tr.fit(model, &mut dm).unwrap();

        assert_ne!(before, params(&model));
        assert_eq!(tr.current_epoch(), 1);
        // 96 records / 32 per batch
        assert_eq!(tr.global_step(), 3);
    }

    #[test]
    fn test_evaluation_does_not_update_parameters() {
        let device = Default::default();
        let mut dm = data();
        let tr     = Trainer::<TestBackend>::new(config(false), device);
        let model  = EnergyModelConfig::new(3).init::<TestBackend>(tr.device());
        let before = params(&model);

        let loss = tr.test(&model, &mut dm).unwrap();
        assert!(loss.is_finite());
        assert_eq!(before, params(&model));
    }

    #[test]
    fn test_inference_mode_gives_same_loss() {
        let device = Default::default();
        let mut dm = data();
        dm.setup(Stage::Validate);

        let model   = EnergyModelConfig::new(3).init::<TestBackend>(&device);
        let tracked = Trainer::<TestBackend>::new(config(false), device.clone())
            .evaluate(&model, &dm, Stage::Validate).unwrap();
        let plain   = Trainer::<TestBackend>::new(config(true), device.clone())
            .evaluate(&model, &dm, Stage::Validate).unwrap();

        assert!((tracked - plain).abs() < 1e-6);
    }

    #[test]
    fn test_metrics_csv_written_per_epoch() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mut dm = data();
        let cfg    = TrainerConfig {
            max_epochs: 2,
            log_dir:    Some(dir.path().to_path_buf()),
            ..TrainerConfig::default()
        };
        let mut tr = Trainer::<TestBackend>::new(cfg, device);
        let model  = EnergyModelConfig::new(3).init::<TestBackend>(tr.device());
        tr.fit(model, &mut dm).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_checkpoint_after_fit_reloads() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = dir.path().join("model.ckpt");
        let device: NdArrayDevice = Default::default();
        let mut dm = data();
        let mut tr = Trainer::<TestBackend>::new(config(false), device.clone());
        let model  = EnergyModelConfig::new(3).init::<TestBackend>(tr.device());
        let model  = tr.fit(model, &mut dm).unwrap();

        tr.save_checkpoint(&model, &path).unwrap();
        let ckpt = Checkpoint::load(&path).unwrap();
        assert_eq!(ckpt.global_step, 3);

        let reloaded = EnergyModel::<NdArray>::load_from_checkpoint(&path, &device).unwrap();
        assert_eq!(params(&model.valid()), params(&reloaded));
    }
}
