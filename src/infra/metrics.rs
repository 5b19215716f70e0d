// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: mean step loss over all training batches
//   - val_loss:   mean step loss over the validation feed
//
// Output file: <log_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_loss
//   1,0.412300,0.398100
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean of mean(energy) + mean(forces) over training batches
    pub train_loss: f64,

    /// Same loss over the validation feed
    pub val_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }
}

/// Running mean of per-batch losses.
#[derive(Debug, Default, Clone)]
pub struct LossAccumulator {
    total:   f64,
    batches: usize,
}

impl LossAccumulator {
    pub fn update(&mut self, loss: f64) {
        self.total   += loss;
        self.batches += 1;
    }

    pub fn batches(&self) -> usize { self.batches }

    /// NaN when no batch was seen.
    pub fn mean(&self) -> f64 {
        if self.batches == 0 { f64::NAN } else { self.total / self.batches as f64 }
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");

        // Header only for a new file, so runs append to one log
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.val_loss)?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_mean() {
        let mut acc = LossAccumulator::default();
        assert!(acc.mean().is_nan());
        acc.update(1.0);
        acc.update(3.0);
        assert_eq!(acc.batches(), 2);
        assert_eq!(acc.mean(), 2.0);
    }

    #[test]
    fn test_rows_are_appended() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 0.5, 0.25)).unwrap();

        // A second logger on the same dir keeps the existing rows
        let again = MetricsLogger::new(dir.path()).unwrap();
        again.log(&EpochMetrics::new(2, 0.4, 0.2)).unwrap();

        let csv = fs::read_to_string(again.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec![
            "epoch,train_loss,val_loss",
            "1,0.500000,0.250000",
            "2,0.400000,0.200000",
        ]);
    }
}
