// ============================================================
// Layer 2 — ZeroModelUseCase
// ============================================================
// Exports the zero placeholder so a host can be wired up and
// tested before any real model exists.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::traits::Persistable;
use crate::ml::zero_model::ZeroModel;
use crate::script::{InputSpec, Scriptable};

pub const ZERO_ARTIFACT_FILE: &str = "zero_model.pt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroModelConfig {
    pub output: PathBuf,
}

impl Default for ZeroModelConfig {
    fn default() -> Self {
        Self { output: PathBuf::from(ZERO_ARTIFACT_FILE) }
    }
}

#[derive(Debug, Clone)]
pub struct ZeroModelReport {
    pub path:   PathBuf,
    pub inputs: Vec<InputSpec>,
    pub code:   String,
}

pub struct ZeroModelUseCase {
    config: ZeroModelConfig,
}

impl ZeroModelUseCase {
    pub fn new(config: ZeroModelConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ZeroModelReport> {
        let path = &self.config.output;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let artifact = ZeroModel::new().to_scripted()?;
        artifact.save(path)?;
        tracing::info!("Zero model saved to '{}'", path.display());

        Ok(ZeroModelReport {
            path:   path.clone(),
            inputs: artifact.inputs.clone(),
            code:   artifact.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptArtifact;

    #[test]
    fn test_zero_model_is_written() {
        let dir    = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join(ZERO_ARTIFACT_FILE);

        let report = ZeroModelUseCase::new(ZeroModelConfig { output: output.clone() }).execute().unwrap();

        assert_eq!(report.path, output);
        assert_eq!(report.inputs.len(), 4);
        let artifact = ScriptArtifact::load(&output).unwrap();
        assert_eq!(artifact.name, "ZeroModel");
        assert!(report.code.contains("zeros_like("));
    }
}
