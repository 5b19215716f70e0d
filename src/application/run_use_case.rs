// ============================================================
// Layer 2 — RunUseCase
// ============================================================
// Loads any artifact and runs it once on random inputs built
// from its declared signature:
//
//   float [*, k]   → N random records of width k in [0, 1)
//   types          → every atom type 1
//   edge_index     → all ordered pairs of distinct atoms
//   optional       → left out
//
// Anything else it cannot stand in for is an error.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::application::device;
use crate::infra::pair_style::edge_index;
use crate::script::{
    graph::ValueKind, InputSpec, IntTensor, ScriptBackend, ScriptModule, ScriptOutput, ScriptTensor,
    ScriptValue,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub artifact: PathBuf,
    pub atoms:    usize,
    pub seed:     Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { artifact: PathBuf::from("model.pt"), atoms: 2, seed: None }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub name:   String,
    pub inputs: BTreeMap<String, ScriptValue>,
    pub output: ScriptOutput,
}

pub struct RunUseCase {
    config: RunConfig,
}

impl RunUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<RunReport> {
        let cfg    = &self.config;
        let module = ScriptModule::<ScriptBackend>::load(&cfg.artifact, &device())?;
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };

        let mut inputs = BTreeMap::new();
        for spec in module.inputs() {
            if let Some(value) = stand_in(spec, cfg.atoms, &mut rng)? {
                inputs.insert(spec.name.clone(), value);
            }
        }

        let output = module.forward_named(&inputs)?;
        tracing::info!(
            "Ran '{}' on {} atoms: energy {:?}, forces {:?}",
            module.artifact().name, cfg.atoms, output.energy.shape, output.forces.shape,
        );

        Ok(RunReport { name: module.artifact().name.clone(), inputs, output })
    }
}

fn stand_in(spec: &InputSpec, n: usize, rng: &mut StdRng) -> Result<Option<ScriptValue>> {
    let value = match (spec.kind, spec.name.as_str()) {
        (ValueKind::Float, _) => {
            let width  = spec.dims.get(1).copied().flatten().unwrap_or(3);
            let values = (0..n * width).map(|_| rng.gen::<f32>()).collect();
            ScriptValue::Float(ScriptTensor::new(vec![n, width], values))
        }
        (ValueKind::Int, "types") => ScriptValue::Int(IntTensor::new(vec![n], vec![1; n])),
        (ValueKind::Int, "edge_index") => {
            let pairs: Vec<(usize, usize)> = (0..n)
                .flat_map(|i| (0..n).map(move |j| (i, j)))
                .filter(|(i, j)| i != j)
                .collect();
            ScriptValue::Int(edge_index(&pairs))
        }
        _ if spec.optional => return Ok(None),
        _ => bail!("No stand-in for required input '{}' {}", spec.name, spec.shape_pattern()),
    };
    Ok(Some(value))
}
