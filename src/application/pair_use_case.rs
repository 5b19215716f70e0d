// ============================================================
// Layer 2 — PairUseCase
// ============================================================
// Plays the MD host for one step:
//
//   pair_style torch
//   pair_coeff * * <artifact> <type map...>
//   compute()  on a small random atom system
//
// Atom types cycle 1..=ntypes, where ntypes is the length of
// the type map.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::{atoms::AtomSystem, position::Position};
use crate::infra::pair_style::{PairResult, PairStyle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub artifact: PathBuf,
    /// Model type id for host types 1, 2, ...
    pub type_map: Vec<String>,
    pub atoms:    usize,
    pub cutoff:   f32,
    pub seed:     Option<u64>,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            artifact: PathBuf::from("zero_model.pt"),
            type_map: vec!["1".to_string()],
            atoms:    4,
            cutoff:   1.0,
            seed:     None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PairReport {
    pub system: AtomSystem,
    pub result: PairResult,
}

pub struct PairUseCase {
    config: PairConfig,
}

impl PairUseCase {
    pub fn new(config: PairConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PairReport> {
        let cfg    = &self.config;
        let ntypes = cfg.type_map.len();
        let path   = cfg.artifact.to_str()
            .with_context(|| format!("Artifact path '{}' is not valid UTF-8", cfg.artifact.display()))?;

        let mut pair = PairStyle::new(ntypes);
        pair.settings(&[])?;

        let mut coeff = vec!["*", "*", path];
        coeff.extend(cfg.type_map.iter().map(String::as_str));
        pair.coeff(&coeff)?;

        let system = random_system(cfg.atoms, ntypes, cfg.cutoff, cfg.seed);
        let result = pair.compute(&system)?;
        tracing::info!("compute: energy={:.6} over {} atoms", result.energy, system.atom_count());

        Ok(PairReport { system, result })
    }
}

fn random_system(atoms: usize, ntypes: usize, cutoff: f32, seed: Option<u64>) -> AtomSystem {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };
    let types = (0..atoms).map(|i| i % ntypes.max(1) + 1).collect();
    let positions = (0..atoms)
        .map(|_| Position::new(rng.gen(), rng.gen(), rng.gen()))
        .collect();
    AtomSystem::new(types, positions, Vec::new()).with_neighbors_within(cutoff)
}
