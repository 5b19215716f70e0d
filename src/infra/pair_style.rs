// ============================================================
// Layer 6 — Pair Style (MD host adapter)
// ============================================================
// The consumer side of an exported artifact. A molecular-dynamics
// host configures a pair style in two commands:
//
//   pair_style torch
//   pair_coeff * * model.pt <type1> ... <typeN>
//
// and then asks it for energy and forces each step. The type map
// translates host type k (1-based) into model type type_map[k-1].
//
// Arguments are bound by name, so the same adapter drives both
// the EnergyModel artifact (positions only) and the ZeroModel one
// (types, positions, edge_index).

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::{atoms::AtomSystem, position::{self, Position}};
use crate::script::{IntTensor, ScriptBackend, ScriptError, ScriptModule, ScriptTensor, ScriptValue};

#[derive(Debug, Error)]
pub enum PairError {
    #[error("Wrong number of arguments for `pair_style` command, should be `pair_style torch`.")]
    Settings,

    #[error(
        "Wrong number of arguments for `pair_coeff` command, should be \
         `pair_coeff * * <model>.pt <type1> <type2> ... <typeN>`."
    )]
    CoeffArgCount,

    #[error("Wrong numeric atom types for `pair_coeff` command, should be `pair_coeff * * ...`.")]
    CoeffWildcards,

    #[error("Expected integer parameter instead of '{0}' in `pair_coeff` command")]
    TypeId(String),

    #[error("Cannot load model '{path}': {reason}")]
    Load { path: String, reason: String },

    #[error("`pair_coeff` must be issued before compute")]
    NotConfigured,

    #[error("Atom type {0} has no entry in the type map")]
    UnknownType(usize),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Total energy plus one force per atom.
#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    pub energy: f32,
    pub forces: Vec<Position>,
}

pub struct PairStyle {
    module:   Option<ScriptModule<ScriptBackend>>,
    type_map: Vec<i64>,
    ntypes:   usize,
}

impl PairStyle {
    pub fn new(ntypes: usize) -> Self {
        Self { module: None, type_map: Vec::new(), ntypes }
    }

    /// `pair_style torch` takes no arguments.
    pub fn settings(&mut self, args: &[&str]) -> Result<(), PairError> {
        if !args.is_empty() {
            return Err(PairError::Settings);
        }
        Ok(())
    }

    /// `pair_coeff * * <model> <type1> ... <typeN>`
    pub fn coeff(&mut self, args: &[&str]) -> Result<(), PairError> {
        if args.len() != 3 + self.ntypes {
            return Err(PairError::CoeffArgCount);
        }
        if args[0] != "*" || args[1] != "*" {
            return Err(PairError::CoeffWildcards);
        }

        let type_map = args[3..].iter()
            .map(|a| a.parse::<i64>().map_err(|_| PairError::TypeId(a.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let module = ScriptModule::<ScriptBackend>::load(args[2], &Default::default())
            .map_err(|e| PairError::Load { path: args[2].to_string(), reason: format!("{e:#}") })?;

        tracing::info!("pair_coeff: loaded '{}' with type map {:?}", args[2], type_map);
        self.module   = Some(module);
        self.type_map = type_map;
        Ok(())
    }

    pub fn type_map(&self) -> &[i64] { &self.type_map }

    pub fn compute(&self, system: &AtomSystem) -> Result<PairResult, PairError> {
        let module = self.module.as_ref().ok_or(PairError::NotConfigured)?;
        let n      = system.atom_count();

        let types = system.types.iter()
            .map(|&t| {
                t.checked_sub(1)
                    .and_then(|k| self.type_map.get(k))
                    .copied()
                    .ok_or(PairError::UnknownType(t))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut args = BTreeMap::new();
        args.insert("types".to_string(), ScriptValue::Int(IntTensor::new(vec![n], types)));
        args.insert(
            "positions".to_string(),
            ScriptValue::Float(ScriptTensor::new(vec![n, 3], position::flatten(&system.positions))),
        );
        args.insert("edge_index".to_string(), ScriptValue::Int(edge_index(&system.neighbors)));

        let out = module.forward_named(&args)?;
        if out.forces.shape != [n, 3] {
            return Err(ScriptError::ShapeMismatch {
                name:     "forces".to_string(),
                expected: format!("[{n}, 3]"),
                found:    out.forces.shape,
            }
            .into());
        }
        let forces = out.forces.values
            .chunks(3)
            .map(|c| Position::new(c[0], c[1], c[2]))
            .collect();

        tracing::debug!("compute: {} atoms, {} pairs", n, system.neighbors.len());
        Ok(PairResult { energy: out.energy.values.iter().sum(), forces })
    }
}

/// Neighbour pairs `[E, 2]` as a `[2, E]` index tensor.
pub fn edge_index(pairs: &[(usize, usize)]) -> IntTensor {
    let sources = pairs.iter().map(|&(i, _)| i as i64);
    let targets = pairs.iter().map(|&(_, j)| j as i64);
    IntTensor::new(vec![2, pairs.len()], sources.chain(targets).collect())
}
