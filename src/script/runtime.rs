// ============================================================
// Script Layer — Runtime
// ============================================================
// Executes a ScriptArtifact on a burn autodiff backend.
//
//   bind     check each argument against its InputSpec and turn
//            float arguments into tensors; tracked inputs get a
//            fresh require_grad() copy, the caller's data is never
//            touched
//   eval     walk the nodes in order, one tensor per node
//   grad     backward from sum(output · grad_output), then read the
//            input's gradient off the tape; an untracked input has
//            no gradient and yields GradientMissing
//
// Int arguments (types, edge_index, batch) are checked for kind
// and shape only. No op reads them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use burn::{
    backend::{Autodiff, NdArray},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::traits::Persistable;
use crate::script::error::ScriptError;
use crate::script::graph::{InputSpec, Node, ScriptArtifact, ScriptTensor, ScriptValue, ValueKind};

/// Backend artifacts run on by default.
pub type ScriptBackend = Autodiff<NdArray>;

/// (energy, forces) as plain host tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutput {
    pub energy: ScriptTensor,
    pub forces: ScriptTensor,
}

/// A loaded artifact, parameters already on the device.
pub struct ScriptModule<B: AutodiffBackend = ScriptBackend> {
    artifact: ScriptArtifact,
    params:   BTreeMap<String, Tensor<B, 2>>,
    device:   B::Device,
}

impl<B: AutodiffBackend> ScriptModule<B> {
    pub fn new(artifact: ScriptArtifact, device: &B::Device) -> Result<Self, ScriptError> {
        artifact.validate()?;

        let params = artifact.state_dict.iter()
            .map(|(name, t)| {
                let data = TensorData::new(t.values.clone(), [t.shape[0], t.shape[1]]);
                (name.clone(), Tensor::<B, 2>::from_data(data, device))
            })
            .collect();

        Ok(Self { artifact, params, device: device.clone() })
    }

    pub fn load(path: impl AsRef<Path>, device: &B::Device) -> Result<Self> {
        let path     = path.as_ref();
        let artifact = ScriptArtifact::load(path)?;
        tracing::debug!("Loaded artifact '{}' from '{}'", artifact.name, path.display());
        Ok(Self::new(artifact, device)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.artifact.save(path.as_ref())
    }

    pub fn artifact(&self) -> &ScriptArtifact { &self.artifact }

    pub fn inputs(&self) -> &[InputSpec] { &self.artifact.inputs }

    pub fn state_dict(&self) -> &BTreeMap<String, ScriptTensor> { &self.artifact.state_dict }

    pub fn code(&self) -> String { self.artifact.code() }

    /// Positional call. Trailing optional arguments may be left out.
    pub fn forward(&self, args: &[ScriptValue]) -> Result<ScriptOutput, ScriptError> {
        let declared = self.artifact.inputs.len();
        if args.len() > declared {
            return Err(ScriptError::TooManyArguments { expected: declared, found: args.len() });
        }

        let mut bound: Vec<Option<Tensor<B, 2>>> = Vec::with_capacity(declared);
        for (i, spec) in self.artifact.inputs.iter().enumerate() {
            bound.push(self.bind(spec, args.get(i).unwrap_or(&ScriptValue::None))?);
        }

        let values = self.eval(&bound)?;
        let out    = &self.artifact.outputs;
        Ok(ScriptOutput {
            energy: to_host(values[out.energy.0].clone())?,
            forces: to_host(values[out.forces.0].clone())?,
        })
    }

    /// Call by parameter name; names the artifact does not declare are ignored.
    pub fn forward_named(&self, args: &BTreeMap<String, ScriptValue>) -> Result<ScriptOutput, ScriptError> {
        let positional: Vec<ScriptValue> = self.artifact.inputs.iter()
            .map(|spec| args.get(&spec.name).cloned().unwrap_or(ScriptValue::None))
            .collect();
        self.forward(&positional)
    }

    fn bind(&self, spec: &InputSpec, value: &ScriptValue) -> Result<Option<Tensor<B, 2>>, ScriptError> {
        let mismatch = || ScriptError::TypeMismatch {
            name:     spec.name.clone(),
            expected: spec.kind.to_string(),
            found:    value.kind_name().to_string(),
        };

        match (spec.kind, value) {
            (_, ScriptValue::None) if spec.optional => Ok(None),
            (_, ScriptValue::None) => Err(ScriptError::MissingArgument(spec.name.clone())),
            (ValueKind::Int, ScriptValue::Int(t)) => {
                self.check_shape(spec, &t.shape, t.values.len())?;
                Ok(None)
            }
            (ValueKind::Float, ScriptValue::Float(t)) => {
                self.check_shape(spec, &t.shape, t.values.len())?;
                let data   = TensorData::new(t.values.clone(), [t.shape[0], t.shape[1]]);
                let tensor = Tensor::<B, 2>::from_data(data, &self.device);
                Ok(Some(if spec.requires_grad { tensor.require_grad() } else { tensor }))
            }
            _ => Err(mismatch()),
        }
    }

    fn check_shape(&self, spec: &InputSpec, shape: &[usize], len: usize) -> Result<(), ScriptError> {
        if shape.iter().product::<usize>() != len {
            return Err(ScriptError::MalformedTensor {
                name:  spec.name.clone(),
                shape: shape.to_vec(),
                len,
            });
        }
        if !spec.accepts_shape(shape) {
            return Err(ScriptError::ShapeMismatch {
                name:     spec.name.clone(),
                expected: spec.shape_pattern(),
                found:    shape.to_vec(),
            });
        }
        Ok(())
    }

    fn eval(&self, bound: &[Option<Tensor<B, 2>>]) -> Result<Vec<Tensor<B, 2>>, ScriptError> {
        let mut values: Vec<Tensor<B, 2>> = Vec::with_capacity(self.artifact.nodes.len());

        for (id, node) in self.artifact.nodes.iter().enumerate() {
            let value = match node {
                Node::Input { index } => bound[*index].clone().ok_or_else(|| {
                    ScriptError::MissingArgument(self.artifact.inputs[*index].name.clone())
                })?,
                Node::Param { name } => self.params.get(name).cloned()
                    .ok_or_else(|| ScriptError::MissingParameter(name.clone()))?,
                Node::Zeros { shape } => Tensor::zeros([shape[0], shape[1]], &self.device),
                Node::ZerosLike { of } => values[of.0].zeros_like(),
                Node::OnesLike { of }  => values[of.0].ones_like(),
                Node::Neg { of }       => values[of.0].clone().neg(),
                Node::MatMul { lhs, rhs } => {
                    let (l, r) = (&values[lhs.0], &values[rhs.0]);
                    if l.dims()[1] != r.dims()[0] {
                        return Err(ScriptError::InvalidGraph(format!(
                            "node %{id}: cannot matmul {:?} by {:?}", l.dims(), r.dims()
                        )));
                    }
                    l.clone().matmul(r.clone())
                }
                Node::Add { lhs, rhs } => {
                    let (l, r) = (&values[lhs.0], &values[rhs.0]);
                    if !broadcastable(l.dims(), r.dims()) {
                        return Err(ScriptError::InvalidGraph(format!(
                            "node %{id}: cannot add {:?} and {:?}", l.dims(), r.dims()
                        )));
                    }
                    l.clone() + r.clone()
                }
                Node::Grad { output, input, grad_output } => {
                    let (out, seed) = (&values[output.0], &values[grad_output.0]);
                    if !broadcastable(out.dims(), seed.dims()) {
                        return Err(ScriptError::InvalidGraph(format!(
                            "node %{id}: grad_output {:?} does not fit output {:?}", seed.dims(), out.dims()
                        )));
                    }
                    let seeded = out.clone() * seed.clone();
                    let grads  = seeded.sum().backward();
                    let grad   = values[input.0].grad(&grads)
                        .ok_or(ScriptError::GradientMissing { node: id })?;
                    Tensor::from_inner(grad)
                }
            };
            values.push(value);
        }
        Ok(values)
    }
}

fn broadcastable(a: [usize; 2], b: [usize; 2]) -> bool {
    a.iter().zip(b.iter()).all(|(&x, &y)| x == y || x == 1 || y == 1)
}

fn to_host<B: Backend>(tensor: Tensor<B, 2>) -> Result<ScriptTensor, ScriptError> {
    let shape  = tensor.dims().to_vec();
    let values = tensor.into_data().convert::<f32>().to_vec::<f32>()
        .map_err(|e| ScriptError::Tensor(format!("{e:?}")))?;
    Ok(ScriptTensor::new(shape, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::ml::{model::EnergyModelConfig, zero_model::ZeroModel};
    use crate::script::graph::IntTensor;
    use crate::script::trace::{GraphBuilder, Scriptable};

    fn positions(n: usize) -> ScriptValue {
        let values = (0..n * 3).map(|i| (i as f32 * 0.37).sin()).collect();
        ScriptValue::Float(ScriptTensor::new(vec![n, 3], values))
    }

    fn zero_args(n: usize, with_batch: bool) -> Vec<ScriptValue> {
        let mut args = vec![
            ScriptValue::Int(IntTensor::new(vec![n], vec![1; n])),
            positions(n),
            ScriptValue::Int(IntTensor::new(vec![2, 4], vec![0, 1, 1, 0, 1, 0, 0, 1])),
        ];
        if with_batch {
            args.push(ScriptValue::Int(IntTensor::new(vec![n], vec![0; n])));
        }
        args
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }
    }

    #[test]
    fn test_energy_artifact_matches_live_model() {
        let device = Default::default();
        let model  = EnergyModelConfig::new(3).init::<NdArray>(&device);
        let module = ScriptModule::<ScriptBackend>::new(model.to_scripted().unwrap(), &device).unwrap();

        for n in [1usize, 2, 17] {
            let ScriptValue::Float(input) = positions(n) else { unreachable!() };
            let x    = Tensor::<NdArray, 2>::from_data(TensorData::new(input.values.clone(), [n, 3]), &device);
            let live = model.forward(x);
            let out  = module.forward(&[ScriptValue::Float(input)]).unwrap();

            assert_eq!(out.energy.shape, vec![n, 1]);
            assert_eq!(out.forces.shape, vec![n, 3]);
            assert_close(&out.energy.values, &live.energy.into_data().to_vec::<f32>().unwrap());
            assert_close(&out.forces.values, &live.forces.into_data().to_vec::<f32>().unwrap());
        }
    }

    #[test]
    fn test_forces_are_negated_weights() {
        let device = Default::default();
        let model  = EnergyModelConfig::new(3).init::<NdArray>(&device);
        let module = ScriptModule::<ScriptBackend>::new(model.to_scripted().unwrap(), &device).unwrap();
        let w      = module.state_dict()["layer.weight"].values.clone();

        let out = module.forward(&[positions(2)]).unwrap();
        for row in out.forces.values.chunks(3) {
            let neg: Vec<f32> = w.iter().map(|v| -v).collect();
            assert_close(row, &neg);
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = dir.path().join("model.pt");
        let device = Default::default();
        let model  = EnergyModelConfig::new(3).init::<NdArray>(&device);

        let module = ScriptModule::<ScriptBackend>::new(model.to_scripted().unwrap(), &device).unwrap();
        module.save(&path).unwrap();
        let reloaded = ScriptModule::<ScriptBackend>::load(&path, &device).unwrap();

        assert_eq!(reloaded.artifact(), module.artifact());
        assert_eq!(
            reloaded.forward(&[positions(4)]).unwrap(),
            module.forward(&[positions(4)]).unwrap(),
        );
    }

    #[test]
    fn test_zero_artifact_outputs_zeros() {
        let device = Default::default();
        let module = ScriptModule::<ScriptBackend>::new(ZeroModel::new().to_scripted().unwrap(), &device).unwrap();

        for with_batch in [false, true] {
            let out = module.forward(&zero_args(5, with_batch)).unwrap();
            assert_eq!(out.energy, ScriptTensor::new(vec![1, 1], vec![0.0]));
            assert_eq!(out.forces, ScriptTensor::new(vec![5, 3], vec![0.0; 15]));
        }
    }

    #[test]
    fn test_named_call_ignores_unknown_names() {
        let device = Default::default();
        let module = ScriptModule::<ScriptBackend>::new(ZeroModel::new().to_scripted().unwrap(), &device).unwrap();

        let mut args: BTreeMap<String, ScriptValue> = ["types", "positions", "edge_index"]
            .into_iter()
            .map(String::from)
            .zip(zero_args(2, false))
            .collect();
        args.insert("charges".to_string(), positions(2));

        let out = module.forward_named(&args).unwrap();
        assert_eq!(out.forces.shape, vec![2, 3]);
    }

    #[test]
    fn test_argument_errors() {
        let device = Default::default();
        let model  = EnergyModelConfig::new(3).init::<NdArray>(&device);
        let module = ScriptModule::<ScriptBackend>::new(model.to_scripted().unwrap(), &device).unwrap();

        assert_eq!(
            module.forward(&[]),
            Err(ScriptError::MissingArgument("positions".to_string())),
        );
        assert_eq!(
            module.forward(&[positions(2), positions(2)]),
            Err(ScriptError::TooManyArguments { expected: 1, found: 2 }),
        );
        assert!(matches!(
            module.forward(&[ScriptValue::Float(ScriptTensor::new(vec![2, 4], vec![0.0; 8]))]),
            Err(ScriptError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            module.forward(&[ScriptValue::Int(IntTensor::new(vec![2, 3], vec![0; 6]))]),
            Err(ScriptError::TypeMismatch { .. })
        ));
        assert!(matches!(
            module.forward(&[ScriptValue::Float(ScriptTensor::new(vec![2, 3], vec![0.0; 5]))]),
            Err(ScriptError::MalformedTensor { .. })
        ));
    }

    #[test]
    fn test_mismatched_grad_seed_is_an_error() {
        let device = Default::default();
        let mut g  = GraphBuilder::new("BadSeed");
        let idx    = g.declare(InputSpec::float("positions", vec![None, Some(3)]).requires_grad());
        let x      = g.input(idx);
        let w      = g.param("w", ScriptTensor::new(vec![3, 1], vec![1.0, 2.0, 3.0]));
        let energy = g.matmul(x, w);
        let seed   = g.zeros(vec![2, 2]);
        let dedx   = g.grad(energy, x, seed);
        let forces = g.neg(dedx);

        let module = ScriptModule::<ScriptBackend>::new(g.finish(energy, forces).unwrap(), &device).unwrap();
        assert!(matches!(
            module.forward(&[positions(3)]),
            Err(ScriptError::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_caller_data_is_unchanged() {
        let device = Default::default();
        let model  = EnergyModelConfig::new(3).init::<NdArray>(&device);
        let module = ScriptModule::<ScriptBackend>::new(model.to_scripted().unwrap(), &device).unwrap();

        let args   = vec![positions(3)];
        let before = args.clone();
        module.forward(&args).unwrap();
        assert_eq!(args, before);
    }
}
