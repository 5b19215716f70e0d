// ============================================================
// Script Layer — Export
// ============================================================
// Turns a live model into a ScriptArtifact.
//
//   GraphBuilder  records ops in order, each call returning the
//                 NodeId of the value it defines
//   Scriptable    implemented by every exportable model
//
// EnergyModel exports as
//
//   %0 = positions                      (requires_grad)
//   %1 = self.layer.weight  %2 = self.layer.bias
//   %3 = matmul(%0, %1)     %4 = add(%3, %2)          → energy
//   %5 = ones_like(%4)
//   %6 = grad([%4], [%0], grad_outputs=[%5])
//   %7 = neg(%6)                                      → forces
//
// so forces are recomputed by the runtime's own backward pass
// rather than baked in as a closed form.

use std::collections::BTreeMap;

use burn::prelude::*;

use crate::ml::{model::EnergyModel, zero_model::ZeroModel};
use crate::script::error::ScriptError;
use crate::script::graph::{
    InputSpec, Node, NodeId, Outputs, ScriptArtifact, ScriptTensor, ARTIFACT_FORMAT, ARTIFACT_VERSION,
};

/// Anything that can be exported to a self-contained artifact.
pub trait Scriptable {
    fn to_scripted(&self) -> Result<ScriptArtifact, ScriptError>;
}

pub struct GraphBuilder {
    name:       String,
    inputs:     Vec<InputSpec>,
    nodes:      Vec<Node>,
    state_dict: BTreeMap<String, ScriptTensor>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:       name.into(),
            inputs:     Vec::new(),
            nodes:      Vec::new(),
            state_dict: BTreeMap::new(),
        }
    }

    /// Append a positional parameter; returns its index.
    pub fn declare(&mut self, spec: InputSpec) -> usize {
        self.inputs.push(spec);
        self.inputs.len() - 1
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn input(&mut self, index: usize) -> NodeId {
        self.push(Node::Input { index })
    }

    /// Register a parameter tensor. Rank-1 tensors are stored as a
    /// single row so they broadcast over records.
    pub fn param(&mut self, name: impl Into<String>, mut tensor: ScriptTensor) -> NodeId {
        if tensor.shape.len() == 1 {
            tensor.shape.insert(0, 1);
        }
        let name = name.into();
        self.state_dict.insert(name.clone(), tensor);
        self.push(Node::Param { name })
    }

    pub fn zeros(&mut self, shape: Vec<usize>) -> NodeId {
        self.push(Node::Zeros { shape })
    }

    pub fn zeros_like(&mut self, of: NodeId) -> NodeId {
        self.push(Node::ZerosLike { of })
    }

    pub fn ones_like(&mut self, of: NodeId) -> NodeId {
        self.push(Node::OnesLike { of })
    }

    pub fn matmul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::MatMul { lhs, rhs })
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Add { lhs, rhs })
    }

    pub fn neg(&mut self, of: NodeId) -> NodeId {
        self.push(Node::Neg { of })
    }

    pub fn grad(&mut self, output: NodeId, input: NodeId, grad_output: NodeId) -> NodeId {
        self.push(Node::Grad { output, input, grad_output })
    }

    pub fn finish(self, energy: NodeId, forces: NodeId) -> Result<ScriptArtifact, ScriptError> {
        let artifact = ScriptArtifact {
            format:     ARTIFACT_FORMAT.to_string(),
            version:    ARTIFACT_VERSION,
            name:       self.name,
            inputs:     self.inputs,
            nodes:      self.nodes,
            outputs:    Outputs { energy, forces },
            state_dict: self.state_dict,
        };
        artifact.validate()?;
        Ok(artifact)
    }
}

fn snapshot<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<ScriptTensor, ScriptError> {
    let shape = tensor.dims().to_vec();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ScriptError::Tensor(format!("{e:?}")))?;
    Ok(ScriptTensor::new(shape, values))
}

impl<B: Backend> Scriptable for EnergyModel<B> {
    fn to_scripted(&self) -> Result<ScriptArtifact, ScriptError> {
        let mut g = GraphBuilder::new("EnergyModel");

        let idx = g.declare(
            InputSpec::float("positions", vec![None, Some(self.input_size)]).requires_grad(),
        );
        let x = g.input(idx);

        let w = g.param("layer.weight", snapshot(self.layer.weight.val())?);
        let mut energy = g.matmul(x, w);
        if let Some(bias) = &self.layer.bias {
            let b = g.param("layer.bias", snapshot(bias.val())?);
            energy = g.add(energy, b);
        }

        let seed   = g.ones_like(energy);
        let dedx   = g.grad(energy, x, seed);
        let forces = g.neg(dedx);

        g.finish(energy, forces)
    }
}

impl Scriptable for ZeroModel {
    fn to_scripted(&self) -> Result<ScriptArtifact, ScriptError> {
        let mut g = GraphBuilder::new("ZeroModel");

        g.declare(InputSpec::int("types", vec![None]));
        let pos = g.declare(InputSpec::float("positions", vec![None, Some(3)]));
        g.declare(InputSpec::int("edge_index", vec![Some(2), None]));
        g.declare(InputSpec::int("batch", vec![None]).optional());

        let positions = g.input(pos);
        let energy    = g.zeros(vec![1, 1]);
        let forces    = g.zeros_like(positions);

        g.finish(energy, forces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::ml::model::EnergyModelConfig;
    use crate::script::graph::ValueKind;

    type TestBackend = NdArray;

    #[test]
    fn test_energy_model_export_layout() {
        let device   = Default::default();
        let model    = EnergyModelConfig::new(3).init::<TestBackend>(&device);
        let artifact = model.to_scripted().unwrap();

        assert_eq!(artifact.name, "EnergyModel");
        assert_eq!(artifact.inputs.len(), 1);
        assert!(artifact.inputs[0].requires_grad);
        assert_eq!(artifact.state_dict["layer.weight"].shape, vec![3, 1]);
        assert_eq!(artifact.state_dict["layer.bias"].shape, vec![1, 1]);
        assert!(matches!(artifact.nodes[artifact.outputs.forces.0], Node::Neg { .. }));
        assert!(artifact.code().contains("grad("));
    }

    #[test]
    fn test_exported_weights_match_model() {
        let device   = Default::default();
        let model    = EnergyModelConfig::new(3).init::<TestBackend>(&device);
        let artifact = model.to_scripted().unwrap();

        let weight = model.layer.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(artifact.state_dict["layer.weight"].values, weight);
    }

    #[test]
    fn test_zero_model_calling_convention() {
        let artifact = ZeroModel::new().to_scripted().unwrap();
        let names: Vec<&str> = artifact.inputs.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["types", "positions", "edge_index", "batch"]);
        assert_eq!(artifact.inputs[0].kind, ValueKind::Int);
        assert!(artifact.inputs[3].optional);
        assert!(artifact.state_dict.is_empty());
    }

    #[test]
    fn test_builder_rejects_invalid_graph() {
        let mut g = GraphBuilder::new("Broken");
        let idx   = g.declare(InputSpec::float("x", vec![None, Some(3)]));
        let x     = g.input(idx);
        let seed  = g.ones_like(x);
        let dx    = g.grad(x, x, seed);

        assert_eq!(g.finish(x, dx), Err(ScriptError::GradientMissing { node: 2 }));
    }
}
