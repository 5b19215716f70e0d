// ============================================================
// Script Layer — Artifact Graph
// ============================================================
// The exported form of a model. Everything needed to run it
// lives in one serde document:
//
//   inputs      positional parameters of forward()
//   nodes       ops in topological order (operands always
//               point at earlier nodes)
//   outputs     which nodes are (energy, forces)
//   state_dict  parameter tensors by name
//
// Nothing in here refers back to a Rust model type, so an
// artifact can be loaded and executed by code that has never
// seen EnergyModel or ZeroModel.
//
// validate() is the static check run on every build and load.
// Its gradient rule mirrors what the runtime needs: a `grad`
// node must differentiate with respect to an input declared
// `requires_grad`, and its output must reach that input through
// differentiable ops. Otherwise the backward pass would find no
// gradient, and the artifact is rejected up front.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::traits::Persistable;
use crate::script::error::ScriptError;

pub const ARTIFACT_FORMAT:  &str = "forcefield-script";
pub const ARTIFACT_VERSION: u32  = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Float,
    Int,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Float => write!(f, "Float"),
            ValueKind::Int   => write!(f, "Int"),
        }
    }
}

/// One positional parameter of the exported forward().
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub kind: ValueKind,
    /// One entry per dimension; `None` accepts any size.
    pub dims: Vec<Option<usize>>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub requires_grad: bool,
}

impl InputSpec {
    pub fn float(name: impl Into<String>, dims: Vec<Option<usize>>) -> Self {
        Self { name: name.into(), kind: ValueKind::Float, dims, optional: false, requires_grad: false }
    }

    pub fn int(name: impl Into<String>, dims: Vec<Option<usize>>) -> Self {
        Self { name: name.into(), kind: ValueKind::Int, dims, optional: false, requires_grad: false }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn requires_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    pub fn accepts_shape(&self, shape: &[usize]) -> bool {
        shape.len() == self.dims.len()
            && self.dims.iter().zip(shape).all(|(d, &s)| d.map_or(true, |d| d == s))
    }

    /// "[*, 3]"
    pub fn shape_pattern(&self) -> String {
        let dims: Vec<String> = self.dims.iter()
            .map(|d| d.map_or_else(|| "*".to_string(), |d| d.to_string()))
            .collect();
        format!("[{}]", dims.join(", "))
    }
}

/// Dense row-major float tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptTensor {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

impl ScriptTensor {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_well_formed(&self) -> bool {
        self.numel() == self.values.len()
    }
}

impl fmt::Display for ScriptTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols = self.shape.last().copied().unwrap_or(1).max(1);
        let rows: Vec<String> = self.values
            .chunks(cols)
            .map(|row| {
                let cells: Vec<String> = row.iter().map(|v| format!("{v:.4}")).collect();
                format!("[{}]", cells.join(", "))
            })
            .collect();
        write!(f, "tensor([{}], shape={:?})", rows.join(",\n        "), self.shape)
    }
}

/// Dense row-major integer tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntTensor {
    pub shape:  Vec<usize>,
    pub values: Vec<i64>,
}

impl IntTensor {
    pub fn new(shape: Vec<usize>, values: Vec<i64>) -> Self {
        Self { shape, values }
    }
}

/// An argument to an exported forward().
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Float(ScriptTensor),
    Int(IntTensor),
    None,
}

impl ScriptValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScriptValue::Float(_) => "Float",
            ScriptValue::Int(_)   => "Int",
            ScriptValue::None     => "None",
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            ScriptValue::Float(t) => &t.shape,
            ScriptValue::Int(t)   => &t.shape,
            ScriptValue::None     => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Node {
    Input     { index: usize },
    Param     { name: String },
    Zeros     { shape: Vec<usize> },
    ZerosLike { of: NodeId },
    OnesLike  { of: NodeId },
    MatMul    { lhs: NodeId, rhs: NodeId },
    Add       { lhs: NodeId, rhs: NodeId },
    Neg       { of: NodeId },
    /// Reverse-mode gradient of `output` w.r.t. `input`, seeded by `grad_output`.
    Grad      { output: NodeId, input: NodeId, grad_output: NodeId },
}

impl Node {
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            Node::Input { .. } | Node::Param { .. } | Node::Zeros { .. } => Vec::new(),
            Node::ZerosLike { of } | Node::OnesLike { of } | Node::Neg { of } => vec![*of],
            Node::MatMul { lhs, rhs } | Node::Add { lhs, rhs } => vec![*lhs, *rhs],
            Node::Grad { output, input, grad_output } => vec![*output, *input, *grad_output],
        }
    }

    /// Operands through which gradients flow. Constants and gradient
    /// results are detached from the tape.
    fn differentiable_operands(&self) -> Vec<NodeId> {
        match self {
            Node::Neg { of } => vec![*of],
            Node::MatMul { lhs, rhs } | Node::Add { lhs, rhs } => vec![*lhs, *rhs],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    pub energy: NodeId,
    pub forces: NodeId,
}

/// A self-contained exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptArtifact {
    pub format:     String,
    pub version:    u32,
    pub name:       String,
    pub inputs:     Vec<InputSpec>,
    pub nodes:      Vec<Node>,
    pub outputs:    Outputs,
    pub state_dict: BTreeMap<String, ScriptTensor>,
}

impl ScriptArtifact {
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.format != ARTIFACT_FORMAT || self.version != ARTIFACT_VERSION {
            return Err(ScriptError::UnsupportedFormat {
                format:  self.format.clone(),
                version: self.version,
            });
        }

        for spec in &self.inputs {
            if spec.kind == ValueKind::Float && spec.dims.len() != 2 {
                return Err(ScriptError::InvalidGraph(format!(
                    "float input '{}' must be rank 2, declared {}", spec.name, spec.shape_pattern()
                )));
            }
        }

        for (name, tensor) in &self.state_dict {
            if tensor.shape.len() != 2 || !tensor.is_well_formed() {
                return Err(ScriptError::MalformedTensor {
                    name:  name.clone(),
                    shape: tensor.shape.clone(),
                    len:   tensor.values.len(),
                });
            }
        }

        for (id, node) in self.nodes.iter().enumerate() {
            if let Some(bad) = node.operands().into_iter().find(|op| op.0 >= id) {
                return Err(ScriptError::ForwardReference { node: id, operand: bad.0 });
            }

            match node {
                Node::Input { index } => {
                    let spec = self.inputs.get(*index).ok_or(ScriptError::UnknownInput {
                        node:     id,
                        index:    *index,
                        declared: self.inputs.len(),
                    })?;
                    if spec.kind != ValueKind::Float {
                        return Err(ScriptError::InvalidGraph(format!(
                            "node %{id} reads int input '{}'; only float inputs feed ops", spec.name
                        )));
                    }
                }
                Node::Param { name } => {
                    if !self.state_dict.contains_key(name) {
                        return Err(ScriptError::MissingParameter(name.clone()));
                    }
                }
                Node::Zeros { shape } => {
                    if shape.len() != 2 {
                        return Err(ScriptError::InvalidGraph(format!(
                            "node %{id}: zeros must be rank 2, got {shape:?}"
                        )));
                    }
                }
                Node::Grad { output, input, .. } => {
                    let tracked = match &self.nodes[input.0] {
                        Node::Input { index } => self.inputs[*index].requires_grad,
                        _ => false,
                    };
                    if !tracked || !self.reaches(*output, *input) {
                        return Err(ScriptError::GradientMissing { node: id });
                    }
                }
                _ => {}
            }
        }

        for out in [self.outputs.energy, self.outputs.forces] {
            if out.0 >= self.nodes.len() {
                return Err(ScriptError::InvalidGraph(format!("output {out} is not a node")));
            }
        }
        Ok(())
    }

    /// True when `from` depends on `target` through differentiable ops.
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen  = vec![false; self.nodes.len()];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            stack.extend(self.nodes[id.0].differentiable_operands());
        }
        false
    }

    /// Human-readable listing of the forward graph.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ScriptArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {} ({} v{})", self.name, self.format, self.version)?;
        writeln!(f, "def forward(self,")?;
        for spec in &self.inputs {
            let mut flags = Vec::new();
            if spec.optional { flags.push("optional"); }
            if spec.requires_grad { flags.push("requires_grad"); }
            let flags = if flags.is_empty() { String::new() } else { format!(" ({})", flags.join(", ")) };
            writeln!(f, "        {}: {}{}{},", spec.name, spec.kind, spec.shape_pattern(), flags)?;
        }
        writeln!(f, "    ):")?;

        for (id, node) in self.nodes.iter().enumerate() {
            let id = NodeId(id);
            match node {
                Node::Input { index } => writeln!(f, "    {id} = {}", self.inputs[*index].name)?,
                Node::Param { name } => {
                    let shape = self.state_dict.get(name).map(|t| t.shape.clone()).unwrap_or_default();
                    writeln!(f, "    {id} = self.{name}  # Float{shape:?}")?
                }
                Node::Zeros { shape }         => writeln!(f, "    {id} = zeros({shape:?})")?,
                Node::ZerosLike { of }        => writeln!(f, "    {id} = zeros_like({of})")?,
                Node::OnesLike { of }         => writeln!(f, "    {id} = ones_like({of})")?,
                Node::MatMul { lhs, rhs }     => writeln!(f, "    {id} = matmul({lhs}, {rhs})")?,
                Node::Add { lhs, rhs }        => writeln!(f, "    {id} = add({lhs}, {rhs})")?,
                Node::Neg { of }              => writeln!(f, "    {id} = neg({of})")?,
                Node::Grad { output, input, grad_output } => writeln!(
                    f, "    {id} = grad([{output}], [{input}], grad_outputs=[{grad_output}])"
                )?,
            }
        }
        write!(f, "    return ({}, {})", self.outputs.energy, self.outputs.forces)
    }
}

impl Persistable for ScriptArtifact {
    fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write artifact to '{}'", path.display()))?;
        tracing::debug!("Saved artifact '{}' to '{}'", self.name, path.display());
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read artifact '{}'", path.display()))?;
        let artifact: ScriptArtifact = serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid artifact", path.display()))?;
        artifact.validate()
            .with_context(|| format!("Artifact '{}' failed validation", path.display()))?;
        Ok(artifact)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// energy = x·W, forces = −grad(energy, x)
    fn linear_artifact(requires_grad: bool) -> ScriptArtifact {
        let mut positions = InputSpec::float("positions", vec![None, Some(3)]);
        positions.requires_grad = requires_grad;

        let mut state_dict = BTreeMap::new();
        state_dict.insert("w".to_string(), ScriptTensor::new(vec![3, 1], vec![1.0, 2.0, 3.0]));

        ScriptArtifact {
            format:  ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            name:    "Linear".to_string(),
            inputs:  vec![positions],
            nodes:   vec![
                Node::Input { index: 0 },
                Node::Param { name: "w".to_string() },
                Node::MatMul { lhs: NodeId(0), rhs: NodeId(1) },
                Node::OnesLike { of: NodeId(2) },
                Node::Grad { output: NodeId(2), input: NodeId(0), grad_output: NodeId(3) },
                Node::Neg { of: NodeId(4) },
            ],
            outputs: Outputs { energy: NodeId(2), forces: NodeId(5) },
            state_dict,
        }
    }

    #[test]
    fn test_valid_graph_passes() {
        assert_eq!(linear_artifact(true).validate(), Ok(()));
    }

    #[test]
    fn test_gradient_on_untracked_input_is_rejected() {
        assert_eq!(
            linear_artifact(false).validate(),
            Err(ScriptError::GradientMissing { node: 4 })
        );
    }

    #[test]
    fn test_gradient_of_unrelated_output_is_rejected() {
        let mut a = linear_artifact(true);
        a.nodes[2] = Node::Zeros { shape: vec![1, 1] };
        assert_eq!(a.validate(), Err(ScriptError::GradientMissing { node: 4 }));
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let mut a = linear_artifact(true);
        a.nodes[2] = Node::MatMul { lhs: NodeId(0), rhs: NodeId(3) };
        assert_eq!(a.validate(), Err(ScriptError::ForwardReference { node: 2, operand: 3 }));
    }

    #[test]
    fn test_missing_parameter_is_rejected() {
        let mut a = linear_artifact(true);
        a.state_dict.clear();
        assert_eq!(a.validate(), Err(ScriptError::MissingParameter("w".to_string())));
    }

    #[test]
    fn test_malformed_parameter_is_rejected() {
        let mut a = linear_artifact(true);
        a.state_dict.insert("w".to_string(), ScriptTensor::new(vec![3, 1], vec![1.0]));
        assert!(matches!(a.validate(), Err(ScriptError::MalformedTensor { .. })));
    }

    #[test]
    fn test_int_input_cannot_feed_ops() {
        let mut a = linear_artifact(true);
        a.inputs[0].kind = ValueKind::Int;
        assert!(matches!(a.validate(), Err(ScriptError::InvalidGraph(_))));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut a = linear_artifact(true);
        a.version = 99;
        assert!(matches!(a.validate(), Err(ScriptError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_code_lists_every_node() {
        let code = linear_artifact(true).code();
        assert!(code.contains("positions: Float[*, 3] (requires_grad)"));
        assert!(code.contains("%4 = grad([%2], [%0], grad_outputs=[%3])"));
        assert!(code.ends_with("return (%2, %5)"));
        assert!(!code.contains("create_graph"));
    }

    #[test]
    fn test_unknown_op_is_not_loaded() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.pt");
        let mut json = serde_json::to_value(linear_artifact(true)).unwrap();
        json["nodes"][1] = serde_json::json!({ "op": "transpose", "of": 0 });
        std::fs::write(&path, json.to_string()).unwrap();

        assert!(ScriptArtifact::load(&path).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pt");
        let a    = linear_artifact(true);

        a.save(&path).unwrap();
        assert_eq!(ScriptArtifact::load(&path).unwrap(), a);
    }

    #[test]
    fn test_invalid_artifact_is_not_saved() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pt");
        assert!(linear_artifact(false).save(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_input_shape_matching() {
        let spec = InputSpec::float("positions", vec![None, Some(3)]);
        assert!(spec.accepts_shape(&[7, 3]));
        assert!(!spec.accepts_shape(&[7, 4]));
        assert!(!spec.accepts_shape(&[21]));
        assert_eq!(spec.shape_pattern(), "[*, 3]");
    }
}
