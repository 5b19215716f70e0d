use thiserror::Error;

/// Failures while building, validating or running a scripted artifact.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("unsupported artifact format '{format}' v{version}")]
    UnsupportedFormat { format: String, version: u32 },

    #[error("node %{node} reads %{operand}, which is not defined before it")]
    ForwardReference { node: usize, operand: usize },

    #[error("node %{node} reads input #{index}, but only {declared} inputs are declared")]
    UnknownInput { node: usize, index: usize, declared: usize },

    #[error("parameter '{0}' is not in the state dict")]
    MissingParameter(String),

    #[error("tensor '{name}' has shape {shape:?} but holds {len} values")]
    MalformedTensor { name: String, shape: Vec<usize>, len: usize },

    #[error("node %{node}: gradient is undefined (input not tracked or not reachable from the output)")]
    GradientMissing { node: usize },

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("argument '{name}': expected {expected}, got {found}")]
    TypeMismatch { name: String, expected: String, found: String },

    #[error("argument '{name}': expected shape {expected}, got {found:?}")]
    ShapeMismatch { name: String, expected: String, found: Vec<usize> },

    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("expected at most {expected} arguments, got {found}")]
    TooManyArguments { expected: usize, found: usize },

    #[error("tensor conversion failed: {0}")]
    Tensor(String),
}
