use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire policy module.
pub type Result<T> = std::result::Result<T, PolicyErr>;

/// The policy module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyErr {
    /// A tensor does not have the shape its position requires.
    ShapeMismatch {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    /// A tensor the architecture needs is not part of the parameters.
    MissingTensor { name: String },
    /// The architecture description itself is unusable.
    BadArch(String),
    /// The observation does not have the width the policy expects.
    Input { got: usize, expected: usize },
}

impl Display for PolicyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyErr::ShapeMismatch {
                name,
                got,
                expected,
            } => write!(
                f,
                "tensor {name} has shape {got:?} but {expected:?} was expected"
            ),
            PolicyErr::MissingTensor { name } => {
                write!(f, "the parameters do not contain the tensor {name}")
            }
            PolicyErr::BadArch(msg) => write!(f, "invalid policy architecture: {msg}"),
            PolicyErr::Input { got, expected } => write!(
                f,
                "the observation has {got} components but the policy expects {expected}"
            ),
        }
    }
}

impl Error for PolicyErr {}
