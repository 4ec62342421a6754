use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use policy::PolicyErr;

/// The result type used in the entire export module.
pub type Result<T> = std::result::Result<T, ExportErr>;

/// The export module's error type. Any of these aborts the export attempt it came from.
#[derive(Debug)]
pub enum ExportErr {
    /// A tensor or array does not have the shape the architecture requires.
    ShapeMismatch {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    /// The parameters themselves are unusable for the requested architecture.
    Policy(PolicyErr),
    /// The caller gave a different number of variable names than there are tensors.
    NamingMismatch { names: usize, tensors: usize },
    /// An artifact does not reproduce the direct evaluation on the example input.
    TraceMismatch {
        backend: &'static str,
        max_diff: f32,
        tolerance: f32,
    },
    /// A value cannot be written as a literal.
    NonFinite { name: String, index: usize, value: f32 },
    /// An artifact could not be decoded.
    Format(String),
    Io(io::Error),
}

impl Display for ExportErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportErr::ShapeMismatch {
                name,
                got,
                expected,
            } => write!(
                f,
                "array {name} has shape {got:?} but {expected:?} was expected"
            ),
            ExportErr::Policy(e) => write!(f, "{e}"),
            ExportErr::NamingMismatch { names, tensors } => write!(
                f,
                "got {names} variable names for {tensors} tensors"
            ),
            ExportErr::TraceMismatch {
                backend,
                max_diff,
                tolerance,
            } => write!(
                f,
                "the {backend} artifact diverges from the policy by {max_diff}, more than {tolerance}"
            ),
            ExportErr::NonFinite { name, index, value } => {
                write!(f, "{name}[{index}] is {value}, which has no literal form")
            }
            ExportErr::Format(msg) => write!(f, "malformed artifact: {msg}"),
            ExportErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ExportErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExportErr::Policy(e) => Some(e),
            ExportErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PolicyErr> for ExportErr {
    fn from(e: PolicyErr) -> Self {
        match e {
            PolicyErr::ShapeMismatch {
                name,
                got,
                expected,
            } => ExportErr::ShapeMismatch {
                name,
                got,
                expected,
            },
            e => ExportErr::Policy(e),
        }
    }
}

impl From<io::Error> for ExportErr {
    fn from(e: io::Error) -> Self {
        ExportErr::Io(e)
    }
}

impl From<serde_json::Error> for ExportErr {
    fn from(e: serde_json::Error) -> Self {
        ExportErr::Format(e.to_string())
    }
}
