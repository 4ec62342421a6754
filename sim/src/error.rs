use std::{error::Error, fmt};

/// The result type used when building a `SimulationAdapter`.
pub type InitResult<T> = std::result::Result<T, AdapterInitError>;

/// The result type used by the per-call operations of a `SimulationAdapter`.
pub type StepResult<T> = std::result::Result<T, AdapterStepError>;

/// Failures while wiring up the native simulation, all of them fatal for the environment
/// being constructed.
#[derive(Debug)]
pub enum AdapterInitError {
    /// The native module reported a zero, negative or absurdly large vector size.
    InvalidSize { what: &'static str, got: i64 },
    /// A reported range is not a valid interval after sentinel translation.
    InvalidRange {
        what: &'static str,
        index: usize,
        min: f32,
        max: f32,
    },
    /// The dynamic library could not be opened.
    Library(libloading::Error),
    /// The dynamic library does not export one of the required symbols.
    Symbol {
        name: &'static str,
        source: libloading::Error,
    },
}

impl fmt::Display for AdapterInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize { what, got } => {
                write!(f, "the native module reported an invalid {what} size: {got}")
            }
            Self::InvalidRange {
                what,
                index,
                min,
                max,
            } => write!(
                f,
                "the native module reported an invalid {what} range at dimension {index}: [{min}, {max}]"
            ),
            Self::Library(e) => write!(f, "failed to load the simulation library: {e}"),
            Self::Symbol { name, source } => {
                write!(f, "the simulation library does not export {name}: {source}")
            }
        }
    }
}

impl Error for AdapterInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Library(e) => Some(e),
            Self::Symbol { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures of a single `reset`/`step` call. A normal end of episode is never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterStepError {
    /// The action does not have `action_size` components.
    ActionLength { got: usize, expected: usize },
    /// The native side signalled an unrecoverable fault through a negative return code.
    NativeFault { code: i32 },
    /// The native side wrote a non finite reward.
    NonFiniteReward { reward: f32 },
}

impl fmt::Display for AdapterStepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActionLength { got, expected } => write!(
                f,
                "action length mismatch, got {got} components and expected {expected}"
            ),
            Self::NativeFault { code } => {
                write!(f, "the native simulation faulted with code {code}")
            }
            Self::NonFiniteReward { reward } => {
                write!(f, "the native simulation produced a non finite reward {reward}")
            }
        }
    }
}

impl AdapterStepError {
    /// Whether the native simulation itself broke, leaving it in an unusable state.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::NativeFault { .. } | Self::NonFiniteReward { .. })
    }
}

impl Error for AdapterStepError {}
