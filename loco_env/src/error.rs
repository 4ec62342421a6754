use std::{error::Error, fmt};

use sim::{AdapterInitError, AdapterStepError};

/// The environment module's result type.
pub type Result<T> = std::result::Result<T, EnvErr>;

/// Environment failures.
#[derive(Debug)]
pub enum EnvErr {
    Init(AdapterInitError),
    Step(AdapterStepError),
    /// A worker thread hung up, usually because its environment panicked.
    WorkerGone { worker: usize },
    /// A `VecEnv` was asked for zero workers.
    NoWorkers,
    /// A worker's simulation faulted earlier and refuses further commands.
    Faulted { worker: usize },
    /// The amount of actions does not match the amount of workers.
    BatchSize { got: usize, expected: usize },
    /// An action bound override does not describe a valid range.
    InvalidBound { bound: f32 },
}

impl fmt::Display for EnvErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvErr::Init(e) => write!(f, "environment construction failed: {e}"),
            EnvErr::Step(e) => write!(f, "environment step failed: {e}"),
            EnvErr::WorkerGone { worker } => write!(f, "worker {worker} is gone"),
            EnvErr::NoWorkers => write!(f, "a vectorized environment needs at least one worker"),
            EnvErr::Faulted { worker } => {
                write!(f, "worker {worker} is out of service after a native fault")
            }
            EnvErr::BatchSize { got, expected } => write!(
                f,
                "got {got} actions for {expected} environments"
            ),
            EnvErr::InvalidBound { bound } => {
                write!(f, "invalid action bound {bound}, must be finite and positive")
            }
        }
    }
}

impl Error for EnvErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EnvErr::Init(e) => Some(e),
            EnvErr::Step(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AdapterInitError> for EnvErr {
    fn from(value: AdapterInitError) -> Self {
        Self::Init(value)
    }
}

impl From<AdapterStepError> for EnvErr {
    fn from(value: AdapterStepError) -> Self {
        Self::Step(value)
    }
}
