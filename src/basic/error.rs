use thiserror::Error;

/// Errors raised while assembling network matrices or running a load flow.
///
/// Hitting the iteration cap is not an error: solvers return their trace and
/// the caller reads the final mismatch.
#[derive(Debug, Error)]
pub enum PowerFlowError {
    /// The network description violates a structural invariant.
    #[error("invalid network: {0}")]
    InvalidNetwork(String),
    /// A branch is a self-loop or references a bus that does not exist.
    #[error("invalid branch {from}->{to}: {reason}")]
    InvalidBranch { from: u32, to: u32, reason: String },
    /// Zero impedance branch, isolated bus or zero loop impedance.
    #[error("division by zero: {0}")]
    DivideByZero(String),
    /// A linear system could not be factorized.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PowerFlowError>;
