use lin_reg::LinRegError;
use thiserror::Error;

/// Everything that can go wrong while fitting or cross-validating a model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrfError {
    /// A scalar argument is out of its domain
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Paired inputs disagree in observation or variable counts
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// The regularized normal equations could not be solved reliably
    #[error("numerical instability: {0}")]
    NumericalInstability(#[from] LinRegError),
}

impl TrfError {
    /// Shorthand for [`TrfError::InvalidParameter`]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        TrfError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used across the workspace
pub type Result<T> = std::result::Result<T, TrfError>;
