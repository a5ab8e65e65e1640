#[macro_use]
extern crate log;

use nalgebra::DMatrix;
use thiserror::Error;

mod penalized_least_squares;
mod regularization;

pub use penalized_least_squares::PenalizedLeastSquares;
pub use regularization::Regularization;

/// Failure modes of solving the regularized normal equations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinRegError {
    /// The penalized Gram matrix is singular up to working precision
    #[error("penalized covariance matrix is ill-conditioned (pivot ratio {rcond:e}), choose a larger regularization strength")]
    IllConditioned {
        /// Ratio of the smallest to the largest absolute LU pivot
        rcond: f64,
    },
    /// The LU decomposition could not produce a solution
    #[error("penalized covariance matrix is not invertible")]
    NotSolvable,
    /// The solve succeeded but produced NaN or infinite coefficients
    #[error("solution contains non-finite coefficients")]
    NonFinite,
    /// The inputs to the solve do not line up
    #[error("dimension mismatch: {what} is {got:?}, expected {expected:?}")]
    DimensionMismatch {
        /// Which operand was malformed
        what: &'static str,
        /// Observed (rows, cols)
        got: (usize, usize),
        /// Required (rows, cols)
        expected: (usize, usize),
    },
}

/// Generic way of solving a linear regression from accumulated covariances
pub trait LinReg: Clone {
    /// Fit a coefficient matrix mapping the design to the targets
    ///
    /// # Parameters
    /// cxx: Gram matrix of the design, where the first row and column belong to the bias
    /// cxy: Cross products between the design and the targets, one column per target
    fn fit_readout(&self, cxx: &DMatrix<f64>, cxy: &DMatrix<f64>)
        -> Result<DMatrix<f64>, LinRegError>;
}
