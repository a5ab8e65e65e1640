use common::{Lags, ModelType, Regularization, Result, TrfError};
use lin_reg::{LinReg, PenalizedLeastSquares};
use nalgebra::DMatrix;

use crate::covariance::CovariancePair;

/// Penalty matrix sized to one lag group of the given model type
pub fn penalty(
    method: Regularization,
    model_type: ModelType,
    n_features: usize,
    lags: Lags,
    sample_interval: f64,
) -> DMatrix<f64> {
    let n = match model_type {
        ModelType::Multi => n_features * lags.len() + 1,
        ModelType::Single => n_features + 1,
    };
    method.matrix(n, sample_interval)
}

/// Solve every lag group with the same regularization strength
pub fn solve(pair: &CovariancePair, penalty: &DMatrix<f64>, lambda: f64) -> Result<Vec<DMatrix<f64>>> {
    solve_each(pair, penalty, &vec![lambda; pair.n_groups()])
}

/// Solve each lag group with its own regularization strength.
/// Groups never share information, so one group's strength cannot affect another's weights.
pub fn solve_each(
    pair: &CovariancePair,
    penalty: &DMatrix<f64>,
    lambdas: &[f64],
) -> Result<Vec<DMatrix<f64>>> {
    if lambdas.len() != pair.n_groups() {
        return Err(TrfError::ShapeMismatch(format!(
            "{} regularization strengths for {} lag groups",
            lambdas.len(),
            pair.n_groups()
        )));
    }
    pair.cxx
        .iter()
        .zip(pair.cxy.iter())
        .zip(lambdas.iter())
        .map(|((cxx, cxy), lambda)| {
            let regressor = PenalizedLeastSquares::new(penalty.clone(), *lambda);
            Ok(regressor.fit_readout(cxx, cxy)?)
        })
        .collect()
}

/// Split solved coefficients into per lag weight blocks and the bias rows
///
/// # Returns:
/// weights: one `n_features x predictand_vars` block per lag
/// bias: `n_groups x predictand_vars`
pub fn split_bias(
    coefs: &[DMatrix<f64>],
    model_type: ModelType,
    n_features: usize,
    lags: Lags,
) -> (Vec<DMatrix<f64>>, DMatrix<f64>) {
    let n_out = coefs.first().map(|c| c.ncols()).unwrap_or(0);
    let bias = DMatrix::from_fn(coefs.len(), n_out, |g, j| coefs[g][(0, j)]);
    let weights = match model_type {
        ModelType::Multi => (0..lags.len())
            .map(|l| coefs[0].rows(1 + l * n_features, n_features).clone_owned())
            .collect(),
        ModelType::Single => coefs.iter().map(|c| c.rows(1, n_features).clone_owned()).collect(),
    };
    (weights, bias)
}
