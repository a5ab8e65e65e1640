use nalgebra::DMatrix;

use crate::{Direction, Lags, ModelType, Regularization};

/// A trained temporal response function.
/// Immutable once returned by training.
#[derive(Debug, Clone)]
pub struct Model {
    /// One `predictor_vars x predictand_vars` block per lag, in ascending lag order
    weights: Vec<DMatrix<f64>>,
    /// `n_lag_groups x predictand_vars`; a single row for multi-lag models
    bias: DMatrix<f64>,
    lags: Lags,
    sample_rate: f64,
    direction: Direction,
    model_type: ModelType,
    method: Regularization,
}

impl Model {
    /// Assemble a model from solved weights
    ///
    /// # Arguments:
    /// weights: per lag predictor x predictand coefficient blocks
    /// bias: one row per lag group
    pub fn new(
        weights: Vec<DMatrix<f64>>,
        bias: DMatrix<f64>,
        lags: Lags,
        sample_rate: f64,
        direction: Direction,
        model_type: ModelType,
        method: Regularization,
    ) -> Self {
        debug_assert_eq!(weights.len(), lags.len());
        Self {
            weights,
            bias,
            lags,
            sample_rate,
            direction,
            model_type,
            method,
        }
    }

    /// Per lag coefficient blocks
    #[inline(always)]
    pub fn weights(&self) -> &[DMatrix<f64>] {
        &self.weights
    }

    /// Bias terms, one row per lag group
    #[inline(always)]
    pub fn bias(&self) -> &DMatrix<f64> {
        &self.bias
    }

    /// `(predictor_vars, n_lags, predictand_vars)`
    pub fn shape(&self) -> (usize, usize, usize) {
        let (f, y) = self.weights.first().map(|w| w.shape()).unwrap_or((0, 0));
        (f, self.weights.len(), y)
    }

    /// Coefficient linking predictor variable `var` at lag index `lag` to predictand `out`
    #[inline(always)]
    pub fn weight(&self, var: usize, lag: usize, out: usize) -> f64 {
        self.weights[lag][(var, out)]
    }

    /// Lags in samples
    #[inline(always)]
    pub fn lags(&self) -> &Lags {
        &self.lags
    }

    /// Lags in milliseconds, ascending
    pub fn lags_ms(&self) -> Vec<f64> {
        self.lags.to_ms(self.sample_rate)
    }

    /// Sampling rate in Hz
    #[inline(always)]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds between two samples
    #[inline(always)]
    pub fn sample_interval(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Predictor / predictand roles the model was trained with
    #[inline(always)]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Joint or per lag fit
    #[inline(always)]
    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// Penalty the model was trained with
    #[inline(always)]
    pub fn method(&self) -> Regularization {
        self.method
    }
}
