use std::str::FromStr;

use lin_reg::Regularization;

use crate::{Lags, Result, TrfError};

/// Which signal is the predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Stimulus predicts response (encoding model)
    #[default]
    Forward,
    /// Response predicts stimulus (decoding model)
    Backward,
}

impl FromStr for Direction {
    type Err = TrfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "forward" | "1" => Ok(Direction::Forward),
            "backward" | "-1" => Ok(Direction::Backward),
            other => Err(TrfError::invalid(
                "direction",
                format!("expected `forward` or `backward`, got `{}`", other),
            )),
        }
    }
}

/// Whether all lags are fit jointly or each lag on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// One regression over the stacked lags
    #[default]
    Multi,
    /// An independent regression per lag
    Single,
}

impl FromStr for ModelType {
    type Err = TrfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "multi" => Ok(ModelType::Multi),
            "single" => Ok(ModelType::Single),
            other => Err(TrfError::invalid(
                "model_type",
                format!("expected `multi` or `single`, got `{}`", other),
            )),
        }
    }
}

/// Which matrix axis of an input trial runs over observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    /// Rows are observations, columns are variables
    #[default]
    Rows,
    /// Columns are observations, rows are variables
    Columns,
}

/// Correlation coefficient used to score predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrMethod {
    /// Linear correlation
    #[default]
    Pearson,
    /// Rank correlation
    Spearman,
}

impl FromStr for CorrMethod {
    type Err = TrfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrMethod::Pearson),
            "spearman" => Ok(CorrMethod::Spearman),
            other => Err(TrfError::invalid(
                "corr",
                format!("expected `pearson` or `spearman`, got `{}`", other),
            )),
        }
    }
}

/// Optional settings of training and cross-validation
#[derive(Debug, Clone)]
pub struct Options {
    /// Observation axis of the input trials
    pub axis: Axis,
    /// Penalty family
    pub method: Regularization,
    /// Fit lags jointly or independently
    pub model_type: ModelType,
    /// Number of contiguous segments each trial is cut into.
    /// Bounds peak memory and multiplies the number of cross-validation folds.
    pub split: usize,
    /// Zero-pad lagged samples outside the signal instead of dropping those rows
    pub zero_pad: bool,
    /// Hold every segment's covariance in memory during cross-validation
    /// instead of subtracting the held-out segment from the grand total
    pub fast: bool,
    /// Correlation used to score cross-validated predictions
    pub corr: CorrMethod,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            axis: Axis::Rows,
            method: Regularization::Ridge,
            model_type: ModelType::Multi,
            split: 1,
            zero_pad: true,
            fast: true,
            corr: CorrMethod::Pearson,
        }
    }
}

impl Options {
    /// Check the settings that do not depend on data
    pub fn validate(&self) -> Result<()> {
        if self.split == 0 {
            return Err(TrfError::invalid("split", "must be a positive segment count"));
        }
        Ok(())
    }

    /// The regularization strength actually applied, forced to zero for ordinary least squares
    #[inline(always)]
    pub fn effective_lambda(&self, lambda: f64) -> f64 {
        if self.method.is_penalized() {
            lambda
        } else {
            0.0
        }
    }
}

/// The time window and sampling of a model
#[derive(Debug, Clone)]
pub struct TrfParams {
    /// Sampling rate in Hz
    pub sample_rate: f64,
    /// Predictor / predictand roles
    pub direction: Direction,
    /// Start of the lag window in milliseconds
    pub t_min_ms: f64,
    /// End of the lag window in milliseconds
    pub t_max_ms: f64,
}

impl TrfParams {
    /// Check the scalar arguments before any data is touched
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(TrfError::invalid(
                "sample_rate",
                format!("must be positive, got {}", self.sample_rate),
            ));
        }
        if !self.t_min_ms.is_finite() || !self.t_max_ms.is_finite() {
            return Err(TrfError::invalid("t_min_ms", "time window must be finite"));
        }
        if self.t_min_ms > self.t_max_ms {
            return Err(TrfError::invalid(
                "t_min_ms",
                format!("{} ms exceeds t_max_ms = {} ms", self.t_min_ms, self.t_max_ms),
            ));
        }
        Ok(())
    }

    /// Seconds between two samples
    #[inline(always)]
    pub fn sample_interval(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Convert the time window to lags in samples.
    /// Backward models run opposite in time, so their window is negated and reversed.
    pub fn lags(&self) -> Result<Lags> {
        self.validate()?;
        let (t_min, t_max) = match self.direction {
            Direction::Forward => (self.t_min_ms, self.t_max_ms),
            Direction::Backward => (-self.t_max_ms, -self.t_min_ms),
        };
        let min = (t_min * self.sample_rate / 1e3).floor() as i64;
        let max = (t_max * self.sample_rate / 1e3).ceil() as i64;
        Lags::new(min, max)
    }
}

/// Reject a negative or non-finite regularization strength
pub fn check_lambda(lambda: f64) -> Result<()> {
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Err(TrfError::invalid(
            "lambda",
            format!("must be finite and non-negative, got {}", lambda),
        ));
    }
    Ok(())
}

/// Validate a grid of regularization strengths
pub fn check_lambdas(lambdas: &[f64]) -> Result<()> {
    if lambdas.is_empty() {
        return Err(TrfError::invalid("lambda", "at least one strength is required"));
    }
    lambdas.iter().try_for_each(|l| check_lambda(*l))
}
