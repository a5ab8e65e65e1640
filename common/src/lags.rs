use std::ops::RangeInclusive;

use crate::{Result, TrfError};

/// Inclusive, ascending range of integer time lags in samples.
/// A positive lag means the predictor precedes the predictand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lags {
    min: i64,
    max: i64,
}

impl Lags {
    /// Create the lag range `[min ..= max]`
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(TrfError::invalid(
                "lags",
                format!("minimum lag {} exceeds maximum lag {}", min, max),
            ));
        }
        Ok(Self { min, max })
    }

    /// Smallest lag
    #[inline(always)]
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Largest lag
    #[inline(always)]
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Number of lags
    #[inline(always)]
    pub fn len(&self) -> usize {
        (self.max - self.min + 1) as usize
    }

    /// A lag range is never empty, provided for symmetry with `len`
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate the lags in ascending order
    #[inline(always)]
    pub fn iter(&self) -> RangeInclusive<i64> {
        self.min..=self.max
    }

    /// Rows at the start of a signal that read before its first sample for some lag
    #[inline(always)]
    pub fn leading_trim(&self) -> usize {
        self.max.max(0) as usize
    }

    /// Rows at the end of a signal that read past its last sample for some lag
    #[inline(always)]
    pub fn trailing_trim(&self) -> usize {
        (-self.min).max(0) as usize
    }

    /// The lags converted to milliseconds
    pub fn to_ms(&self, sample_rate: f64) -> Vec<f64> {
        self.iter().map(|l| l as f64 * 1e3 / sample_rate).collect()
    }
}
