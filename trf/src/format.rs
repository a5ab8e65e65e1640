//! Boundary adapter bringing caller data into the canonical layout:
//! an ordered collection of trials, observations along rows.

use std::borrow::Cow;

use common::{Axis, Direction, Result, TrfError};
use nalgebra::DMatrix;

/// Transpose trials whose observations run along columns
pub fn orient(trials: &[DMatrix<f64>], axis: Axis) -> Cow<'_, [DMatrix<f64>]> {
    match axis {
        Axis::Rows => Cow::Borrowed(trials),
        Axis::Columns => Cow::Owned(trials.iter().map(|t| t.transpose()).collect()),
    }
}

/// Pick `(predictor, predictand)` out of `(stimulus, response)`
#[inline(always)]
pub fn roles<'a, T: ?Sized>(direction: Direction, stim: &'a T, resp: &'a T) -> (&'a T, &'a T) {
    match direction {
        Direction::Forward => (stim, resp),
        Direction::Backward => (resp, stim),
    }
}

/// The common variable count of a set of trials
pub fn width(name: &str, trials: &[DMatrix<f64>]) -> Result<usize> {
    let first = trials
        .first()
        .ok_or_else(|| TrfError::ShapeMismatch(format!("`{}` contains no trials", name)))?;
    let w = first.ncols();
    if w == 0 {
        return Err(TrfError::ShapeMismatch(format!("`{}` has no variables", name)));
    }
    if let Some((i, t)) = trials.iter().enumerate().find(|(_, t)| t.ncols() != w) {
        return Err(TrfError::ShapeMismatch(format!(
            "trial {} of `{}` has {} variables, expected {}",
            i,
            name,
            t.ncols(),
            w
        )));
    }
    Ok(w)
}

/// Check that two trial sets pair up observation by observation.
/// Returns the variable counts of both sets.
pub fn check_paired(
    x_name: &str,
    x: &[DMatrix<f64>],
    y_name: &str,
    y: &[DMatrix<f64>],
) -> Result<(usize, usize)> {
    if x.len() != y.len() {
        return Err(TrfError::ShapeMismatch(format!(
            "`{}` has {} trials but `{}` has {}",
            x_name,
            x.len(),
            y_name,
            y.len()
        )));
    }
    let widths = (width(x_name, x)?, width(y_name, y)?);
    for (i, (a, b)) in x.iter().zip(y.iter()).enumerate() {
        if a.nrows() != b.nrows() {
            return Err(TrfError::ShapeMismatch(format!(
                "trial {}: `{}` has {} observations but `{}` has {}",
                i,
                x_name,
                a.nrows(),
                y_name,
                b.nrows()
            )));
        }
    }
    Ok(widths)
}

/// Concatenate trials into `k` contiguous groups of near-equal trial count,
/// turning leave-one-out over the groups into k-fold cross-validation.
pub fn group_trials(trials: &[DMatrix<f64>], k: usize) -> Result<Vec<DMatrix<f64>>> {
    let n = trials.len();
    if k == 0 || k > n {
        return Err(TrfError::invalid(
            "k",
            format!("cannot form {} groups out of {} trials", k, n),
        ));
    }
    let cols = width("trials", trials)?;

    let groups = (0..k)
        .map(|g| {
            let members = &trials[g * n / k..(g + 1) * n / k];
            let n_rows = members.iter().map(|t| t.nrows()).sum();
            let mut out = DMatrix::zeros(n_rows, cols);
            let mut offset = 0;
            for t in members {
                out.rows_mut(offset, t.nrows()).copy_from(t);
                offset += t.nrows();
            }
            out
        })
        .collect();
    Ok(groups)
}
