use std::cmp::Ordering;

use common::{CorrMethod, Result, TrfError};
use nalgebra::DMatrix;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Agreement between one predicted and one observed column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Correlation coefficient
    pub r: f64,
    /// Two-sided probability of a correlation at least this strong under no correlation
    pub p: f64,
    /// Root mean square error
    pub rmse: f64,
}

/// Score every column of `pred` against the same column of `observed`
pub fn evaluate(pred: &DMatrix<f64>, observed: &DMatrix<f64>, corr: CorrMethod) -> Result<Vec<Score>> {
    if pred.shape() != observed.shape() {
        return Err(TrfError::ShapeMismatch(format!(
            "prediction is {:?} but observation is {:?}",
            pred.shape(),
            observed.shape()
        )));
    }
    let scores = pred
        .column_iter()
        .zip(observed.column_iter())
        .map(|(p, o)| {
            let p: Vec<f64> = p.iter().cloned().collect();
            let o: Vec<f64> = o.iter().cloned().collect();
            let r = match corr {
                CorrMethod::Pearson => pearson(&p, &o),
                CorrMethod::Spearman => pearson(&ranks(&p), &ranks(&o)),
            };
            Score {
                r,
                p: p_value(r, p.len()),
                rmse: rmse(&p, &o),
            }
        })
        .collect();
    Ok(scores)
}

/// Linear correlation, zero when either side has no variance
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if a.is_empty() {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        let (da, db) = (x - mean_a, y - mean_b);
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

/// Ranks starting at 1, ties receive their average rank
fn ranks(vals: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..vals.len()).collect();
    idx.sort_by(|a, b| vals[*a].partial_cmp(&vals[*b]).unwrap_or(Ordering::Equal));

    let mut out = vec![0.0; vals.len()];
    let mut i = 0;
    while i < idx.len() {
        let mut j = i;
        while j + 1 < idx.len() && vals[idx[j + 1]] == vals[idx[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        idx[i..=j].iter().for_each(|k| out[*k] = rank);
        i = j + 1;
    }
    out
}

/// Two-sided significance of a correlation over `n` observations, using the
/// Student t distribution with `n - 2` degrees of freedom
pub fn p_value(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Root mean square error
pub fn rmse(pred: &[f64], observed: &[f64]) -> f64 {
    if pred.is_empty() {
        return 0.0;
    }
    let sse: f64 = pred.iter().zip(observed.iter()).map(|(p, o)| (p - o).powi(2)).sum();
    (sse / pred.len() as f64).sqrt()
}
