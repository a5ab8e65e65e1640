use std::time::Instant;

use common::{check_lambdas, Lags, ModelType, Options, Result, TrfError, TrfParams};
use nalgebra::DMatrix;

use crate::{
    covariance::{self, plan_segments, CovariancePair, Segment, Strategy},
    evaluate::evaluate,
    fit,
    format::{check_paired, orient, roles},
    lag_design::LagDesign,
};

/// One statistic indexed by `(fold, lambda, predictand_var[, lag])`
#[derive(Debug, Clone, PartialEq)]
pub struct StatGrid {
    n_folds: usize,
    n_lambdas: usize,
    n_vars: usize,
    n_lags: Option<usize>,
    values: Vec<f64>,
}

impl StatGrid {
    fn new(n_folds: usize, n_lambdas: usize, n_vars: usize, n_lags: Option<usize>) -> Self {
        Self {
            n_folds,
            n_lambdas,
            n_vars,
            n_lags,
            values: vec![f64::NAN; n_folds * n_lambdas * n_vars * n_lags.unwrap_or(1)],
        }
    }

    #[inline(always)]
    fn index(&self, fold: usize, lambda: usize, var: usize, lag: usize) -> usize {
        ((fold * self.n_lambdas + lambda) * self.n_vars + var) * self.n_lags.unwrap_or(1) + lag
    }

    #[inline(always)]
    fn set(&mut self, fold: usize, lambda: usize, var: usize, lag: usize, v: f64) {
        let i = self.index(fold, lambda, var, lag);
        self.values[i] = v;
    }

    /// `[n_folds, n_lambdas, n_vars]`, with a trailing `n_lags` for single-lag models
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.n_folds, self.n_lambdas, self.n_vars];
        shape.extend(self.n_lags);
        shape
    }

    /// Value of a multi-lag model, or of the first lag of a single-lag model
    #[inline(always)]
    pub fn get(&self, fold: usize, lambda: usize, var: usize) -> f64 {
        self.values[self.index(fold, lambda, var, 0)]
    }

    /// Value of lag index `lag` of a single-lag model
    #[inline(always)]
    pub fn get_lag(&self, fold: usize, lambda: usize, var: usize, lag: usize) -> f64 {
        self.values[self.index(fold, lambda, var, lag)]
    }

    /// All values, the last index varying fastest
    #[inline(always)]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mean over folds, variables and lags for every regularization strength
    pub fn mean_per_lambda(&self) -> Vec<f64> {
        let per_fold = self.n_vars * self.n_lags.unwrap_or(1);
        (0..self.n_lambdas)
            .map(|l| {
                let sum: f64 = (0..self.n_folds)
                    .flat_map(|f| {
                        let start = self.index(f, l, 0, 0);
                        self.values[start..start + per_fold].iter()
                    })
                    .sum();
                sum / (self.n_folds * per_fold) as f64
            })
            .collect()
    }
}

/// Out-of-sample performance of every fold and regularization strength
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValStats {
    /// Correlation between prediction and held-out observation
    pub r: StatGrid,
    /// Significance of `r`
    pub p: StatGrid,
    /// Root mean square error
    pub err: StatGrid,
}

impl CrossValStats {
    fn new(n_folds: usize, n_lambdas: usize, n_vars: usize, n_lags: Option<usize>) -> Self {
        let grid = StatGrid::new(n_folds, n_lambdas, n_vars, n_lags);
        Self {
            r: grid.clone(),
            p: grid.clone(),
            err: grid,
        }
    }

    /// Index of the regularization strength with the highest mean correlation
    pub fn best_lambda(&self) -> usize {
        self.r
            .mean_per_lambda()
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, r)| if *r > best.1 { (i, *r) } else { best })
            .0
    }
}

/// What a fold needs besides the held-out predictor designs
pub(crate) struct HeldOut {
    /// Held-out predictand rows
    pub observed: DMatrix<f64>,
    /// Covariance of all other segments
    pub training: CovariancePair,
}

/// Leave-one-segment-out loop: fold, then regularization strength, then lag group
pub(crate) struct CrossValidator<'a> {
    pub lags: Lags,
    pub opts: &'a Options,
    pub penalty: DMatrix<f64>,
    pub lambdas: &'a [f64],
    /// Factor applied to solved weights before predicting
    pub weight_scale: f64,
}

impl<'a> CrossValidator<'a> {
    /// Run every fold. The held-out segment's lag group designs are built once per fold
    /// and handed to `held_out`, which may reuse them for the segment's own covariance.
    pub fn run<F>(
        &self,
        predictors: &[DMatrix<f64>],
        segments: &[Segment],
        n_vars: usize,
        mut held_out: F,
    ) -> Result<CrossValStats>
    where
        F: FnMut(usize, &Segment, &[DMatrix<f64>]) -> Result<HeldOut>,
    {
        let model_type = self.opts.model_type;
        let n_lags = match model_type {
            ModelType::Multi => None,
            ModelType::Single => Some(self.lags.len()),
        };
        let mut stats = CrossValStats::new(segments.len(), self.lambdas.len(), n_vars, n_lags);

        for (fold, segment) in segments.iter().enumerate() {
            let design = LagDesign::new(&predictors[segment.trial], self.lags, self.opts.zero_pad);
            let designs: Vec<DMatrix<f64>> = (0..design.n_groups(model_type))
                .map(|g| design.group(segment.rows.clone(), model_type, g))
                .collect();
            let HeldOut { observed, training } = held_out(fold, segment, &designs)?;

            for (li, lambda) in self.lambdas.iter().enumerate() {
                let coefs = fit::solve(&training, &self.penalty, self.opts.effective_lambda(*lambda))?;
                trace!("fold {}, lambda {}: {:?}", fold, lambda, coefs);
                for (g, (x, w)) in designs.iter().zip(coefs.iter()).enumerate() {
                    let pred = x * (w * self.weight_scale);
                    for (v, s) in evaluate(&pred, &observed, self.opts.corr)?.iter().enumerate() {
                        stats.r.set(fold, li, v, g, s.r);
                        stats.p.set(fold, li, v, g, s.p);
                        stats.err.set(fold, li, v, g, s.rmse);
                    }
                }
            }
            debug!(
                "fold {}/{}: trial {}, rows {:?}",
                fold + 1,
                segments.len(),
                segment.trial,
                segment.rows
            );
        }

        Ok(stats)
    }
}

/// Need at least two folds for anything to be left out
pub(crate) fn check_folds(segments: &[Segment]) -> Result<()> {
    if segments.len() < 2 {
        return Err(TrfError::ShapeMismatch(format!(
            "cross-validation needs at least two folds, got {}; add trials or increase split",
            segments.len()
        )));
    }
    Ok(())
}

/// Leave-one-out cross-validation over trials (and their segments, if `split > 1`)
/// for a grid of regularization strengths.
///
/// # Returns:
/// The statistics and the lags in milliseconds, ascending
pub fn crossvalidate(
    stim: &[DMatrix<f64>],
    resp: &[DMatrix<f64>],
    params: &TrfParams,
    lambdas: &[f64],
    opts: &Options,
) -> Result<(CrossValStats, Vec<f64>)> {
    params.validate()?;
    opts.validate()?;
    check_lambdas(lambdas)?;
    let lags = params.lags()?;

    let stim = orient(stim, opts.axis);
    let resp = orient(resp, opts.axis);
    let (x, y) = roles(params.direction, &*stim, &*resp);
    let (n_features, n_vars) = check_paired("predictor", x, "predictand", y)?;

    let segments = plan_segments(x, lags, opts.zero_pad, opts.split)?;
    check_folds(&segments)?;
    info!(
        "cross-validating {:?} {:?} model: {} folds, {} strengths, lags [{}, {}]",
        params.direction,
        opts.model_type,
        segments.len(),
        lambdas.len(),
        lags.min(),
        lags.max()
    );
    let t0 = Instant::now();

    let acc = covariance::ordinary(
        x,
        y,
        &segments,
        lags,
        opts.model_type,
        opts.zero_pad,
        Strategy::from_fast(opts.fast),
    )?;

    let validator = CrossValidator {
        lags,
        opts,
        penalty: fit::penalty(opts.method, opts.model_type, n_features, lags, params.sample_interval()),
        lambdas,
        weight_scale: 1.0,
    };
    let stats = validator.run(x, &segments, n_vars, |fold, s, designs| {
        let training = acc.leave_out(fold, || CovariancePair::of_designs(designs, &y[s.trial], s.rows.clone()))?;
        Ok(HeldOut {
            observed: y[s.trial].rows_range(s.rows.clone()).clone_owned(),
            training,
        })
    })?;
    info!("cross-validation done in {}ms", t0.elapsed().as_millis());

    Ok((stats, lags.to_ms(params.sample_rate)))
}

#[cfg(test)]
mod tests {
    use common::{Direction, Regularization};
    use nanorand::{Rng, WyRand};

    use super::*;

    fn dataset(seed: u64, n_trials: usize, len: usize) -> (Vec<DMatrix<f64>>, Vec<DMatrix<f64>>) {
        let mut rng = WyRand::new_seed(seed);
        let stim: Vec<DMatrix<f64>> = (0..n_trials)
            .map(|_| DMatrix::from_fn(len, 2, |_, _| rng.generate::<f64>() - 0.5))
            .collect();
        let resp = stim
            .iter()
            .map(|s| {
                DMatrix::from_fn(len, 2, |i, j| {
                    let lagged = if i >= 2 { s[(i - 2, j)] } else { 0.0 };
                    s[(i, 0)] + 0.5 * lagged + 0.2 * (rng.generate::<f64>() - 0.5)
                })
            })
            .collect();
        (stim, resp)
    }

    fn params() -> TrfParams {
        TrfParams {
            sample_rate: 100.0,
            direction: Direction::Forward,
            t_min_ms: 0.0,
            t_max_ms: 40.0,
        }
    }

    #[test]
    fn fast_and_slow_agree() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let (stim, resp) = dataset(0, 3, 200);
        let lambdas = [0.01, 1.0, 100.0];

        for model_type in [ModelType::Multi, ModelType::Single] {
            for method in [Regularization::Ridge, Regularization::Tikhonov] {
                let fast_opts = Options {
                    model_type,
                    method,
                    split: 2,
                    zero_pad: false,
                    ..Default::default()
                };
                let slow_opts = Options {
                    fast: false,
                    ..fast_opts.clone()
                };
                let (fast, t_fast) = crossvalidate(&stim, &resp, &params(), &lambdas, &fast_opts).unwrap();
                let (slow, t_slow) = crossvalidate(&stim, &resp, &params(), &lambdas, &slow_opts).unwrap();

                assert_eq!(t_fast, t_slow);
                assert_eq!(fast.r.shape(), slow.r.shape());
                for (a, b) in fast.r.values().iter().zip(slow.r.values()) {
                    assert!((a - b).abs() < 1e-8, "{} vs {}", a, b);
                }
                for (a, b) in fast.err.values().iter().zip(slow.err.values()) {
                    assert!((a - b).abs() < 1e-8, "{} vs {}", a, b);
                }
            }
        }
    }

    #[test]
    fn split_multiplies_folds() {
        let (stim, resp) = dataset(1, 2, 150);
        let opts = Options {
            split: 3,
            ..Default::default()
        };
        let (stats, lags_ms) = crossvalidate(&stim, &resp, &params(), &[0.01], &opts).unwrap();
        assert_eq!(stats.r.shape(), vec![6, 1, 2]);
        assert_eq!(lags_ms, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        // the response is well explained by the stimulus
        assert!(stats.r.values().iter().all(|r| *r > 0.5));
    }

    #[test]
    fn many_segments_per_trial() {
        let (stim, resp) = dataset(5, 1, 1000);
        let opts = Options {
            split: 60,
            ..Default::default()
        };
        let (stats, _) = crossvalidate(&stim, &resp, &params(), &[0.01], &opts).unwrap();
        assert_eq!(stats.r.shape(), vec![60, 1, 2]);

        let opts = Options {
            split: usize::MAX,
            ..Default::default()
        };
        let res = crossvalidate(&stim, &resp, &params(), &[0.01], &opts);
        assert!(matches!(res, Err(TrfError::ShapeMismatch(_))));
    }

    #[test]
    fn single_lag_stats_carry_lag_axis() {
        let (stim, resp) = dataset(2, 3, 120);
        let opts = Options {
            model_type: ModelType::Single,
            ..Default::default()
        };
        let (stats, _) = crossvalidate(&stim, &resp, &params(), &[0.1, 10.0], &opts).unwrap();
        assert_eq!(stats.r.shape(), vec![3, 2, 2, 5]);
        assert!(stats.p.values().iter().all(|p| (0.0..=1.0).contains(p)));

        // lag 0 of the first variable carries the direct stimulus path, lag 1 carries nothing
        assert!(stats.r.get_lag(0, 0, 0, 0) > stats.r.get_lag(0, 0, 0, 1));
    }

    #[test]
    fn backward_lags_are_ascending() {
        let (stim, resp) = dataset(3, 3, 100);
        let p = TrfParams {
            direction: Direction::Backward,
            ..params()
        };
        let (_, lags_ms) = crossvalidate(&stim, &resp, &p, &[1.0], &Options::default()).unwrap();
        assert_eq!(lags_ms, vec![-40.0, -30.0, -20.0, -10.0, 0.0]);
    }

    #[test]
    fn needs_two_folds() {
        let (stim, resp) = dataset(4, 1, 100);
        let res = crossvalidate(&stim, &resp, &params(), &[1.0], &Options::default());
        assert!(matches!(res, Err(TrfError::ShapeMismatch(_))));
        assert!(crossvalidate(&stim, &resp, &params(), &[-1.0], &Options::default()).is_err());
    }

    #[test]
    fn best_lambda_prefers_highest_mean() {
        let mut stats = CrossValStats::new(2, 3, 1, None);
        for f in 0..2 {
            for (l, r) in [0.1, 0.6, 0.3].iter().enumerate() {
                stats.r.set(f, l, 0, 0, *r);
            }
        }
        assert_eq!(stats.best_lambda(), 1);
        assert_eq!(stats.r.mean_per_lambda()[2], 0.3);
    }
}
