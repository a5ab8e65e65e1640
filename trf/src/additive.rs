//! Additive multisensory models: the sum of two unisensory models, fitted jointly
//! from the covariances of both unisensory relationships.

use std::time::Instant;

use common::{check_lambda, check_lambdas, Direction, Model, Options, Result, TrfError, TrfParams};
use nalgebra::DMatrix;

use crate::{
    covariance::{self, plan_segments, CovariancePair, PairedCovariance, Strategy},
    crossval::{check_folds, CrossValStats, CrossValidator, HeldOut},
    fit,
    format::{check_paired, orient},
};

/// Modeling assumption of the additive model: the multisensory response is the sum
/// of the two unisensory responses. Jointly solved weights are scaled by this factor.
pub const SUPERPOSITION_FACTOR: f64 = 2.0;

/// Merge the two unisensory relationships into a single system.
///
/// Backward models sum both Gram matrices. Forward models share the stimulus, so
/// their Gram matrix is the first relationship's counted twice.
pub fn combine(paired: &PairedCovariance, direction: Direction) -> CovariancePair {
    let cxx = match direction {
        Direction::Forward => paired.cxx1.iter().map(|c| c + c).collect(),
        Direction::Backward => paired
            .cxx1
            .iter()
            .zip(paired.second_gram().iter())
            .map(|(a, b)| a + b)
            .collect(),
    };
    let cxy = paired.cxy1.iter().zip(paired.cxy2.iter()).map(|(a, b)| a + b).collect();
    CovariancePair { cxx, cxy }
}

/// Validated shapes of an additive fit
struct Layout {
    /// Width of the lagged predictor
    n_features: usize,
    /// Width of the predicted signal
    n_vars: usize,
}

/// `stim` pairs with every unisensory set, which share one width
fn check_unisensory(
    direction: Direction,
    stim: &[DMatrix<f64>],
    resp1: &[DMatrix<f64>],
    resp2: &[DMatrix<f64>],
) -> Result<Layout> {
    let (n_stim, n_resp1) = check_paired("stim", stim, "resp1", resp1)?;
    let (_, n_resp2) = check_paired("stim", stim, "resp2", resp2)?;
    if n_resp1 != n_resp2 {
        return Err(TrfError::ShapeMismatch(format!(
            "`resp1` has {} variables but `resp2` has {}",
            n_resp1, n_resp2
        )));
    }
    Ok(match direction {
        Direction::Forward => Layout {
            n_features: n_stim,
            n_vars: n_resp1,
        },
        Direction::Backward => Layout {
            n_features: n_resp1,
            n_vars: n_stim,
        },
    })
}

/// Fit an additive model from two unisensory datasets sharing a stimulus.
///
/// # Arguments:
/// stim: stimulus trials
/// resp1: responses to the first unisensory condition
/// resp2: responses to the second unisensory condition
/// params: sampling rate, direction and lag window
/// lambda: regularization strength, ignored for ordinary least squares
/// opts: optional settings
pub fn multitrain(
    stim: &[DMatrix<f64>],
    resp1: &[DMatrix<f64>],
    resp2: &[DMatrix<f64>],
    params: &TrfParams,
    lambda: f64,
    opts: &Options,
) -> Result<Model> {
    params.validate()?;
    opts.validate()?;
    check_lambda(lambda)?;
    let lags = params.lags()?;

    let stim = orient(stim, opts.axis);
    let resp1 = orient(resp1, opts.axis);
    let resp2 = orient(resp2, opts.axis);
    let layout = check_unisensory(params.direction, &stim, &resp1, &resp2)?;
    info!(
        "training additive {:?} {:?} model on {} trials, {:?} lambda = {}",
        params.direction,
        opts.model_type,
        stim.len(),
        opts.method,
        lambda
    );

    let segments = plan_segments(&stim, lags, opts.zero_pad, opts.split)?;
    let paired = covariance::paired(
        params.direction,
        &stim,
        &resp1,
        &resp2,
        &segments,
        lags,
        opts.model_type,
        opts.zero_pad,
        Strategy::Slow,
    )?
    .total();

    let dt = params.sample_interval();
    let penalty = fit::penalty(opts.method, opts.model_type, layout.n_features, lags, dt);
    let coefs: Vec<DMatrix<f64>> = fit::solve(
        &combine(&paired, params.direction),
        &penalty,
        opts.effective_lambda(lambda),
    )?
    .into_iter()
    .map(|w| w * SUPERPOSITION_FACTOR / dt)
    .collect();
    let (weights, bias) = fit::split_bias(&coefs, opts.model_type, layout.n_features, lags);

    Ok(Model::new(
        weights,
        bias,
        lags,
        params.sample_rate,
        params.direction,
        opts.model_type,
        opts.method,
    ))
}

/// Cross-validate an additive model against multisensory data.
/// Every fold trains on the unisensory datasets with the fold left out and
/// predicts the held-out multisensory data.
///
/// # Returns:
/// The statistics and the lags in milliseconds, ascending
pub fn multicrossvalidate(
    stim: &[DMatrix<f64>],
    resp: &[DMatrix<f64>],
    resp1: &[DMatrix<f64>],
    resp2: &[DMatrix<f64>],
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
    let resp1 = orient(resp1, opts.axis);
    let resp2 = orient(resp2, opts.axis);
    let layout = check_unisensory(params.direction, &stim, &resp1, &resp2)?;
    let (_, n_resp) = check_paired("stim", &stim, "resp", &resp)?;
    let n_unisensory = match params.direction {
        Direction::Forward => layout.n_vars,
        Direction::Backward => layout.n_features,
    };
    if n_resp != n_unisensory {
        return Err(TrfError::ShapeMismatch(format!(
            "`resp` has {} variables but the unisensory responses have {}",
            n_resp, n_unisensory
        )));
    }

    // held-out multisensory data, predictor first
    let (x, y) = match params.direction {
        Direction::Forward => (&*stim, &*resp),
        Direction::Backward => (&*resp, &*stim),
    };

    let segments = plan_segments(&stim, lags, opts.zero_pad, opts.split)?;
    check_folds(&segments)?;
    info!(
        "cross-validating additive {:?} {:?} model: {} folds, {} strengths",
        params.direction,
        opts.model_type,
        segments.len(),
        lambdas.len()
    );
    let t0 = Instant::now();

    let acc = covariance::paired(
        params.direction,
        &stim,
        &resp1,
        &resp2,
        &segments,
        lags,
        opts.model_type,
        opts.zero_pad,
        Strategy::from_fast(opts.fast),
    )?;

    let validator = CrossValidator {
        lags,
        opts,
        penalty: fit::penalty(
            opts.method,
            opts.model_type,
            layout.n_features,
            lags,
            params.sample_interval(),
        ),
        lambdas,
        weight_scale: SUPERPOSITION_FACTOR,
    };
    let stats = validator.run(x, &segments, layout.n_vars, |fold, s, designs| {
        let paired = acc.leave_out(fold, || match params.direction {
            // the held-out predictor is the shared stimulus
            Direction::Forward => PairedCovariance::of_shared_designs(
                designs,
                &resp1[s.trial],
                &resp2[s.trial],
                s.rows.clone(),
            ),
            Direction::Backward => covariance::paired_segment(
                params.direction,
                &stim,
                &resp1,
                &resp2,
                s,
                lags,
                opts.model_type,
                opts.zero_pad,
            ),
        })?;
        Ok(HeldOut {
            observed: y[s.trial].rows_range(s.rows.clone()).clone_owned(),
            training: combine(&paired, params.direction),
        })
    })?;
    info!("additive cross-validation done in {}ms", t0.elapsed().as_millis());

    Ok((stats, lags.to_ms(params.sample_rate)))
}
