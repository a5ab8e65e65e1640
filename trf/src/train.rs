use common::{check_lambda, Model, ModelType, Options, Result, TrfError, TrfParams};
use nalgebra::DMatrix;

use crate::{
    covariance::{self, plan_segments, Strategy},
    fit,
    format::{check_paired, orient, roles, width},
    lag_design::LagDesign,
};

/// Fit a temporal response function mapping stimulus to response (forward)
/// or response to stimulus (backward).
///
/// # Arguments:
/// stim: stimulus trials
/// resp: response trials, paired with `stim` observation by observation
/// params: sampling rate, direction and lag window
/// lambda: regularization strength, ignored for ordinary least squares
/// opts: optional settings, `split` bounds the memory of the covariance accumulation
pub fn train(
    stim: &[DMatrix<f64>],
    resp: &[DMatrix<f64>],
    params: &TrfParams,
    lambda: f64,
    opts: &Options,
) -> Result<Model> {
    params.validate()?;
    opts.validate()?;
    check_lambda(lambda)?;
    let lags = params.lags()?;

    let stim = orient(stim, opts.axis);
    let resp = orient(resp, opts.axis);
    let (x, y) = roles(params.direction, &*stim, &*resp);
    let (n_features, _) = check_paired("predictor", x, "predictand", y)?;
    info!(
        "training {:?} {:?} model on {} trials, lags [{}, {}], {:?} lambda = {}",
        params.direction,
        opts.model_type,
        x.len(),
        lags.min(),
        lags.max(),
        opts.method,
        lambda
    );

    let segments = plan_segments(x, lags, opts.zero_pad, opts.split)?;
    let total = covariance::ordinary(
        x,
        y,
        &segments,
        lags,
        opts.model_type,
        opts.zero_pad,
        Strategy::Slow,
    )?
    .total();

    let dt = params.sample_interval();
    let penalty = fit::penalty(opts.method, opts.model_type, n_features, lags, dt);
    let coefs: Vec<DMatrix<f64>> = fit::solve(&total, &penalty, opts.effective_lambda(lambda))?
        .into_iter()
        .map(|w| w / dt)
        .collect();
    trace!("coefficients: {:?}", coefs);
    let (weights, bias) = fit::split_bias(&coefs, opts.model_type, n_features, lags);

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

/// Stacked coefficients `[bias; lag_0; lag_1; ...]` of a multi-lag model, undoing the
/// sample interval scaling applied at training time
fn stacked(model: &Model) -> DMatrix<f64> {
    let (f, l, y) = model.shape();
    let dt = model.sample_interval();
    DMatrix::from_fn(f * l + 1, y, |i, j| {
        if i == 0 {
            model.bias()[(0, j)] * dt
        } else {
            model.weight((i - 1) % f, (i - 1) / f, j) * dt
        }
    })
}

fn check_predictor(model: &Model, x: &[DMatrix<f64>]) -> Result<()> {
    let (f, _, _) = model.shape();
    let w = width("predictor", x)?;
    if w != f {
        return Err(TrfError::ShapeMismatch(format!(
            "model expects {} predictor variables, got {}",
            f, w
        )));
    }
    Ok(())
}

/// Apply a multi-lag model to predictor trials.
/// Under `zero_pad = false` each prediction only covers the trial's valid rows.
pub fn predict(model: &Model, x: &[DMatrix<f64>], opts: &Options) -> Result<Vec<DMatrix<f64>>> {
    if model.model_type() != ModelType::Multi {
        return Err(TrfError::invalid(
            "model_type",
            "single-lag models predict one lag at a time, use `predict_lag`",
        ));
    }
    let x = orient(x, opts.axis);
    check_predictor(model, &x)?;

    let w = stacked(model);
    Ok(x
        .iter()
        .map(|t| {
            let design = LagDesign::new(t, *model.lags(), opts.zero_pad);
            design.multi(design.valid_rows()) * &w
        })
        .collect())
}

/// Apply lag index `lag` of a single-lag model to predictor trials
pub fn predict_lag(
    model: &Model,
    x: &[DMatrix<f64>],
    lag: usize,
    opts: &Options,
) -> Result<Vec<DMatrix<f64>>> {
    if model.model_type() != ModelType::Single {
        return Err(TrfError::invalid("model_type", "`predict_lag` needs a single-lag model"));
    }
    if lag >= model.lags().len() {
        return Err(TrfError::invalid(
            "lag",
            format!("index {} out of {} lags", lag, model.lags().len()),
        ));
    }
    let x = orient(x, opts.axis);
    check_predictor(model, &x)?;

    let (f, _, y) = model.shape();
    let dt = model.sample_interval();
    let w = DMatrix::from_fn(f + 1, y, |i, j| {
        if i == 0 {
            model.bias()[(lag, j)] * dt
        } else {
            model.weight(i - 1, lag, j) * dt
        }
    });
    Ok(x
        .iter()
        .map(|t| {
            let design = LagDesign::new(t, *model.lags(), opts.zero_pad);
            design.single(design.valid_rows(), lag) * &w
        })
        .collect())
}
