#[macro_use]
extern crate log;

use std::{error::Error, time::Instant};

use dialoguer::{theme::ColorfulTheme, Select};
use nalgebra::DMatrix;
use nanorand::{Rng, WyRand};
use trf::{
    crossvalidate, evaluate, multitrain, predict, train, CorrMethod, Direction, ModelType, Options,
    Regularization, TrfParams,
};

const SAMPLE_RATE: f64 = 128.0;
const N_TRIALS: usize = 6;
const TRIAL_LEN: usize = 2048;
const SEED: u64 = 0;

/// Impulse response used to simulate the response, one tap per sample
const KERNEL: [f64; 8] = [0.0, 0.2, 0.6, 1.0, 0.6, 0.1, -0.3, -0.2];

/// Smoothed noise standing in for a stimulus envelope
fn envelope(rng: &mut WyRand, len: usize) -> DMatrix<f64> {
    let mut level = 0.0;
    DMatrix::from_fn(len, 1, |_, _| {
        level = 0.9 * level + 0.1 * (rng.generate::<f64>() - 0.5);
        level
    })
}

fn convolve(stim: &DMatrix<f64>, kernel: &[f64], rng: &mut WyRand, noise: f64) -> DMatrix<f64> {
    DMatrix::from_fn(stim.nrows(), 1, |i, _| {
        let clean: f64 = kernel
            .iter()
            .enumerate()
            .filter(|(k, _)| *k <= i)
            .map(|(k, w)| w * stim[(i - k, 0)])
            .sum();
        clean + noise * (rng.generate::<f64>() - 0.5)
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let mut rng = WyRand::new_seed(SEED);
    let stim: Vec<DMatrix<f64>> = (0..N_TRIALS).map(|_| envelope(&mut rng, TRIAL_LEN)).collect();
    let resp: Vec<DMatrix<f64>> = stim.iter().map(|s| convolve(s, &KERNEL, &mut rng, 0.05)).collect();
    info!("simulated {} trials of {} samples at {} Hz", N_TRIALS, TRIAL_LEN, SAMPLE_RATE);

    let directions = vec!["forward (encoding)", "backward (decoding)"];
    let direction = match Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select model direction")
        .items(&directions)
        .default(0)
        .interact()?
    {
        0 => Direction::Forward,
        _ => Direction::Backward,
    };
    let methods = vec!["ridge", "tikhonov", "ols"];
    let method: Regularization = methods[Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select regularization")
        .items(&methods)
        .default(0)
        .interact()?]
    .parse()?;
    let model_types = vec!["multi", "single"];
    let model_type: ModelType = model_types[Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select lag model")
        .items(&model_types)
        .default(0)
        .interact()?]
    .parse()?;

    let params = TrfParams {
        sample_rate: SAMPLE_RATE,
        direction,
        t_min_ms: -50.0,
        t_max_ms: 100.0,
    };
    let opts = Options {
        method,
        model_type,
        split: 2,
        corr: CorrMethod::Pearson,
        ..Default::default()
    };
    let lambdas: Vec<f64> = (-4..=4).map(|e| 10_f64.powi(e)).collect();

    let t0 = Instant::now();
    let (stats, lags_ms) = crossvalidate(&stim, &resp, &params, &lambdas, &opts)?;
    info!("cross-validation done in: {}ms", t0.elapsed().as_millis());
    for (lambda, r) in lambdas.iter().zip(stats.r.mean_per_lambda()) {
        info!("lambda: {:e}, mean r: {:.4}", lambda, r);
    }
    let best = lambdas[stats.best_lambda()];
    info!("best lambda: {:e}", best);

    let t0 = Instant::now();
    let model = train(&stim, &resp, &params, best, &opts)?;
    info!("training done in: {}ms", t0.elapsed().as_millis());
    info!("model shape (vars, lags, outputs): {:?}", model.shape());
    for (l, ms) in lags_ms.iter().enumerate() {
        let w: Vec<String> = model.weights()[l].iter().map(|w| format!("{:+.3}", w)).collect();
        info!("{:>8.2} ms: {}", ms, w.join(" "));
    }

    if model_type == ModelType::Multi {
        let (x, y) = match direction {
            Direction::Forward => (&stim, &resp),
            Direction::Backward => (&resp, &stim),
        };
        let pred = predict(&model, &x[..1], &opts)?;
        let scores = evaluate(&pred[0], &y[0], opts.corr)?;
        info!("in-sample fit on trial 0: {:?}", scores);

        // two conditions that each carry half of the response
        let half: Vec<DMatrix<f64>> = resp.iter().map(|r| r * 0.5).collect();
        let additive = multitrain(&stim, &half, &half, &params, best, &opts)?;
        info!("additive model shape: {:?}", additive.shape());
    }

    Ok(())
}
