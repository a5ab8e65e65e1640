use nalgebra::DMatrix;
use nanorand::{Rng, WyRand};
use trf::{
    crossvalidate, fit, group_trials, train, CovariancePair, Direction, LagDesign, ModelType, Options,
    Regularization, TrfParams,
};

fn noise(rng: &mut WyRand, rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_, _| rng.generate::<f64>() - 0.5)
}

#[test]
fn single_trial_ridge() {
    if let Err(_) = pretty_env_logger::try_init() {}

    let mut rng = WyRand::new_seed(0);
    let stim = noise(&mut rng, 100, 2);
    let resp = DMatrix::from_fn(100, 1, |i, _| {
        stim[(i, 0)] + if i >= 1 { 0.5 * stim[(i - 1, 1)] } else { 0.0 }
    });
    let params = TrfParams {
        sample_rate: 10.0,
        direction: Direction::Forward,
        t_min_ms: 0.0,
        t_max_ms: 100.0,
    };

    let model = train(&[stim], &[resp], &params, 1.0, &Options::default()).unwrap();

    assert_eq!(model.shape(), (2, 2, 1));
    assert_eq!(model.lags_ms(), vec![0.0, 100.0]);
    assert_eq!(model.bias().shape(), (1, 1));
    assert_eq!(model.method(), Regularization::Ridge);
}

#[test]
fn leave_one_trial_out() {
    if let Err(_) = pretty_env_logger::try_init() {}

    let mut rng = WyRand::new_seed(1);
    let stim: Vec<_> = (0..5).map(|_| noise(&mut rng, 200, 1)).collect();
    let resp: Vec<_> = stim
        .iter()
        .map(|s| {
            let n = noise(&mut rng, 200, 2);
            DMatrix::from_fn(200, 2, |i, j| {
                let lagged = if i >= 2 { s[(i - 2, 0)] } else { 0.0 };
                (j as f64 + 1.0) * lagged + 0.3 * n[(i, j)]
            })
        })
        .collect();
    let params = TrfParams {
        sample_rate: 100.0,
        direction: Direction::Forward,
        t_min_ms: 0.0,
        t_max_ms: 50.0,
    };

    let (stats, lags_ms) = crossvalidate(&stim, &resp, &params, &[0.1, 1.0, 10.0], &Options::default()).unwrap();

    assert_eq!(stats.r.shape(), vec![5, 3, 2]);
    assert_eq!(lags_ms.len(), 6);
    assert!(stats.r.values().iter().all(|r| (-1.0..=1.0).contains(r)));
    assert!(stats.p.values().iter().all(|p| (0.0..=1.0).contains(p)));
    assert!(stats.err.values().iter().all(|e| *e >= 0.0));
    assert!(stats.r.mean_per_lambda().iter().all(|r| *r > 0.5));

    // k-fold over grouped trials
    let stim = group_trials(&stim, 2).unwrap();
    let resp = group_trials(&resp, 2).unwrap();
    let (stats, _) = crossvalidate(&stim, &resp, &params, &[1.0], &Options::default()).unwrap();
    assert_eq!(stats.r.shape(), vec![2, 1, 2]);
}

#[test]
fn fifty_independent_lags() {
    if let Err(_) = pretty_env_logger::try_init() {}

    let mut rng = WyRand::new_seed(2);
    let stim = noise(&mut rng, 400, 3);
    let resp = noise(&mut rng, 400, 2);
    let params = TrfParams {
        sample_rate: 1000.0,
        direction: Direction::Forward,
        t_min_ms: 0.0,
        t_max_ms: 49.0,
    };
    let opts = Options {
        model_type: ModelType::Single,
        ..Default::default()
    };

    let model = train(&[stim.clone()], &[resp.clone()], &params, 1.0, &opts).unwrap();
    assert_eq!(model.shape(), (3, 50, 2));
    assert_eq!(model.weights().len(), 50);
    assert_eq!(model.bias().shape(), (50, 2));

    // changing one lag's strength leaves every other lag untouched
    let lags = params.lags().unwrap();
    let design = LagDesign::new(&stim, lags, opts.zero_pad);
    let pair = CovariancePair::of_segment(&design, &resp, design.valid_rows(), ModelType::Single);
    let m = fit::penalty(opts.method, ModelType::Single, 3, lags, params.sample_interval());
    let base = fit::solve(&pair, &m, 1.0).unwrap();
    let mut lambdas = vec![1.0; 50];
    lambdas[17] = 1e3;
    let varied = fit::solve_each(&pair, &m, &lambdas).unwrap();
    for l in (0..50).filter(|l| *l != 17) {
        assert_eq!(base[l], varied[l]);
    }
    assert_ne!(base[17], varied[17]);
}
