use std::str::FromStr;

use nalgebra::DMatrix;

/// The penalty family added to the normal equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Regularization {
    /// Shrinks coefficient magnitude, leaving the bias untouched
    #[default]
    Ridge,
    /// Penalizes differences between neighbouring coefficients
    Tikhonov,
    /// Ordinary least squares, no penalty at all
    Ols,
}

impl Regularization {
    /// Build the `n x n` penalty matrix, where the first row and column belong to the bias.
    /// The result is scaled by `1 / sample_interval` so that a given regularization
    /// strength means the same thing across sampling rates.
    pub fn matrix(&self, n: usize, sample_interval: f64) -> DMatrix<f64> {
        let mut m = match self {
            Regularization::Ols => return DMatrix::zeros(n, n),
            Regularization::Ridge => DMatrix::identity(n, n),
            Regularization::Tikhonov => tikhonov(n),
        };
        if n > 0 {
            m[(0, 0)] = 0.0;
        }
        m / sample_interval
    }

    /// Whether the regularization strength has any effect
    #[inline(always)]
    pub fn is_penalized(&self) -> bool {
        !matches!(self, Regularization::Ols)
    }
}

/// Second order difference operator with the bias decoupled from the first feature
fn tikhonov(n: usize) -> DMatrix<f64> {
    let mut m = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            1.0
        } else if i.abs_diff(j) == 1 {
            -0.5
        } else {
            0.0
        }
    });
    if n > 1 {
        // edges only have one neighbour
        m[(1, 1)] = 0.5;
        m[(n - 1, n - 1)] = 0.5;
        m[(0, 1)] = 0.0;
        m[(1, 0)] = 0.0;
    }
    m
}

impl FromStr for Regularization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ridge" => Ok(Regularization::Ridge),
            "tikhonov" | "smoothness" => Ok(Regularization::Tikhonov),
            "ols" => Ok(Regularization::Ols),
            other => Err(format!("unknown regularization method `{}`", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ridge_leaves_bias_unpenalized() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let m = Regularization::Ridge.matrix(4, 1.0);
        info!("ridge: {}", m);

        let mut goal = DMatrix::identity(4, 4);
        goal[(0, 0)] = 0.0;
        assert_eq!(m, goal);
    }

    #[test]
    fn tikhonov_layout() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let m = Regularization::Tikhonov.matrix(5, 1.0);
        info!("tikhonov: {}", m);

        let goal = DMatrix::from_row_slice(
            5,
            5,
            &[
                0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 0.5, -0.5, 0.0, 0.0, //
                0.0, -0.5, 1.0, -0.5, 0.0, //
                0.0, 0.0, -0.5, 1.0, -0.5, //
                0.0, 0.0, 0.0, -0.5, 0.5,
            ],
        );
        assert_eq!(m, goal);
        assert_eq!(m, m.transpose());
    }

    #[test]
    fn ols_is_zero() {
        let m = Regularization::Ols.matrix(3, 0.01);
        assert!(m.iter().all(|v| *v == 0.0));
        assert!(!Regularization::Ols.is_penalized());
    }

    #[test]
    fn scaled_by_sample_interval() {
        let m = Regularization::Ridge.matrix(3, 0.01);
        assert_eq!(m[(0, 0)], 0.0);
        assert!((m[(1, 1)] - 100.0).abs() < 1e-9);
        assert!((m[(2, 2)] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_tikhonov() {
        assert_eq!(Regularization::Tikhonov.matrix(1, 1.0), DMatrix::zeros(1, 1));
        assert_eq!(
            Regularization::Tikhonov.matrix(2, 1.0),
            DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.0, 0.5])
        );
    }

    #[test]
    fn parse_tags() {
        assert_eq!("Ridge".parse::<Regularization>(), Ok(Regularization::Ridge));
        assert_eq!("smoothness".parse::<Regularization>(), Ok(Regularization::Tikhonov));
        assert_eq!("ols".parse::<Regularization>(), Ok(Regularization::Ols));
        assert!("lasso".parse::<Regularization>().is_err());
    }
}
