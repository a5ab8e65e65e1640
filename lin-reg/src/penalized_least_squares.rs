use nalgebra::DMatrix;

use super::{LinReg, LinRegError};

/// Solves the penalized normal equations `(Cxx + lambda * M) w = Cxy`.
/// With a ridge penalty this is Tikhonov regularization aka ridge regression,
/// which is particularly useful to mitigate multicollinearity between lags.
#[derive(Debug, Clone)]
pub struct PenalizedLeastSquares {
    /// Penalty matrix, already scaled by the sample interval
    pub penalty: DMatrix<f64>,
    /// Regularization strength
    pub regularization_coeff: f64,
}

impl PenalizedLeastSquares {
    /// Create a new solver from a penalty matrix and its strength
    pub fn new(penalty: DMatrix<f64>, regularization_coeff: f64) -> Self {
        Self {
            penalty,
            regularization_coeff,
        }
    }
}

impl LinReg for PenalizedLeastSquares {
    fn fit_readout(
        &self,
        cxx: &DMatrix<f64>,
        cxy: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, LinRegError> {
        let n = cxx.nrows();
        if cxx.ncols() != n {
            return Err(LinRegError::DimensionMismatch {
                what: "cxx",
                got: cxx.shape(),
                expected: (n, n),
            });
        }
        if self.penalty.shape() != (n, n) {
            return Err(LinRegError::DimensionMismatch {
                what: "penalty",
                got: self.penalty.shape(),
                expected: (n, n),
            });
        }
        if cxy.nrows() != n {
            return Err(LinRegError::DimensionMismatch {
                what: "cxy",
                got: cxy.shape(),
                expected: (n, cxy.ncols()),
            });
        }

        let lhs = if self.regularization_coeff == 0.0 {
            cxx.clone()
        } else {
            cxx + &self.penalty * self.regularization_coeff
        };
        let lu = lhs.lu();

        let (min_pivot, max_pivot) = lu
            .u()
            .diagonal()
            .iter()
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), p| (lo.min(p.abs()), hi.max(p.abs())));
        let rcond = if max_pivot > 0.0 { min_pivot / max_pivot } else { 0.0 };
        trace!("lu pivot ratio: {:e}", rcond);
        if !(rcond >= n as f64 * f64::EPSILON) {
            return Err(LinRegError::IllConditioned { rcond });
        }

        let w = lu.solve(cxy).ok_or(LinRegError::NotSolvable)?;
        if w.iter().any(|v| !v.is_finite()) {
            return Err(LinRegError::NonFinite);
        }

        Ok(w)
    }
}

#[cfg(test)]
mod tests {
    use round::round;

    use super::*;
    use crate::Regularization;

    // Note the first column being just ones
    fn design() -> DMatrix<f64> {
        DMatrix::from_column_slice(
            4,
            3,
            &[1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 2.0],
        )
    }

    fn fit(design: &DMatrix<f64>, targets: &DMatrix<f64>, solver: &PenalizedLeastSquares) -> DMatrix<f64> {
        let cxx = design.tr_mul(design);
        let cxy = design.tr_mul(targets);
        solver.fit_readout(&cxx, &cxy).unwrap()
    }

    #[test]
    fn unregularized_fit() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let design = design();
        let targets = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        info!("design: {}, targets: {}", design, targets);

        let solver = PenalizedLeastSquares::new(Regularization::Ridge.matrix(3, 1.0), 0.0);
        let mut readout_matrix = fit(&design, &targets, &solver);
        info!("readout_matrix: {}", readout_matrix);

        // round readout
        readout_matrix.iter_mut().for_each(|v| *v = round(*v, 1));

        assert_eq!(readout_matrix, DMatrix::from_column_slice(3, 1, &[1.0, 1.0, 0.0]));
    }

    #[test]
    fn unregularized_fit_shifted() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let design = design() * 100.0;
        let targets = DMatrix::from_column_slice(4, 1, &[100.0, 200.0, 300.0, 400.0]);

        let solver = PenalizedLeastSquares::new(Regularization::Ols.matrix(3, 1.0), 5.0);
        let mut readout_matrix = fit(&design, &targets, &solver);
        info!("readout_matrix: {}", readout_matrix);

        readout_matrix.iter_mut().for_each(|v| *v = round(*v, 1));

        assert_eq!(readout_matrix, DMatrix::from_column_slice(3, 1, &[1.0, 1.0, 0.0]));
    }

    #[test]
    fn ridge_shrinks_but_keeps_bias() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let design = design();
        let targets = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);

        let ols = fit(&design, &targets, &PenalizedLeastSquares::new(DMatrix::zeros(3, 3), 0.0));
        let ridge = fit(
            &design,
            &targets,
            &PenalizedLeastSquares::new(Regularization::Ridge.matrix(3, 1.0), 10.0),
        );
        info!("ols: {}, ridge: {}", ols, ridge);

        let norm = |w: &DMatrix<f64>| w.rows(1, 2).norm();
        assert!(norm(&ridge) < norm(&ols));
    }

    #[test]
    fn rank_deficient_is_reported() {
        if let Err(_) = pretty_env_logger::try_init() {}

        // third column duplicates the second
        let design = DMatrix::from_column_slice(
            4,
            3,
            &[1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0],
        );
        let targets = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        let cxx = design.tr_mul(&design);
        let cxy = design.tr_mul(&targets);

        let ols = PenalizedLeastSquares::new(Regularization::Ols.matrix(3, 1.0), 0.0);
        match ols.fit_readout(&cxx, &cxy) {
            Err(LinRegError::IllConditioned { rcond }) => assert!(rcond < 1e-12),
            other => panic!("expected ill-conditioning, got {:?}", other),
        }

        // a ridge penalty makes the same problem solvable
        let ridge = PenalizedLeastSquares::new(Regularization::Ridge.matrix(3, 1.0), 1.0);
        assert!(ridge.fit_readout(&cxx, &cxy).is_ok());
    }

    #[test]
    fn mismatched_penalty() {
        let solver = PenalizedLeastSquares::new(DMatrix::zeros(2, 2), 1.0);
        let res = solver.fit_readout(&DMatrix::identity(3, 3), &DMatrix::zeros(3, 1));
        assert_eq!(
            res,
            Err(LinRegError::DimensionMismatch {
                what: "penalty",
                got: (2, 2),
                expected: (3, 3)
            })
        );
    }
}
