use std::ops::Range;

use common::{Lags, ModelType};
use nalgebra::DMatrix;

/// Time-lagged view of a feature matrix.
/// Rows of the design are generated on demand so that a trial can be
/// processed segment by segment without materializing its full design matrix.
#[derive(Debug, Clone, Copy)]
pub struct LagDesign<'a> {
    x: &'a DMatrix<f64>,
    lags: Lags,
    zero_pad: bool,
}

impl<'a> LagDesign<'a> {
    /// Create a lagged design over `x`, where rows are observations and columns are features
    ///
    /// # Arguments:
    /// x: The feature matrix
    /// lags: Lags in samples, a positive lag looks back in time
    /// zero_pad: Read zeros outside the signal instead of dropping the affected rows
    pub fn new(x: &'a DMatrix<f64>, lags: Lags, zero_pad: bool) -> Self {
        Self { x, lags, zero_pad }
    }

    /// Number of features per lag
    #[inline(always)]
    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Columns of the stacked design, including the bias column
    #[inline(always)]
    pub fn multi_width(&self) -> usize {
        self.n_features() * self.lags.len() + 1
    }

    /// Number of independently solved lag groups
    #[inline(always)]
    pub fn n_groups(&self, model_type: ModelType) -> usize {
        match model_type {
            ModelType::Multi => 1,
            ModelType::Single => self.lags.len(),
        }
    }

    /// Rows of the original signal that survive the boundary policy
    pub fn valid_rows(&self) -> Range<usize> {
        let n = self.x.nrows();
        if self.zero_pad {
            return 0..n;
        }
        let start = self.lags.leading_trim().min(n);
        let end = n.saturating_sub(self.lags.trailing_trim()).max(start);
        start..end
    }

    /// Original row positions of the design rows, used to align the predictand
    pub fn valid_row_index(&self) -> Vec<usize> {
        self.valid_rows().collect()
    }

    #[inline(always)]
    fn sample(&self, row: usize, lag: i64, feature: usize) -> f64 {
        let src = row as i64 - lag;
        if src < 0 || src >= self.x.nrows() as i64 {
            0.0
        } else {
            self.x[(src as usize, feature)]
        }
    }

    /// Stacked design for the given rows: a bias column of ones followed by
    /// one block of features per lag, in ascending lag order
    pub fn multi(&self, rows: Range<usize>) -> DMatrix<f64> {
        let f = self.n_features();
        let min = self.lags.min();
        DMatrix::from_fn(rows.len(), self.multi_width(), |i, j| {
            if j == 0 {
                1.0
            } else {
                let lag = min + ((j - 1) / f) as i64;
                self.sample(rows.start + i, lag, (j - 1) % f)
            }
        })
    }

    /// Design of a single lag for the given rows: bias column followed by that lag's features
    pub fn single(&self, rows: Range<usize>, lag_idx: usize) -> DMatrix<f64> {
        let lag = self.lags.min() + lag_idx as i64;
        DMatrix::from_fn(rows.len(), self.n_features() + 1, |i, j| {
            if j == 0 {
                1.0
            } else {
                self.sample(rows.start + i, lag, j - 1)
            }
        })
    }

    /// Design of lag group `group` for the given model type
    pub fn group(&self, rows: Range<usize>, model_type: ModelType, group: usize) -> DMatrix<f64> {
        match model_type {
            ModelType::Multi => self.multi(rows),
            ModelType::Single => self.single(rows, group),
        }
    }

    /// The full stacked design over all valid rows together with their original positions
    pub fn lagged(&self) -> (DMatrix<f64>, Vec<usize>) {
        (self.multi(self.valid_rows()), self.valid_row_index())
    }
}

/// Partition `rows` into `split` contiguous segments whose lengths differ by at most one.
/// Never yields more segments than rows.
pub fn split_rows(rows: Range<usize>, split: usize) -> Vec<Range<usize>> {
    let n = rows.len();
    let split = split.min(n);
    if split <= 1 {
        return vec![rows];
    }
    let bound = |s: usize| rows.start + s * n / split;
    (0..split).map(|s| bound(s)..bound(s + 1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUM_VALS: usize = 9;

    fn get_inputs() -> DMatrix<f64> {
        DMatrix::from_column_slice(
            NUM_VALS,
            1,
            &[0.0, 0.55, 1.0, 0.45, 0.0, -0.55, -1.0, -0.45, 0.0],
        )
    }

    #[test]
    fn zero_padded_positive_lags() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let inputs = get_inputs();
        let design = LagDesign::new(&inputs, Lags::new(0, 2).unwrap(), true);
        let lagged = design.multi(design.valid_rows());
        info!("inputs: {}", inputs);
        info!("lagged: {}", lagged);

        let goal: DMatrix<f64> = DMatrix::from_column_slice(
            NUM_VALS,
            4,
            &[
                1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, //
                0.0, 0.55, 1.0, 0.45, 0.0, -0.55, -1.0, -0.45, 0.0, //
                0.0, 0.0, 0.55, 1.0, 0.45, 0.0, -0.55, -1.0, -0.45, //
                0.0, 0.0, 0.0, 0.55, 1.0, 0.45, 0.0, -0.55, -1.0,
            ],
        );
        assert_eq!(lagged, goal);
    }

    #[test]
    fn trimmed_mixed_lags() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let inputs = get_inputs();
        let design = LagDesign::new(&inputs, Lags::new(-1, 1).unwrap(), false);
        let (lagged, index) = design.lagged();
        info!("lagged: {}", lagged);

        // one row dropped from each end
        assert_eq!(index, (1..8).collect::<Vec<_>>());
        assert_eq!(lagged.nrows(), NUM_VALS - 1 - 1);
        // row for t = 1 reads x[2], x[1], x[0]
        assert_eq!(lagged.row(0).iter().cloned().collect::<Vec<_>>(), vec![1.0, 1.0, 0.55, 0.0]);
        // row for t = 7 reads x[8], x[7], x[6]
        assert_eq!(lagged.row(6).iter().cloned().collect::<Vec<_>>(), vec![1.0, 0.0, -0.45, -1.0]);
    }

    #[test]
    fn valid_row_counts() {
        let x = DMatrix::from_fn(50, 3, |i, j| (i * 3 + j) as f64);
        for (min, max) in [(0, 4), (-3, 2), (-5, -2), (2, 6)] {
            let lags = Lags::new(min, max).unwrap();
            let trimmed = LagDesign::new(&x, lags, false).valid_rows().len();
            assert_eq!(trimmed, 50 - (max.max(0) as usize) - ((-min).max(0) as usize));
            assert_eq!(LagDesign::new(&x, lags, true).valid_rows().len(), 50);
        }
    }

    #[test]
    fn multi_feature_layout() {
        let x = DMatrix::from_fn(6, 2, |i, j| (10 * j + i) as f64);
        let design = LagDesign::new(&x, Lags::new(0, 1).unwrap(), true);
        let m = design.multi(2..4);

        assert_eq!(m.shape(), (2, 2 * 2 + 1));
        // [bias, f0 lag0, f1 lag0, f0 lag1, f1 lag1]
        assert_eq!(m.row(0).iter().cloned().collect::<Vec<_>>(), vec![1.0, 2.0, 12.0, 1.0, 11.0]);

        let s = design.single(2..4, 1);
        assert_eq!(s.shape(), (2, 3));
        assert_eq!(s.row(1).iter().cloned().collect::<Vec<_>>(), vec![1.0, 2.0, 12.0]);
        assert_eq!(design.n_groups(ModelType::Single), 2);
        assert_eq!(design.n_groups(ModelType::Multi), 1);
    }

    #[test]
    fn segments_cover_rows() {
        assert_eq!(split_rows(3..13, 3), vec![3..6, 6..9, 9..13]);
        assert_eq!(split_rows(0..9, 3), vec![0..3, 3..6, 6..9]);
        assert_eq!(split_rows(0..9, 1), vec![0..9]);
        assert_eq!(split_rows(0..9, 4), vec![0..2, 2..4, 4..6, 6..9]);
    }

    #[test]
    fn many_segments_stay_non_empty() {
        let parts = split_rows(0..1000, 60);
        assert_eq!(parts.len(), 60);
        assert!(parts.iter().all(|r| r.len() == 16 || r.len() == 17));
        assert_eq!(parts.first().map(|r| r.start), Some(0));
        assert_eq!(parts.last().map(|r| r.end), Some(1000));
        assert!(parts.windows(2).all(|w| w[0].end == w[1].start));

        let parts = split_rows(5..10, 5);
        assert!(parts.iter().all(|r| r.len() == 1));
        assert_eq!(split_rows(0..3, usize::MAX), vec![0..1, 1..2, 2..3]);
    }
}
