//! Sums of outer products of lagged designs, accumulated over trials and segments.
//!
//! Outer-product sums are additive: the covariance of a set of segments is the sum
//! of the covariances of its members. Cross-validation relies on this to derive the
//! training covariance of every fold from per-segment contributions.

use std::{
    borrow::Borrow,
    ops::{AddAssign, Range, SubAssign},
};

use common::{Direction, Lags, ModelType, Result, TrfError};
use nalgebra::DMatrix;

use crate::lag_design::{split_rows, LagDesign};

/// A contiguous block of valid rows of one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Index of the trial
    pub trial: usize,
    /// Original row positions covered
    pub rows: Range<usize>,
}

/// Cut every trial's valid rows into `split` segments.
/// Segments are ordered trial by trial, which makes their index the fold index.
pub fn plan_segments(
    trials: &[DMatrix<f64>],
    lags: Lags,
    zero_pad: bool,
    split: usize,
) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for (trial, x) in trials.iter().enumerate() {
        let rows = LagDesign::new(x, lags, zero_pad).valid_rows();
        if rows.is_empty() || split > rows.len() {
            return Err(TrfError::ShapeMismatch(format!(
                "trial {} has {} usable observations for lags [{}, {}], fewer than split = {}",
                trial,
                rows.len(),
                lags.min(),
                lags.max(),
                split
            )));
        }
        segments.extend(split_rows(rows, split).into_iter().map(|rows| Segment { trial, rows }));
    }
    Ok(segments)
}

/// Gram matrices `Cxx` and cross products `Cxy`, one block per lag group.
/// Multi-lag models carry a single `(F*L+1)` block, single-lag models one `(F+1)` block per lag.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariancePair {
    /// Predictor-predictor products
    pub cxx: Vec<DMatrix<f64>>,
    /// Predictor-predictand products
    pub cxy: Vec<DMatrix<f64>>,
}

impl CovariancePair {
    /// Covariance contributed by `rows` of a trial
    pub fn of_segment(
        design: &LagDesign,
        y: &DMatrix<f64>,
        rows: Range<usize>,
        model_type: ModelType,
    ) -> Self {
        let span = rows.clone();
        let groups = (0..design.n_groups(model_type)).map(move |g| design.group(span.clone(), model_type, g));
        Self::of_designs(groups, y, rows)
    }

    /// Covariance of lag group designs already built over `rows`
    pub fn of_designs<X>(designs: impl IntoIterator<Item = X>, y: &DMatrix<f64>, rows: Range<usize>) -> Self
    where
        X: Borrow<DMatrix<f64>>,
    {
        let y_seg = y.rows_range(rows);
        let (cxx, cxy) = designs
            .into_iter()
            .map(|x| {
                let x = x.borrow();
                (x.tr_mul(x), x.tr_mul(&y_seg))
            })
            .unzip();
        Self { cxx, cxy }
    }

    /// Number of independently solved lag groups
    #[inline(always)]
    pub fn n_groups(&self) -> usize {
        self.cxx.len()
    }
}

fn add_blocks(a: &mut [DMatrix<f64>], b: &[DMatrix<f64>]) {
    a.iter_mut().zip(b.iter()).for_each(|(a, b)| *a += b);
}

fn sub_blocks(a: &mut [DMatrix<f64>], b: &[DMatrix<f64>]) {
    a.iter_mut().zip(b.iter()).for_each(|(a, b)| *a -= b);
}

impl AddAssign<&CovariancePair> for CovariancePair {
    fn add_assign(&mut self, rhs: &CovariancePair) {
        add_blocks(&mut self.cxx, &rhs.cxx);
        add_blocks(&mut self.cxy, &rhs.cxy);
    }
}

impl SubAssign<&CovariancePair> for CovariancePair {
    fn sub_assign(&mut self, rhs: &CovariancePair) {
        sub_blocks(&mut self.cxx, &rhs.cxx);
        sub_blocks(&mut self.cxy, &rhs.cxy);
    }
}

/// Covariances of the two unisensory relationships of an additive model.
/// When both relationships share one predictor its Gram matrices are held once.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedCovariance {
    /// Gram matrices of the first (or shared) predictor
    pub cxx1: Vec<DMatrix<f64>>,
    /// Gram matrices of the second predictor, `None` when the predictor is shared
    pub cxx2: Option<Vec<DMatrix<f64>>>,
    /// Cross products of the first relationship
    pub cxy1: Vec<DMatrix<f64>>,
    /// Cross products of the second relationship
    pub cxy2: Vec<DMatrix<f64>>,
}

impl PairedCovariance {
    /// One predictor shared by two predictands (forward additive models)
    pub fn shared_predictor(
        design: &LagDesign,
        y1: &DMatrix<f64>,
        y2: &DMatrix<f64>,
        rows: Range<usize>,
        model_type: ModelType,
    ) -> Self {
        let span = rows.clone();
        let groups = (0..design.n_groups(model_type)).map(move |g| design.group(span.clone(), model_type, g));
        Self::of_shared_designs(groups, y1, y2, rows)
    }

    /// Shared predictor covariance from lag group designs already built over `rows`
    pub fn of_shared_designs<X>(
        designs: impl IntoIterator<Item = X>,
        y1: &DMatrix<f64>,
        y2: &DMatrix<f64>,
        rows: Range<usize>,
    ) -> Self
    where
        X: Borrow<DMatrix<f64>>,
    {
        let y1_seg = y1.rows_range(rows.clone());
        let y2_seg = y2.rows_range(rows);
        let mut out = Self {
            cxx1: vec![],
            cxx2: None,
            cxy1: vec![],
            cxy2: vec![],
        };
        for x in designs {
            let x = x.borrow();
            out.cxx1.push(x.tr_mul(x));
            out.cxy1.push(x.tr_mul(&y1_seg));
            out.cxy2.push(x.tr_mul(&y2_seg));
        }
        out
    }

    /// Two predictors sharing one predictand (backward additive models)
    pub fn shared_predictand(
        design1: &LagDesign,
        design2: &LagDesign,
        y: &DMatrix<f64>,
        rows: Range<usize>,
        model_type: ModelType,
    ) -> Self {
        let first = CovariancePair::of_segment(design1, y, rows.clone(), model_type);
        let second = CovariancePair::of_segment(design2, y, rows, model_type);
        Self {
            cxx1: first.cxx,
            cxx2: Some(second.cxx),
            cxy1: first.cxy,
            cxy2: second.cxy,
        }
    }

    /// Gram matrices of the second predictor, which are the first's when shared
    #[inline(always)]
    pub fn second_gram(&self) -> &[DMatrix<f64>] {
        self.cxx2.as_deref().unwrap_or(&self.cxx1)
    }
}

impl AddAssign<&PairedCovariance> for PairedCovariance {
    fn add_assign(&mut self, rhs: &PairedCovariance) {
        add_blocks(&mut self.cxx1, &rhs.cxx1);
        if let (Some(a), Some(b)) = (self.cxx2.as_mut(), rhs.cxx2.as_ref()) {
            add_blocks(a, b);
        }
        add_blocks(&mut self.cxy1, &rhs.cxy1);
        add_blocks(&mut self.cxy2, &rhs.cxy2);
    }
}

impl SubAssign<&PairedCovariance> for PairedCovariance {
    fn sub_assign(&mut self, rhs: &PairedCovariance) {
        sub_blocks(&mut self.cxx1, &rhs.cxx1);
        if let (Some(a), Some(b)) = (self.cxx2.as_mut(), rhs.cxx2.as_ref()) {
            sub_blocks(a, b);
        }
        sub_blocks(&mut self.cxy1, &rhs.cxy1);
        sub_blocks(&mut self.cxy2, &rhs.cxy2);
    }
}

/// How per-segment covariances are retained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Keep every segment's covariance, memory grows with the number of folds
    Fast,
    /// Keep only the grand total, constant memory
    Slow,
}

impl Strategy {
    /// Select the strategy from the `fast` option
    #[inline(always)]
    pub fn from_fast(fast: bool) -> Self {
        if fast {
            Strategy::Fast
        } else {
            Strategy::Slow
        }
    }
}

/// Accumulated covariances under either strategy.
/// Both variants yield identical totals and identical leave-one-out covariances.
#[derive(Debug, Clone)]
pub enum Accumulator<C> {
    /// One entry per segment
    Fast(Vec<C>),
    /// Sum over all segments
    Slow(C),
}

impl<C> Accumulator<C>
where
    C: Clone + for<'c> AddAssign<&'c C> + for<'c> SubAssign<&'c C>,
{
    /// Accumulate per-segment covariances.
    /// The slow strategy folds each contribution into the total as it arrives.
    pub fn collect<I>(strategy: Strategy, segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
    {
        let mut segments = segments.into_iter();
        let acc = match strategy {
            Strategy::Fast => Accumulator::Fast(segments.collect::<Vec<_>>()),
            Strategy::Slow => match segments.next() {
                Some(first) => Accumulator::Slow(segments.fold(first, |mut total, c| {
                    total += &c;
                    total
                })),
                None => Accumulator::Fast(vec![]),
            },
        };
        match &acc {
            Accumulator::Fast(segs) if segs.is_empty() => {
                Err(TrfError::ShapeMismatch("no segments to accumulate".to_string()))
            }
            _ => Ok(acc),
        }
    }

    /// Covariance over all segments
    pub fn total(&self) -> C {
        match self {
            // never empty, see `collect`
            Accumulator::Fast(segs) => {
                let mut sum = segs[0].clone();
                segs[1..].iter().for_each(|c| sum += c);
                sum
            }
            Accumulator::Slow(total) => total.clone(),
        }
    }

    /// Covariance over all segments but `fold`.
    /// `held_out` computes the held-out segment's own covariance and is only
    /// invoked by the slow strategy, which subtracts it from the total.
    pub fn leave_out<F>(&self, fold: usize, held_out: F) -> Result<C>
    where
        F: FnOnce() -> C,
    {
        match self {
            Accumulator::Fast(segs) => sum_except(segs, Some(fold)).ok_or_else(|| {
                TrfError::ShapeMismatch(
                    "cross-validation needs at least two segments".to_string(),
                )
            }),
            Accumulator::Slow(total) => {
                let mut c = total.clone();
                c -= &held_out();
                Ok(c)
            }
        }
    }
}

fn sum_except<C>(segs: &[C], skip: Option<usize>) -> Option<C>
where
    C: Clone + for<'c> AddAssign<&'c C>,
{
    let mut kept = segs.iter().enumerate().filter(|(i, _)| Some(*i) != skip).map(|(_, c)| c);
    let mut sum = kept.next()?.clone();
    kept.for_each(|c| sum += c);
    Some(sum)
}

/// Covariances of predictor / predictand trial pairs.
/// Designs are built per segment and discarded right after their outer products are taken.
pub fn ordinary(
    x: &[DMatrix<f64>],
    y: &[DMatrix<f64>],
    segments: &[Segment],
    lags: Lags,
    model_type: ModelType,
    zero_pad: bool,
    strategy: Strategy,
) -> Result<Accumulator<CovariancePair>> {
    debug!("accumulating {} segments with {:?} strategy", segments.len(), strategy);
    Accumulator::collect(
        strategy,
        segments.iter().map(|s| {
            let design = LagDesign::new(&x[s.trial], lags, zero_pad);
            CovariancePair::of_segment(&design, &y[s.trial], s.rows.clone(), model_type)
        }),
    )
}

/// Covariances of the two unisensory relationships of an additive model.
/// Forward models share the stimulus `x` as predictor of `y1` and `y2`;
/// backward models use `y1` and `y2` as predictors of the shared stimulus `x`.
#[allow(clippy::too_many_arguments)]
pub fn paired(
    direction: Direction,
    x: &[DMatrix<f64>],
    y1: &[DMatrix<f64>],
    y2: &[DMatrix<f64>],
    segments: &[Segment],
    lags: Lags,
    model_type: ModelType,
    zero_pad: bool,
    strategy: Strategy,
) -> Result<Accumulator<PairedCovariance>> {
    debug!(
        "accumulating {} paired segments ({:?}) with {:?} strategy",
        segments.len(),
        direction,
        strategy
    );
    Accumulator::collect(
        strategy,
        segments.iter().map(|s| paired_segment(direction, x, y1, y2, s, lags, model_type, zero_pad)),
    )
}

/// Paired covariance contributed by a single segment
#[allow(clippy::too_many_arguments)]
pub fn paired_segment(
    direction: Direction,
    x: &[DMatrix<f64>],
    y1: &[DMatrix<f64>],
    y2: &[DMatrix<f64>],
    s: &Segment,
    lags: Lags,
    model_type: ModelType,
    zero_pad: bool,
) -> PairedCovariance {
    let t = s.trial;
    match direction {
        Direction::Forward => PairedCovariance::shared_predictor(
            &LagDesign::new(&x[t], lags, zero_pad),
            &y1[t],
            &y2[t],
            s.rows.clone(),
            model_type,
        ),
        Direction::Backward => PairedCovariance::shared_predictand(
            &LagDesign::new(&y1[t], lags, zero_pad),
            &LagDesign::new(&y2[t], lags, zero_pad),
            &x[t],
            s.rows.clone(),
            model_type,
        ),
    }
}
