//! Temporal response function estimation: time-lagged regularized linear models
//! between a stimulus and a response, with leave-one-out cross-validation and
//! additive multisensory models.

#[macro_use]
extern crate log;

pub mod additive;
pub mod covariance;
pub mod crossval;
pub mod evaluate;
pub mod fit;
pub mod format;
pub mod lag_design;
mod train;

pub use additive::{multicrossvalidate, multitrain, SUPERPOSITION_FACTOR};
pub use common::*;
pub use covariance::{CovariancePair, PairedCovariance, Strategy};
pub use crossval::{crossvalidate, CrossValStats, StatGrid};
pub use evaluate::{evaluate, Score};
pub use format::group_trials;
pub use lag_design::LagDesign;
pub use train::{predict, predict_lag, train};
