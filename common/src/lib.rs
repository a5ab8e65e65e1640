//! This crate provides the vocabulary shared by the estimation core and its callers

#![deny(unused_imports, unused_crate_dependencies)]
#![warn(missing_docs)]

mod error;
mod lags;
mod model;
mod params;

pub use error::{Result, TrfError};
pub use lags::Lags;
pub use lin_reg::Regularization;
pub use model::Model;
pub use params::{check_lambda, check_lambdas, Axis, CorrMethod, Direction, ModelType, Options, TrfParams};
