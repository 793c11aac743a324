#![deny(missing_docs)]
//! # taxorec
//!
//! `taxorec` evaluates implicit-feedback recommenders offline. Given a
//! matrix of predicted scores, it ranks the items each user has not yet
//! seen and scores those rankings against held-out interactions at three
//! levels of a taxonomy: items, the tags attached to items, and the
//! categories attached to tags.
//!
//! It also produces reproducible, time-ordered train/validation/test
//! partitions of interaction logs.
//!
//! ## Example
//!
//! ```rust
//! # extern crate ndarray;
//! # extern crate taxorec;
//! use ndarray::array;
//! use taxorec::evaluation::{evaluate_mrr, evaluate_precision};
//! use taxorec::taxonomy::{weighted_mrr, TaxonomyWeights};
//!
//! let predictions = array![[0.1_f32, 0.9, 0.5, 0.2], [0.8, 0.1, 0.3, 0.6]];
//! let train = array![[1_u8, 0, 0, 0], [0, 1, 0, 0]];
//! let test = array![[0_u8, 0, 1, 0], [1, 0, 0, 0]];
//!
//! let precision = evaluate_precision(predictions.view(), train.view(), test.view(), 1).unwrap();
//! let mrr = evaluate_mrr(predictions.view(), train.view(), test.view(), 2).unwrap();
//!
//! assert_eq!(precision, 0.5);
//! assert_eq!(mrr, 0.75);
//!
//! let breakdown = weighted_mrr(mrr, 0.5, 0.25, &TaxonomyWeights::default());
//! println!("Composite MRR {}", breakdown.combine());
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate itertools;

#[cfg(feature = "csv")]
extern crate csv;
extern crate chrono;
extern crate failure;
extern crate ndarray;
extern crate rand;
extern crate rand_xorshift;
extern crate rayon;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate tracing;

use failure::Fail;

pub mod binarize;
pub mod config;
pub mod data;
#[cfg(feature = "csv")]
pub mod datasets;
pub mod evaluation;
#[cfg(feature = "csv")]
pub mod folds;
pub mod split;
pub mod taxonomy;

/// Alias for user identifiers.
pub type UserId = usize;
/// Alias for item identifiers.
pub type ItemId = usize;
/// Alias for timestamps, in nanoseconds since the Unix epoch.
pub type Timestamp = i64;
/// Alias for item tags.
pub type Tag = String;
/// Alias for tag categories.
pub type Category = String;

/// Ratings at or above this value count as positive implicit feedback.
pub const POSITIVE_RATING_THRESHOLD: f32 = 3.5;

/// Evaluation error types.
#[derive(Debug, Fail, PartialEq)]
pub enum EvaluationError {
    /// The ranking cutoff must be at least one.
    #[fail(display = "Invalid cutoff k = {}: must be at least 1.", _0)]
    InvalidCutoff(usize),
    /// Matrices compared by the evaluator do not share a shape.
    #[fail(
        display = "Shape mismatch: {} matrix is {:?}, expected {:?}.",
        name, found, expected
    )]
    ShapeMismatch {
        /// Which matrix was malformed.
        name: &'static str,
        /// The shape of the prediction matrix.
        expected: (usize, usize),
        /// The shape actually supplied.
        found: (usize, usize),
    },
    /// A ranked column does not exist in the groundtruth row.
    #[fail(display = "Column {} is outside a row of width {}.", column, width)]
    ColumnOutOfRange {
        /// The offending column.
        column: usize,
        /// Width of the row.
        width: usize,
    },
    /// Failed evaluation due to numerical issues.
    #[fail(display = "Invalid prediction value: non-finite or not a number.")]
    InvalidPredictionValue,
    /// Taxonomy weights are negative or do not sum to one.
    #[fail(
        display = "Invalid taxonomy weights ({}, {}, {}): must be non-negative and sum to 1.",
        _0, _1, _2
    )]
    InvalidWeights(f32, f32, f32),
}
