//! Top-k ranking metrics over dense prediction matrices.
//!
//! Rows are users (or items, at the coarser taxonomy levels), columns a
//! shared vocabulary. Prediction scores are real valued; train and test
//! matrices are 0/1. Columns a row already has in train are never
//! recommended.
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;

use crate::EvaluationError;

fn check_cutoff(k: usize) -> Result<(), EvaluationError> {
    if k == 0 {
        Err(EvaluationError::InvalidCutoff(k))
    } else {
        Ok(())
    }
}

fn check_shapes(
    predictions: &ArrayView2<f32>,
    train: &ArrayView2<u8>,
    test: &ArrayView2<u8>,
) -> Result<(), EvaluationError> {
    let expected = predictions.dim();

    for &(name, found) in &[("train", train.dim()), ("test", test.dim())] {
        if found != expected {
            return Err(EvaluationError::ShapeMismatch {
                name,
                expected,
                found,
            });
        }
    }

    Ok(())
}

/// Fraction of the first `k` recommendations that were held out.
///
/// Lists shorter than `k` count their missing slots as misses.
pub fn precision_at_k<T: Eq + Hash>(
    held_out: &[T],
    ranked: &[T],
    k: usize,
) -> Result<f32, EvaluationError> {
    check_cutoff(k)?;

    let held_out: HashSet<&T> = held_out.iter().collect();
    let hits: HashSet<&T> = ranked
        .iter()
        .take(k)
        .filter(|x| held_out.contains(x))
        .collect();

    Ok(hits.len() as f32 / k as f32)
}

/// Columns not seen in `train`, by descending predicted score.
///
/// Ties keep ascending column order. Only candidate scores must be
/// finite; scores of training columns are never read.
pub fn rank_candidates(
    predictions: ArrayView1<f32>,
    train: ArrayView1<u8>,
) -> Result<Vec<usize>, EvaluationError> {
    if train.len() != predictions.len() {
        return Err(EvaluationError::ShapeMismatch {
            name: "train",
            expected: (1, predictions.len()),
            found: (1, train.len()),
        });
    }

    let mut candidates = Vec::with_capacity(predictions.len());

    for (column, (&score, &seen)) in predictions.iter().zip(train.iter()).enumerate() {
        if seen != 0 {
            continue;
        }
        if !score.is_finite() {
            return Err(EvaluationError::InvalidPredictionValue);
        }
        candidates.push(column);
    }

    candidates.sort_by(|&a, &b| {
        predictions[b]
            .partial_cmp(&predictions[a])
            .unwrap_or(Ordering::Equal)
    });

    Ok(candidates)
}

/// Reciprocal rank of the first relevant column in `top_k`, or zero.
pub fn mrr_single(top_k: &[usize], test: ArrayView1<u8>) -> Result<f32, EvaluationError> {
    for (rank, &column) in top_k.iter().enumerate() {
        let relevant = test.get(column).ok_or(EvaluationError::ColumnOutOfRange {
            column,
            width: test.len(),
        })?;

        if *relevant == 1 {
            return Ok(1.0 / (rank + 1) as f32);
        }
    }

    Ok(0.0)
}

fn mean_over_rows<F>(
    predictions: ArrayView2<f32>,
    train: ArrayView2<u8>,
    test: ArrayView2<u8>,
    k: usize,
    row_score: F,
) -> Result<f32, EvaluationError>
where
    F: Fn(usize, ArrayView1<f32>, ArrayView1<u8>, ArrayView1<u8>) -> Result<f32, EvaluationError>
        + Sync,
{
    check_cutoff(k)?;
    check_shapes(&predictions, &train, &test)?;

    let num_rows = predictions.nrows();
    if num_rows == 0 {
        return Ok(0.0);
    }

    let scores: Vec<f32> = (0..num_rows)
        .into_par_iter()
        .map(|row| row_score(row, predictions.row(row), train.row(row), test.row(row)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(scores.iter().sum::<f32>() / num_rows as f32)
}

fn held_out_columns(test: ArrayView1<u8>) -> Vec<usize> {
    test.iter()
        .enumerate()
        .filter(|&(_, &x)| x != 0)
        .map(|(column, _)| column)
        .collect()
}

/// Mean precision@k over all rows.
///
/// A row without test interactions scores zero and still counts
/// towards the mean. A matrix with no rows scores 0.
///
/// Each row's top-k and held-out columns are logged at `TRACE` level.
pub fn evaluate_precision(
    predictions: ArrayView2<f32>,
    train: ArrayView2<u8>,
    test: ArrayView2<u8>,
    k: usize,
) -> Result<f32, EvaluationError> {
    mean_over_rows(predictions, train, test, k, |row, predictions, train, test| {
        let ranked = rank_candidates(predictions, train)?;
        let held_out = held_out_columns(test);
        let precision = precision_at_k(&held_out, &ranked, k)?;

        trace!(
            row,
            top_k = ?&ranked[..k.min(ranked.len())],
            held_out = ?held_out,
            precision,
            "Scored row"
        );

        Ok(precision)
    })
}

/// Mean reciprocal rank of the first relevant column within the top `k`,
/// averaged over all rows. A matrix with no rows scores 0.
///
/// Each row's top-k and held-out columns are logged at `TRACE` level.
pub fn evaluate_mrr(
    predictions: ArrayView2<f32>,
    train: ArrayView2<u8>,
    test: ArrayView2<u8>,
    k: usize,
) -> Result<f32, EvaluationError> {
    mean_over_rows(predictions, train, test, k, |row, predictions, train, test| {
        let mut ranked = rank_candidates(predictions, train)?;
        ranked.truncate(k);
        let reciprocal_rank = mrr_single(&ranked, test)?;

        trace!(
            row,
            top_k = ?ranked,
            held_out = ?held_out_columns(test),
            reciprocal_rank,
            "Scored row"
        );

        Ok(reciprocal_rank)
    })
}

/// Copy of `row` with one randomly chosen nonzero entry set to zero.
///
/// The choice depends only on `seed` and the row. Rows without nonzero
/// entries are returned unchanged.
pub fn leave_one_out_mask(row: ArrayView1<u8>, seed: u64) -> Array1<u8> {
    let mut masked = row.to_owned();

    let nonzero: Vec<usize> = row
        .iter()
        .enumerate()
        .filter(|&(_, &x)| x != 0)
        .map(|(column, _)| column)
        .collect();

    let mut rng = XorShiftRng::seed_from_u64(seed);
    if let Some(&column) = nonzero.choose(&mut rng) {
        masked[column] = 0;
    }

    masked
}

/// Hold out one positive per row.
///
/// Returns the masked training matrix and a matrix holding exactly the
/// masked entries. Row `i` is masked with `seed + i`.
pub fn leave_one_out_split(matrix: ArrayView2<u8>, seed: u64) -> (Array2<u8>, Array2<u8>) {
    let mut train = matrix.to_owned();
    let mut held_out = Array2::zeros(matrix.dim());

    for (row_idx, source, train_row, held_out_row) in izip!(
        0_u64..,
        matrix.outer_iter(),
        train.outer_iter_mut(),
        held_out.outer_iter_mut()
    ) {
        let masked = leave_one_out_mask(source, seed.wrapping_add(row_idx));

        for (&before, &after, target, out) in
            izip!(source.iter(), masked.iter(), train_row, held_out_row)
        {
            *target = after;
            if before != after {
                *out = before;
            }
        }
    }

    (train, held_out)
}

/// Copy of `matrix` with its rows uniformly permuted by `rng`.
pub fn shuffle_rows<A: Clone, R: Rng>(matrix: ArrayView2<A>, rng: &mut R) -> Array2<A> {
    let mut permutation: Vec<usize> = (0..matrix.nrows()).collect();
    permutation.shuffle(rng);

    matrix.select(Axis(0), &permutation)
}
