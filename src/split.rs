//! Chronological train/validation/test splits.
//!
//! Every split sorts its input by timestamp, ties keeping their original
//! order, and cuts the sorted table at `floor(N * fraction)` boundaries.
use failure::Fail;
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::data::Timestamped;

// Absorbs representation error in sums such as 0.7 + 0.1.
const FRACTION_TOLERANCE: f64 = 1e-9;

/// Split error types.
#[derive(Debug, Fail, PartialEq)]
pub enum SplitError {
    /// A fraction lies outside its permitted range.
    #[fail(display = "Invalid {} fraction: {}.", name, value)]
    InvalidFraction {
        /// Which fraction.
        name: &'static str,
        /// The supplied value.
        value: f64,
    },
    /// Train and validation fractions together exceed the whole table.
    #[fail(
        display = "Train ({}) and validation ({}) fractions exceed 1.",
        train, validation
    )]
    FractionsExceedOne {
        /// The train fraction.
        train: f64,
        /// The validation fraction.
        validation: f64,
    },
    /// At least one fold must be requested.
    #[fail(display = "Invalid number of folds: {}.", _0)]
    InvalidFoldCount(usize),
}

/// Fractions of a table assigned to train, validation and test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitRatio {
    /// Train fraction.
    pub train: f64,
    /// Validation fraction.
    pub validation: f64,
    /// Test fraction; receives any rounding remainder.
    pub test: f64,
}

impl SplitRatio {
    /// Build and validate a new ratio.
    pub fn new(train: f64, validation: f64, test: f64) -> Result<Self, SplitError> {
        let ratio = SplitRatio {
            train,
            validation,
            test,
        };
        ratio.validate()?;

        Ok(ratio)
    }

    /// Check every fraction and their combined width.
    pub fn validate(&self) -> Result<(), SplitError> {
        check_open_unit("train", self.train)?;
        check_half_open_unit("validation", self.validation)?;
        check_half_open_unit("test", self.test)?;

        if self.train + self.validation > 1.0 + FRACTION_TOLERANCE {
            return Err(SplitError::FractionsExceedOne {
                train: self.train,
                validation: self.validation,
            });
        }

        let total = self.train + self.validation + self.test;
        if (total - 1.0).abs() > FRACTION_TOLERANCE {
            warn!(
                train = self.train,
                validation = self.validation,
                test = self.test,
                "Split fractions do not sum to 1; test takes the remainder"
            );
        }

        Ok(())
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        SplitRatio {
            train: 0.7,
            validation: 0.1,
            test: 0.2,
        }
    }
}

fn check_open_unit(name: &'static str, value: f64) -> Result<(), SplitError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(SplitError::InvalidFraction { name, value })
    }
}

fn check_half_open_unit(name: &'static str, value: f64) -> Result<(), SplitError> {
    if value >= 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(SplitError::InvalidFraction { name, value })
    }
}

fn boundary(len: usize, fraction: f64) -> usize {
    let idx = (len as f64 * fraction + FRACTION_TOLERANCE).floor() as usize;

    idx.min(len)
}

fn sorted_by_timestamp<T: Timestamped + Clone>(table: &[T]) -> Vec<T> {
    let mut data = table.to_owned();
    // `sort_by_key` is stable, so equal timestamps keep their input order.
    data.sort_by_key(|x| x.timestamp());

    data
}

/// Split a table into its earliest `train_fraction` rows and the rest.
pub fn two_way_split<T: Timestamped + Clone>(
    table: &[T],
    train_fraction: f64,
) -> Result<(Vec<T>, Vec<T>), SplitError> {
    check_open_unit("train", train_fraction)?;

    let mut train = sorted_by_timestamp(table);
    let test = train.split_off(boundary(train.len(), train_fraction));

    Ok((train, test))
}

/// Split a table into consecutive train, validation and test periods.
pub fn three_way_split<T: Timestamped + Clone>(
    table: &[T],
    ratio: &SplitRatio,
) -> Result<(Vec<T>, Vec<T>, Vec<T>), SplitError> {
    ratio.validate()?;

    let mut train = sorted_by_timestamp(table);
    let train_end = boundary(train.len(), ratio.train);
    let validation_end = boundary(train.len(), ratio.train + ratio.validation);

    let test = train.split_off(validation_end);
    let validation = train.split_off(train_end);

    Ok((train, validation, test))
}

/// One randomly proportioned partition of a k-fold run.
#[derive(Clone, Debug, PartialEq)]
pub struct Fold<T> {
    /// Seed the fold's proportions were drawn with.
    pub seed: u64,
    /// The drawn proportions.
    pub ratio: SplitRatio,
    /// Earliest rows.
    pub train: Vec<T>,
    /// Rows following the train period.
    pub validation: Vec<T>,
    /// Latest rows.
    pub test: Vec<T>,
}

/// Draw fold proportions from `rng`.
///
/// Train is uniform over 0.3 to 0.9 in tenths. Validation is uniform over
/// the tenths that still leave a non-empty test period, and is zero when
/// there are none. Test takes what remains.
pub fn random_ratio<R: Rng>(rng: &mut R) -> SplitRatio {
    let train_tenths = Uniform::new_inclusive(3_u32, 9).sample(rng);
    let remaining_tenths = 10 - train_tenths;

    let validation_tenths = if remaining_tenths > 1 {
        Uniform::new(1_u32, remaining_tenths).sample(rng)
    } else {
        0
    };
    let test_tenths = remaining_tenths - validation_tenths;

    SplitRatio {
        train: f64::from(train_tenths) / 10.0,
        validation: f64::from(validation_tenths) / 10.0,
        test: f64::from(test_tenths) / 10.0,
    }
}

/// Rebuild the fold drawn with `seed`.
pub fn fold_from_seed<T: Timestamped + Clone>(table: &[T], seed: u64) -> Result<Fold<T>, SplitError> {
    let mut rng = XorShiftRng::seed_from_u64(seed);
    let ratio = random_ratio(&mut rng);

    let (train, validation, test) = three_way_split(table, &ratio)?;

    debug!(
        seed,
        train = ratio.train,
        validation = ratio.validation,
        test = ratio.test,
        "Drew fold"
    );

    Ok(Fold {
        seed,
        ratio,
        train,
        validation,
        test,
    })
}

/// Generate `k` randomly proportioned chronological folds.
///
/// Each fold draws its own seed from `rng`; the seed is kept on the
/// fold, so any single fold can be rebuilt with [`fold_from_seed`].
pub fn k_fold_split<T: Timestamped + Clone, R: Rng>(
    table: &[T],
    k: usize,
    rng: &mut R,
) -> Result<Vec<Fold<T>>, SplitError> {
    if k == 0 {
        return Err(SplitError::InvalidFoldCount(k));
    }

    let seeds: Vec<u64> = (0..k).map(|_| rng.gen()).collect();
    let folds = seeds
        .into_iter()
        .map(|seed| fold_from_seed(table, seed))
        .collect::<Result<Vec<_>, _>>()?;

    info!(num_folds = folds.len(), num_rows = table.len(), "Generated k-fold split");

    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::{parse_timestamp, Interaction};
    use crate::Timestamp;

    #[derive(Clone, Debug, PartialEq)]
    struct Row {
        id: usize,
        timestamp: Timestamp,
    }

    impl Timestamped for Row {
        fn timestamp(&self) -> Timestamp {
            self.timestamp
        }
    }

    fn rows(timestamps: &[Timestamp]) -> Vec<Row> {
        timestamps
            .iter()
            .enumerate()
            .map(|(id, &timestamp)| Row { id, timestamp })
            .collect()
    }

    fn ids(rows: &[Row]) -> Vec<usize> {
        rows.iter().map(|x| x.id).collect()
    }

    #[test]
    fn two_way_takes_earliest_rows_for_training() {
        let table: Vec<Interaction> = (1..=10)
            .map(|t| Interaction::new(0, t as usize, t, 4.0))
            .collect();

        let (train, test) = two_way_split(&table, 0.8).unwrap();

        assert_eq!(train, table[..8].to_vec());
        assert_eq!(test, table[8..].to_vec());
    }

    #[test]
    fn two_way_sorts_and_keeps_tie_order() {
        let table = rows(&[5, 1, 3, 1, 2]);

        let (train, test) = two_way_split(&table, 0.5).unwrap();

        assert_eq!(ids(&train), vec![1, 3]);
        assert_eq!(ids(&test), vec![4, 2, 0]);
    }

    #[test]
    fn two_way_orders_rows_within_the_same_second() {
        let table = vec![
            Interaction::new(0, 1, parse_timestamp("2005-04-02 23:53:47.9").unwrap(), 4.0),
            Interaction::new(0, 2, parse_timestamp("2005-04-02 23:53:47.1").unwrap(), 4.0),
        ];

        let (train, test) = two_way_split(&table, 0.5).unwrap();

        assert_eq!(train, vec![table[1].clone()]);
        assert_eq!(test, vec![table[0].clone()]);
    }

    #[test]
    fn two_way_rejects_fraction_outside_unit_interval() {
        let table = rows(&[1, 2, 3]);

        for &fraction in &[0.0, 1.0, -0.5, 1.5] {
            assert_eq!(
                two_way_split(&table, fraction),
                Err(SplitError::InvalidFraction {
                    name: "train",
                    value: fraction
                })
            );
        }
    }

    #[test]
    fn three_way_partitions_reconstruct_sorted_input() {
        let table = rows(&[9, 3, 7, 1, 5, 2, 8, 4, 6, 0, 11, 10]);
        let ratio = SplitRatio::new(0.5, 0.25, 0.25).unwrap();

        let (train, validation, test) = three_way_split(&table, &ratio).unwrap();

        assert_eq!(train.len(), 6);
        assert_eq!(validation.len(), 3);
        assert_eq!(test.len(), 3);

        let rebuilt: Vec<Timestamp> = train
            .iter()
            .chain(validation.iter())
            .chain(test.iter())
            .map(|x| x.timestamp)
            .collect();
        assert_eq!(rebuilt, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn three_way_boundaries_tolerate_float_sums() {
        let table = rows(&(0..10).collect::<Vec<_>>());
        let ratio = SplitRatio::new(0.7, 0.1, 0.2).unwrap();

        let (train, validation, test) = three_way_split(&table, &ratio).unwrap();

        assert_eq!((train.len(), validation.len(), test.len()), (7, 1, 2));
    }

    #[test]
    fn three_way_test_takes_the_remainder() {
        let table = rows(&(0..10).collect::<Vec<_>>());
        let ratio = SplitRatio::new(0.5, 0.2, 0.1).unwrap();

        let (train, validation, test) = three_way_split(&table, &ratio).unwrap();

        assert_eq!((train.len(), validation.len(), test.len()), (5, 2, 3));
        assert_eq!(ids(&test), vec![7, 8, 9]);
    }

    #[test]
    fn three_way_rejects_overlong_ratios() {
        assert_eq!(
            SplitRatio::new(0.8, 0.3, 0.1),
            Err(SplitError::FractionsExceedOne {
                train: 0.8,
                validation: 0.3
            })
        );

        let ratio = SplitRatio {
            train: 0.5,
            validation: -0.1,
            test: 0.6,
        };
        assert!(three_way_split(&rows(&[1, 2]), &ratio).is_err());
    }

    #[test]
    fn random_ratios_stay_on_the_tenths_grid() {
        let mut rng = XorShiftRng::seed_from_u64(7);

        for _ in 0..500 {
            let ratio = random_ratio(&mut rng);
            let train = (ratio.train * 10.0).round() as u32;
            let validation = (ratio.validation * 10.0).round() as u32;
            let test = (ratio.test * 10.0).round() as u32;

            assert!(train >= 3 && train <= 9);
            assert!(test >= 1);
            assert_eq!(train + validation + test, 10);
            assert!(ratio.validate().is_ok());
        }
    }

    #[test]
    fn k_fold_is_reproducible() {
        let table = rows(&(0..50).collect::<Vec<_>>());

        let first = k_fold_split(&table, 4, &mut XorShiftRng::seed_from_u64(42)).unwrap();
        let second = k_fold_split(&table, 4, &mut XorShiftRng::seed_from_u64(42)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);

        for fold in &first {
            assert_eq!(fold.train.len() + fold.validation.len() + fold.test.len(), 50);
            assert_eq!(&fold_from_seed(&table, fold.seed).unwrap(), fold);
        }
    }

    #[test]
    fn k_fold_requires_a_fold() {
        let mut rng = XorShiftRng::seed_from_u64(0);

        assert_eq!(
            k_fold_split(&rows(&[1]), 0, &mut rng),
            Err(SplitError::InvalidFoldCount(0))
        );
    }
}
