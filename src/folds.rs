//! Reading and writing pre-split k-fold directories.
//!
//! Fold `i` lives in `<dir>/<i>/` and holds three tables:
//!
//! - `ui_train.csv`: training interactions,
//! - `ui_test.csv`: held-out interactions,
//! - `taxonomy_labels.csv`: the taxonomy of the fold's items.
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use failure::{self, Fail};
use serde::Serialize;

use crate::data::{Interaction, Interactions, TaxonomyLabel};
use crate::datasets::read_csv;
use crate::taxonomy::taxonomy_groundtruth;

const TRAIN_FILE: &str = "ui_train.csv";
const TEST_FILE: &str = "ui_test.csv";
const TAXONOMY_FILE: &str = "taxonomy_labels.csv";

/// Fold storage error types.
#[derive(Debug, Fail)]
pub enum DatasetError {
    /// A fold directory or one of its tables does not exist.
    #[fail(display = "Missing fold path: {}.", _0)]
    MissingFoldPath(String),
}

/// One fold's interactions with their taxonomy groundtruth.
#[derive(Clone, Debug, PartialEq)]
pub struct KFold {
    /// Training interactions.
    pub train: Interactions,
    /// Taxonomy labels of the training items.
    pub train_taxonomy: Vec<TaxonomyLabel>,
    /// Held-out interactions.
    pub test: Interactions,
    /// Taxonomy labels of the held-out items.
    pub test_taxonomy: Vec<TaxonomyLabel>,
}

fn fold_dir(directory: &Path, index: usize) -> PathBuf {
    directory.join(index.to_string())
}

fn existing(path: PathBuf) -> Result<PathBuf, DatasetError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(DatasetError::MissingFoldPath(path.display().to_string()))
    }
}

/// Read fold `index` from `directory`.
pub fn read_fold<P: AsRef<Path>>(directory: P, index: usize) -> Result<KFold, failure::Error> {
    let dir = existing(fold_dir(directory.as_ref(), index))?;

    let train: Vec<Interaction> = read_csv(existing(dir.join(TRAIN_FILE))?)?;
    let test: Vec<Interaction> = read_csv(existing(dir.join(TEST_FILE))?)?;
    let taxonomy_labels: Vec<TaxonomyLabel> = read_csv(existing(dir.join(TAXONOMY_FILE))?)?;

    let train = Interactions::from(train);
    let test = Interactions::from(test);

    Ok(KFold {
        train_taxonomy: taxonomy_groundtruth(&train, &taxonomy_labels),
        test_taxonomy: taxonomy_groundtruth(&test, &taxonomy_labels),
        train,
        test,
    })
}

/// Read folds `0..k` from `directory`.
///
/// Any missing fold aborts the whole read.
pub fn read_k_folds<P: AsRef<Path>>(directory: P, k: usize) -> Result<Vec<KFold>, failure::Error> {
    let directory = directory.as_ref();

    let folds = (0..k)
        .map(|index| read_fold(directory, index))
        .collect::<Result<Vec<_>, _>>()?;

    info!(num_folds = folds.len(), directory = %directory.display(), "Read k folds");

    Ok(folds)
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), failure::Error> {
    let mut writer = csv::Writer::from_path(path)?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write one fold to `<directory>/<index>/`, creating it if needed.
pub fn write_fold<P: AsRef<Path>>(
    directory: P,
    index: usize,
    train: &Interactions,
    test: &Interactions,
    taxonomy_labels: &[TaxonomyLabel],
) -> Result<(), failure::Error> {
    let dir = fold_dir(directory.as_ref(), index);
    create_dir_all(&dir)?;

    write_csv(&dir.join(TRAIN_FILE), train.data())?;
    write_csv(&dir.join(TEST_FILE), test.data())?;
    write_csv(&dir.join(TAXONOMY_FILE), taxonomy_labels)?;

    debug!(
        index,
        num_train = train.len(),
        num_test = test.len(),
        "Wrote fold"
    );

    Ok(())
}

/// Write `(train, test)` pairs as folds `0..folds.len()`.
pub fn write_k_folds<P: AsRef<Path>>(
    directory: P,
    folds: &[(Interactions, Interactions)],
    taxonomy_labels: &[TaxonomyLabel],
) -> Result<(), failure::Error> {
    for (index, (train, test)) in folds.iter().enumerate() {
        write_fold(directory.as_ref(), index, train, test, taxonomy_labels)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::data::NANOS_PER_SECOND;
    use crate::split::two_way_split;

    fn labels() -> Vec<TaxonomyLabel> {
        vec![
            TaxonomyLabel::new(10, "funny", "Comedy"),
            TaxonomyLabel::new(11, "bleak", "Drama"),
            TaxonomyLabel::new(12, "space", "Sci-Fi"),
        ]
    }

    fn fold(offset: i64) -> (Interactions, Interactions) {
        let train = Interactions::from(vec![
            Interaction::new(1, 10, offset, 4.0),
            Interaction::new(2, 11, offset + 1, 4.5),
        ]);
        let test = Interactions::from(vec![Interaction::new(1, 12, offset + 2, 5.0)]);

        (train, test)
    }

    #[test]
    fn round_trips_folds_with_groundtruth() {
        let dir = tempdir().unwrap();
        let folds = vec![fold(0), fold(100)];

        write_k_folds(dir.path(), &folds, &labels()).unwrap();
        let read = read_k_folds(dir.path(), 2).unwrap();

        assert_eq!(read.len(), 2);
        assert_eq!(read[1].train, folds[1].0);
        assert_eq!(read[1].test, folds[1].1);
        assert_eq!(read[0].train_taxonomy, labels()[..2].to_vec());
        assert_eq!(read[0].test_taxonomy, labels()[2..].to_vec());
    }

    #[test]
    fn reads_pandas_style_tables() {
        let dir = tempdir().unwrap();
        let fold_dir = dir.path().join("0");
        fs::create_dir_all(&fold_dir).unwrap();
        fs::write(
            fold_dir.join(TRAIN_FILE),
            ",rating,timestamp,user_id,item_id\n\
             0,4.0,2005-04-02 23:53:47,1,10\n\
             2,3.5,2005-04-02 23:53:47.25,2,11\n",
        )
        .unwrap();
        fs::write(
            fold_dir.join(TEST_FILE),
            ",rating,timestamp,user_id,item_id\n1,4.5,2005-04-03 00:00:00,1,12\n",
        )
        .unwrap();
        fs::write(
            fold_dir.join(TAXONOMY_FILE),
            "tag,category,item_id\nfunny,Comedy,10\nspace,Sci-Fi,12\n",
        )
        .unwrap();

        let folds = read_k_folds(dir.path(), 1).unwrap();

        assert_eq!(
            folds[0].train.data(),
            &[
                Interaction::new(1, 10, 1112486027 * NANOS_PER_SECOND, 4.0),
                Interaction::new(2, 11, 1112486027 * NANOS_PER_SECOND + 250_000_000, 3.5),
            ]
        );
        assert_eq!(folds[0].test_taxonomy, vec![TaxonomyLabel::new(12, "space", "Sci-Fi")]);
    }

    #[test]
    fn nanosecond_epoch_rows_split_in_time() {
        let dir = tempdir().unwrap();
        let fold_dir = dir.path().join("0");
        fs::create_dir_all(&fold_dir).unwrap();
        fs::write(
            fold_dir.join(TRAIN_FILE),
            ",rating,timestamp,user_id,item_id\n\
             0,4.0,1970-01-01 00:00:01.112486099,1,11\n\
             1,4.0,1970-01-01 00:00:01.112486027,1,10\n",
        )
        .unwrap();
        fs::write(fold_dir.join(TEST_FILE), "rating,timestamp,user_id,item_id\n").unwrap();
        fs::write(fold_dir.join(TAXONOMY_FILE), "tag,category,item_id\n").unwrap();

        let folds = read_k_folds(dir.path(), 1).unwrap();
        let (train, test) = two_way_split(folds[0].train.data(), 0.5).unwrap();

        assert_eq!(train, vec![Interaction::new(1, 10, 1_112_486_027, 4.0)]);
        assert_eq!(test, vec![Interaction::new(1, 11, 1_112_486_099, 4.0)]);
    }

    #[test]
    fn missing_fold_aborts_the_read() {
        let dir = tempdir().unwrap();
        write_k_folds(dir.path(), &[fold(0)], &labels()).unwrap();

        let error = read_k_folds(dir.path(), 2).unwrap_err();

        assert!(error.downcast_ref::<DatasetError>().is_some());
    }

    #[test]
    fn missing_table_aborts_the_read() {
        let dir = tempdir().unwrap();
        write_k_folds(dir.path(), &[fold(0)], &labels()).unwrap();
        fs::remove_file(dir.path().join("0").join(TAXONOMY_FILE)).unwrap();

        assert!(read_k_folds(dir.path(), 1).is_err());
    }
}
