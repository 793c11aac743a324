//! Multi-label binarization over a shared class vocabulary.
//!
//! Every matrix compared by the evaluator must use the same columns in
//! the same order. Building all of them from one [`Vocabulary`] makes
//! that hold by construction.
use std::collections::HashMap;
use std::hash::Hash;
use std::iter::FromIterator;

use ndarray::Array2;

/// An ordered, duplicate-free list of classes.
#[derive(Clone, Debug, PartialEq)]
pub struct Vocabulary<T: Eq + Hash> {
    classes: Vec<T>,
    index: HashMap<T, usize>,
}

impl<T: Eq + Hash + Clone> Vocabulary<T> {
    /// Build a vocabulary keeping the first occurrence of each class.
    pub fn new(classes: Vec<T>) -> Self {
        classes.into_iter().collect()
    }

    /// Build a vocabulary whose columns are in ascending order.
    pub fn sorted<I: IntoIterator<Item = T>>(classes: I) -> Self
    where
        T: Ord,
    {
        let mut classes: Vec<T> = classes.into_iter().collect();
        classes.sort();
        classes.dedup();

        Vocabulary::new(classes)
    }

    /// Column of `class`, if it is part of the vocabulary.
    pub fn column(&self, class: &T) -> Option<usize> {
        self.index.get(class).cloned()
    }

    /// Classes in column order.
    pub fn classes(&self) -> &[T] {
        &self.classes
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether there are no classes.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for Vocabulary<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut classes = Vec::new();
        let mut index = HashMap::new();

        for class in iter {
            if !index.contains_key(&class) {
                index.insert(class.clone(), classes.len());
                classes.push(class);
            }
        }

        Vocabulary { classes, index }
    }
}

/// Encode each row's labels as a 0/1 row over `vocabulary`.
///
/// Labels outside the vocabulary are ignored. Repeated labels set the
/// same cell.
pub fn binarize<'a, T, I, L>(rows: I, vocabulary: &Vocabulary<T>) -> Array2<u8>
where
    T: 'a + Eq + Hash + Clone,
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = &'a T>,
{
    let rows: Vec<L> = rows.into_iter().collect();
    let mut matrix = Array2::zeros((rows.len(), vocabulary.len()));
    let mut unknown = 0_usize;

    for (row_idx, labels) in rows.into_iter().enumerate() {
        for label in labels {
            match vocabulary.column(label) {
                Some(column) => matrix[[row_idx, column]] = 1,
                None => unknown += 1,
            }
        }
    }

    if unknown > 0 {
        warn!(unknown, "Ignored labels outside the vocabulary");
    }

    matrix
}
