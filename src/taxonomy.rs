//! Rolling item-level evaluation up to tags and categories.
//!
//! MRR is computed independently at the item, tag and category levels
//! and combined with fixed weights. The per-level weighted terms are
//! exposed as a [`WeightedMrr`]; [`WeightedMrr::combine`] sums them
//! into a single score.
use ndarray::ArrayView2;

use crate::data::{Interactions, TaxonomyLabel};
use crate::evaluation::evaluate_mrr;
use crate::EvaluationError;

const WEIGHT_TOLERANCE: f32 = 1e-6;

/// Labels of the items present in `groundtruth`.
///
/// Projects an item-level holdout onto its tags and categories.
pub fn taxonomy_groundtruth(
    groundtruth: &Interactions,
    taxonomy_labels: &[TaxonomyLabel],
) -> Vec<TaxonomyLabel> {
    let groundtruth_items = groundtruth.item_ids();

    taxonomy_labels
        .iter()
        .filter(|x| groundtruth_items.contains(&x.item_id()))
        .cloned()
        .collect()
}

/// Weights of the item, tag and category levels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyWeights {
    items: f32,
    tags: f32,
    categories: f32,
}

impl TaxonomyWeights {
    /// Build new weights; they must be non-negative and sum to one.
    pub fn new(items: f32, tags: f32, categories: f32) -> Result<Self, EvaluationError> {
        let weights = TaxonomyWeights {
            items,
            tags,
            categories,
        };
        weights.validate()?;

        Ok(weights)
    }

    /// Check the weights, e.g. after deserializing them.
    pub fn validate(&self) -> Result<(), EvaluationError> {
        let non_negative = self.items >= 0.0 && self.tags >= 0.0 && self.categories >= 0.0;
        let total = self.items + self.tags + self.categories;

        if non_negative && (total - 1.0).abs() <= WEIGHT_TOLERANCE {
            Ok(())
        } else {
            Err(EvaluationError::InvalidWeights(
                self.items,
                self.tags,
                self.categories,
            ))
        }
    }

    /// Weight of the item level.
    pub fn items(&self) -> f32 {
        self.items
    }

    /// Weight of the tag level.
    pub fn tags(&self) -> f32 {
        self.tags
    }

    /// Weight of the category level.
    pub fn categories(&self) -> f32 {
        self.categories
    }
}

impl Default for TaxonomyWeights {
    fn default() -> Self {
        TaxonomyWeights {
            items: 0.5,
            tags: 0.2,
            categories: 0.3,
        }
    }
}

/// Per-level MRR, each already multiplied by its weight.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedMrr {
    /// Weighted item-level MRR.
    pub items: f32,
    /// Weighted tag-level MRR.
    pub tags: f32,
    /// Weighted category-level MRR.
    pub categories: f32,
}

impl WeightedMrr {
    /// The composite score. Stays in `[0, 1]` for unit-sum weights.
    pub fn combine(&self) -> f32 {
        self.items + self.tags + self.categories
    }
}

/// Weight the MRR of each taxonomy level.
pub fn weighted_mrr(
    mrr_items: f32,
    mrr_tags: f32,
    mrr_categories: f32,
    weights: &TaxonomyWeights,
) -> WeightedMrr {
    WeightedMrr {
        items: weights.items * mrr_items,
        tags: weights.tags * mrr_tags,
        categories: weights.categories * mrr_categories,
    }
}

/// The matrices scored at one taxonomy level.
#[derive(Clone, Copy, Debug)]
pub struct LevelMatrices<'a> {
    /// Predicted scores.
    pub predictions: ArrayView2<'a, f32>,
    /// Binarized training interactions.
    pub train: ArrayView2<'a, u8>,
    /// Binarized held-out interactions.
    pub test: ArrayView2<'a, u8>,
}

impl<'a> LevelMatrices<'a> {
    /// Group the three matrices of a level.
    pub fn new(
        predictions: ArrayView2<'a, f32>,
        train: ArrayView2<'a, u8>,
        test: ArrayView2<'a, u8>,
    ) -> Self {
        LevelMatrices {
            predictions,
            train,
            test,
        }
    }

    fn mrr(&self, k: usize) -> Result<f32, EvaluationError> {
        evaluate_mrr(self.predictions, self.train, self.test, k)
    }
}

/// Raw and weighted MRR at every taxonomy level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyMrr {
    /// Item-level MRR.
    pub items: f32,
    /// Tag-level MRR.
    pub tags: f32,
    /// Category-level MRR.
    pub categories: f32,
    /// The weighted breakdown.
    pub weighted: WeightedMrr,
}

/// Evaluate MRR@k at the item, tag and category levels.
pub fn taxonomy_mrr(
    items: LevelMatrices,
    tags: LevelMatrices,
    categories: LevelMatrices,
    k: usize,
    weights: &TaxonomyWeights,
) -> Result<TaxonomyMrr, EvaluationError> {
    weights.validate()?;

    let mrr_items = items.mrr(k)?;
    let mrr_tags = tags.mrr(k)?;
    let mrr_categories = categories.mrr(k)?;

    let weighted = weighted_mrr(mrr_items, mrr_tags, mrr_categories, weights);

    info!(
        items = mrr_items,
        tags = mrr_tags,
        categories = mrr_categories,
        composite = weighted.combine(),
        "Evaluated taxonomy MRR"
    );

    Ok(TaxonomyMrr {
        items: mrr_items,
        tags: mrr_tags,
        categories: mrr_categories,
        weighted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::data::Interaction;

    #[test]
    fn groundtruth_keeps_labels_of_held_out_items() {
        let groundtruth = Interactions::from(vec![
            Interaction::new(1, 10, 5, 4.0),
            Interaction::new(2, 10, 6, 4.0),
            Interaction::new(2, 12, 7, 5.0),
        ]);
        let labels = vec![
            TaxonomyLabel::new(10, "funny", "Comedy"),
            TaxonomyLabel::new(11, "dark", "Drama"),
            TaxonomyLabel::new(12, "space", "Sci-Fi"),
        ];

        let projected = taxonomy_groundtruth(&groundtruth, &labels);

        assert_eq!(projected, vec![labels[0].clone(), labels[2].clone()]);
    }

    #[test]
    fn default_weights_are_valid() {
        let weights = TaxonomyWeights::default();

        assert!(weights.validate().is_ok());
        assert_eq!(
            (weights.items(), weights.tags(), weights.categories()),
            (0.5, 0.2, 0.3)
        );
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert_eq!(
            TaxonomyWeights::new(0.5, 0.5, 0.5),
            Err(EvaluationError::InvalidWeights(0.5, 0.5, 0.5))
        );
        assert!(TaxonomyWeights::new(1.2, -0.1, -0.1).is_err());
        assert!(TaxonomyWeights::new(0.6, 0.4, 0.0).is_ok());
    }

    #[test]
    fn weighted_terms_and_composite() {
        let weighted = weighted_mrr(1.0, 0.5, 0.0, &TaxonomyWeights::default());

        assert_eq!(weighted.items, 0.5);
        assert_eq!(weighted.tags, 0.1);
        assert_eq!(weighted.categories, 0.0);
        assert!((weighted.combine() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn perfect_rankings_combine_to_one() {
        let weighted = weighted_mrr(1.0, 1.0, 1.0, &TaxonomyWeights::default());

        assert!((weighted.combine() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn evaluates_every_level() {
        let item_predictions = array![[0.9_f32, 0.1, 0.5], [0.2, 0.8, 0.4]];
        let item_train = array![[0_u8, 0, 0], [0, 0, 0]];
        let item_test = array![[1_u8, 0, 0], [0, 0, 1]];

        let tag_predictions = array![[0.3_f32, 0.7]];
        let tag_train = array![[0_u8, 0]];
        let tag_test = array![[0_u8, 1]];

        let category_predictions = array![[0.6_f32, 0.4]];
        let category_train = array![[0_u8, 0]];
        let category_test = array![[0_u8, 0]];

        let result = taxonomy_mrr(
            LevelMatrices::new(
                item_predictions.view(),
                item_train.view(),
                item_test.view(),
            ),
            LevelMatrices::new(tag_predictions.view(), tag_train.view(), tag_test.view()),
            LevelMatrices::new(
                category_predictions.view(),
                category_train.view(),
                category_test.view(),
            ),
            2,
            &TaxonomyWeights::default(),
        )
        .unwrap();

        assert_eq!(result.items, 0.75);
        assert_eq!(result.tags, 1.0);
        assert_eq!(result.categories, 0.0);
        assert_eq!(result.weighted, weighted_mrr(0.75, 1.0, 0.0, &TaxonomyWeights::default()));
    }
}
