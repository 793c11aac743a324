//! Evaluation run configuration.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use failure::{self, Fail};

use crate::taxonomy::TaxonomyWeights;
use crate::POSITIVE_RATING_THRESHOLD;

/// Configuration error types.
#[derive(Debug, Fail, PartialEq)]
pub enum ConfigError {
    /// The ranking cutoff must be at least one.
    #[fail(display = "Invalid cutoff k = {}: must be at least 1.", _0)]
    InvalidCutoff(usize),
    /// At least one fold must be requested.
    #[fail(display = "Invalid number of folds: {}.", _0)]
    InvalidFoldCount(usize),
    /// The taxonomy weights are unusable.
    #[fail(display = "Invalid taxonomy weights: {:?}.", _0)]
    InvalidWeights(TaxonomyWeights),
}

/// Settings shared by a k-fold evaluation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    k: usize,
    num_folds: usize,
    seed: u64,
    weights: TaxonomyWeights,
    positive_threshold: f32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            k: 10,
            num_folds: 3,
            seed: 42,
            weights: TaxonomyWeights::default(),
            positive_threshold: POSITIVE_RATING_THRESHOLD,
        }
    }
}

impl EvaluationConfig {
    /// Build the default configuration.
    pub fn new() -> Self {
        EvaluationConfig::default()
    }

    /// Read and validate a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, failure::Error> {
        let reader = BufReader::new(File::open(path)?);
        let config: EvaluationConfig = serde_json::from_reader(reader)?;
        config.validate()?;

        Ok(config)
    }

    /// Set the ranking cutoff.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the number of folds.
    pub fn num_folds(mut self, num_folds: usize) -> Self {
        self.num_folds = num_folds;
        self
    }

    /// Set the seed of the run's random number generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the taxonomy level weights.
    pub fn weights(mut self, weights: TaxonomyWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the lowest rating counted as positive feedback.
    pub fn positive_threshold(mut self, positive_threshold: f32) -> Self {
        self.positive_threshold = positive_threshold;
        self
    }

    /// Ranking cutoff.
    pub fn get_k(&self) -> usize {
        self.k
    }

    /// Number of folds to generate.
    pub fn get_num_folds(&self) -> usize {
        self.num_folds
    }

    /// Seed for splitting and masking.
    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    /// Taxonomy level weights.
    pub fn get_weights(&self) -> &TaxonomyWeights {
        &self.weights
    }

    /// Minimum rating kept as a positive interaction.
    pub fn get_positive_threshold(&self) -> f32 {
        self.positive_threshold
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::InvalidCutoff(self.k));
        }
        if self.num_folds == 0 {
            return Err(ConfigError::InvalidFoldCount(self.num_folds));
        }
        self.weights
            .validate()
            .map_err(|_| ConfigError::InvalidWeights(self.weights))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EvaluationConfig::new().k(5).num_folds(4).seed(7);

        assert_eq!(config.get_k(), 5);
        assert_eq!(config.get_num_folds(), 4);
        assert_eq!(config.get_seed(), 7);
        assert_eq!(config.get_positive_threshold(), 3.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_cutoff() {
        assert_eq!(
            EvaluationConfig::new().k(0).validate(),
            Err(ConfigError::InvalidCutoff(0))
        );
    }

    #[test]
    fn reads_partial_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"k": 3, "weights": {{"items": 0.6, "tags": 0.2, "categories": 0.2}}}}"#)
            .unwrap();

        let config = EvaluationConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.get_k(), 3);
        assert_eq!(config.get_num_folds(), 3);
        assert_eq!(config.get_weights(), &TaxonomyWeights::new(0.6, 0.2, 0.2).unwrap());
    }

    #[test]
    fn rejects_json_with_bad_weights() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"weights": {{"items": 0.9, "tags": 0.9, "categories": 0.9}}}}"#).unwrap();

        assert!(EvaluationConfig::from_json_file(file.path()).is_err());
    }
}
