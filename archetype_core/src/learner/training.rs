//! Supervised fit and held-out evaluation
//!
//! Splits a labeled dataset, fits the durable standardizer on the training
//! partition only, grows the forest and scores it on the test partition.
//! No files are touched here; persistence belongs to the trainer pipeline.

use std::time::Instant;

use serde::Serialize;

use crate::config::TrainerConfig;
use crate::data::{stratified_split, LabeledDataset, ARCHETYPE_NAMES, NUM_ARCHETYPES};
use crate::error::{EngineError, EngineResult};
use crate::learner::classifier::{Classifier, ForestConfig, RandomForest};
use crate::learner::metrics::ClassificationReport;
use crate::preprocessing::Standardizer;

/// Row counts and timing of one fit
#[derive(Debug, Clone, Serialize)]
pub struct TrainingStats {
    pub train_rows: usize,
    pub test_rows: usize,
    pub elapsed_ms: u128,
}

/// Everything produced by [`fit_and_evaluate`]
#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub forest: RandomForest,
    pub standardizer: Standardizer,
    pub report: ClassificationReport,
    pub stats: TrainingStats,
}

impl TrainingResult {
    pub fn accuracy(&self) -> f64 {
        self.report.accuracy
    }
}

pub fn fit_and_evaluate(
    dataset: &LabeledDataset,
    config: &TrainerConfig,
) -> EngineResult<TrainingResult> {
    let start_time = Instant::now();
    if dataset.is_empty() {
        return Err(EngineError::invalid_input(
            "labeled dataset",
            "contains no rows",
        ));
    }

    let split = stratified_split(&dataset.labels, config.test_fraction, config.seed)?;
    let (train_x, train_y) = dataset.select(&split.train);
    let (test_x, test_y) = dataset.select(&split.test);

    let standardizer = Standardizer::fit(train_x.view())?;
    let train_scaled = standardizer.transform(train_x.view())?;
    let test_scaled = standardizer.transform(test_x.view())?;

    tracing::info!(
        "Training random forest on {} rows ({} held out)",
        train_y.len(),
        test_y.len()
    );
    let forest = RandomForest::fit(
        train_scaled.view(),
        &train_y,
        NUM_ARCHETYPES,
        ForestConfig::from(config),
    )?;

    let predicted = forest.predict_batch(test_scaled.view());
    let report = ClassificationReport::new(&test_y, &predicted, &ARCHETYPE_NAMES);

    Ok(TrainingResult {
        forest,
        standardizer,
        report,
        stats: TrainingStats {
            train_rows: train_y.len(),
            test_rows: test_y.len(),
            elapsed_ms: start_time.elapsed().as_millis(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NUM_QUESTIONS;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Each archetype answers its "own" dimension high and the rest neutral.
    fn synthetic_dataset(per_class: usize, seed: u64) -> LabeledDataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = per_class * NUM_ARCHETYPES;
        let labels: Vec<usize> = (0..n).map(|i| i % NUM_ARCHETYPES).collect();
        let features = Array2::from_shape_fn((n, NUM_QUESTIONS), |(r, c)| {
            let base = if c / 10 == labels[r] { 4.5 } else { 2.5 };
            (base + rng.gen_range(-0.5..0.5_f64)).clamp(1.0, 5.0)
        });
        LabeledDataset {
            headers: (0..NUM_QUESTIONS).map(|i| format!("Q{}", i + 1)).collect(),
            features,
            labels,
        }
    }

    fn quick_config() -> TrainerConfig {
        TrainerConfig {
            n_trees: 20,
            max_depth: 8,
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn test_fit_and_evaluate_separable() {
        let dataset = synthetic_dataset(20, 1);
        let result = fit_and_evaluate(&dataset, &quick_config()).unwrap();

        assert_eq!(result.stats.test_rows, 20);
        assert_eq!(result.stats.train_rows, 80);
        assert!(result.accuracy() > 0.9);
        assert_eq!(result.report.classes.len(), NUM_ARCHETYPES);
        assert_eq!(result.report.classes[0].label, "Analytical Thinker");
        assert_eq!(result.forest.model_type(), "Random Forest");
    }

    #[test]
    fn test_standardizer_fitted_on_training_rows_only() {
        let dataset = synthetic_dataset(20, 2);
        let config = quick_config();
        let result = fit_and_evaluate(&dataset, &config).unwrap();

        let split = stratified_split(&dataset.labels, config.test_fraction, config.seed).unwrap();
        let (train_x, _) = dataset.select(&split.train);
        let expected = Standardizer::fit(train_x.view()).unwrap();
        assert_eq!(result.standardizer, expected);
    }

    #[test]
    fn test_reported_accuracy_is_reproducible() {
        let dataset = synthetic_dataset(15, 3);
        let a = fit_and_evaluate(&dataset, &quick_config()).unwrap();
        let b = fit_and_evaluate(&dataset, &quick_config()).unwrap();
        assert_eq!(a.accuracy(), b.accuracy());
        assert_eq!(a.report.to_text(), b.report.to_text());
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let dataset = LabeledDataset {
            headers: Vec::new(),
            features: Array2::zeros((0, NUM_QUESTIONS)),
            labels: Vec::new(),
        };
        let err = fit_and_evaluate(&dataset, &quick_config()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
