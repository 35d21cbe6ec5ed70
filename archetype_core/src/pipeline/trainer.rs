//! Supervised training: labeled CSV → fitted forest + standardizer on disk.

use serde::Serialize;

use crate::checkpoint::save_pair;
use crate::config::EngineConfig;
use crate::data::read_labeled_dataset;
use crate::error::{EngineError, EngineResult};
use crate::learner::{fit_and_evaluate, Classifier};
use crate::logging::log_training_run;
use crate::pipeline::predictor::ArtifactPair;

/// Result returned to the serving layer after a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub accuracy: f64,
    /// Fixed-width precision/recall/F1 table
    pub report: String,
    pub model_type: String,
}

pub struct Trainer<'a> {
    config: &'a EngineConfig,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Train, evaluate and persist. The labeled dataset must already exist;
    /// it is never produced implicitly.
    pub fn run(&self) -> EngineResult<(TrainingReport, ArtifactPair)> {
        let paths = &self.config.paths;
        if !paths.labeled_dataset.exists() {
            return Err(EngineError::missing_input(
                &paths.labeled_dataset,
                "labeled dataset (run labeling first)",
            ));
        }

        tracing::info!("Loading labeled dataset from {}", paths.labeled_dataset.display());
        let dataset = read_labeled_dataset(&paths.labeled_dataset)?;
        let result = fit_and_evaluate(&dataset, &self.config.trainer)?;

        let pair_id = save_pair(
            &paths.classifier,
            &result.forest,
            &paths.standardizer,
            &result.standardizer,
        )
        .map_err(|err| EngineError::persistence(err.path, err.error))?;

        let report = TrainingReport {
            accuracy: result.accuracy(),
            report: result.report.to_text(),
            model_type: result.forest.model_type().to_string(),
        };
        tracing::info!("Random forest and standardizer saved (run {})", pair_id);
        tracing::info!("Model accuracy: {:.4}", report.accuracy);
        tracing::info!("Classification report:\n{}", report.report);

        if let Err(err) = log_training_run(
            &paths.log_dir,
            &pair_id.to_string(),
            report.accuracy,
            &result.stats,
        ) {
            tracing::warn!("Failed to append training log: {}", err);
        }

        let artifacts = ArtifactPair::new(pair_id, result.forest, result.standardizer)?;
        Ok((report, artifacts))
    }
}
