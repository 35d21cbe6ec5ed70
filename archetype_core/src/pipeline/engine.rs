//! Entry point for a serving layer
//!
//! [`PersonalityEngine`] owns the configuration, the model slot and a job
//! guard. Labeling and training take the guard so that two runs through the
//! same engine never interleave their file writes; separate processes
//! sharing the artifact paths still race, and the later writer wins. A torn
//! pair from such a race is rejected on load by the pair id check.

use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use crate::config::EngineConfig;
use crate::data::{Response, TraitDimension, ARCHETYPE_NAMES, NUM_ARCHETYPES, NUM_QUESTIONS};
use crate::error::{EngineError, EngineResult};
use crate::learner::RandomForest;
use crate::pipeline::labeler::{Labeler, LabelingSummary};
use crate::pipeline::predictor::{ArtifactPair, FeatureImportance, ModelState, Prediction};
use crate::pipeline::trainer::{Trainer, TrainingReport};

/// Static description of the model surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub features: usize,
    pub classes: usize,
    pub archetypes: Vec<String>,
    pub dimensions: Vec<String>,
    pub loaded: bool,
}

#[derive(Debug, Default)]
pub struct PersonalityEngine {
    config: EngineConfig,
    model: RwLock<ModelState>,
    jobs: Mutex<()>,
}

impl PersonalityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            model: RwLock::new(ModelState::Unloaded),
            jobs: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn state(&self) -> ModelState {
        self.model
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn install(&self, pair: ArtifactPair) {
        let mut slot = self
            .model
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = ModelState::Loaded(Arc::new(pair));
    }

    pub fn is_loaded(&self) -> bool {
        self.state().is_loaded()
    }

    /// Load the persisted classifier and standardizer. Returns `false`, and
    /// leaves the current state untouched, unless both were found, decoded
    /// and belong to the same training run.
    pub fn load_artifacts(&self) -> bool {
        match self.try_load_artifacts() {
            Ok(()) => true,
            Err(EngineError::MissingInput { path, .. }) => {
                tracing::info!("No saved model at {}", path.display());
                false
            }
            Err(err) => {
                tracing::error!("Failed to load model artifacts: {}", err);
                false
            }
        }
    }

    pub fn try_load_artifacts(&self) -> EngineResult<()> {
        let paths = &self.config.paths;
        let pair = ArtifactPair::load(&paths.classifier, &paths.standardizer)?;
        tracing::info!("Loaded model artifacts (run {})", pair.pair_id());
        self.install(pair);
        Ok(())
    }

    /// Cluster the raw corpus and write the labeled dataset.
    pub fn label_dataset(&self) -> bool {
        match self.try_label_dataset() {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("Failed to build labeled dataset: {}", err);
                false
            }
        }
    }

    pub fn try_label_dataset(&self) -> EngineResult<LabelingSummary> {
        let _guard = self
            .jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Labeler::new(&self.config).run()
    }

    /// Train on the labeled dataset, persist the artifacts and make them the
    /// active model.
    pub fn train(&self) -> EngineResult<TrainingReport> {
        let _guard = self
            .jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (report, pair) = Trainer::new(&self.config).run()?;
        self.install(pair);
        Ok(report)
    }

    pub fn predict(&self, answers: &[f64]) -> EngineResult<Prediction> {
        let artifacts = self.state().artifacts("predict")?;
        let response = Response::new(answers)?;
        artifacts.predict(&response)
    }

    pub fn feature_importance(&self) -> EngineResult<FeatureImportance> {
        let artifacts = self.state().artifacts("feature_importance")?;
        Ok(artifacts.feature_importance())
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_type: RandomForest::MODEL_TYPE.to_string(),
            features: NUM_QUESTIONS,
            classes: NUM_ARCHETYPES,
            archetypes: ARCHETYPE_NAMES.iter().map(|n| n.to_string()).collect(),
            dimensions: TraitDimension::all()
                .iter()
                .map(|d| d.code().to_string())
                .collect(),
            loaded: self.is_loaded(),
        }
    }
}
