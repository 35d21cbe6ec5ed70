//! Inference and feature attribution over a loaded artifact pair
//!
//! An [`ArtifactPair`] is immutable once built; the engine shares it behind
//! an `Arc` so any number of callers can predict concurrently without
//! locking.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ndarray::{s, ArrayView1};
use serde::Serialize;
use uuid::Uuid;

use crate::checkpoint::load_pair;
use crate::data::{
    Archetype, Response, TraitDimension, TraitScores, NUM_ARCHETYPES, NUM_QUESTIONS,
};
use crate::error::{EngineError, EngineResult};
use crate::learner::{argmax, Classifier, RandomForest};
use crate::preprocessing::Standardizer;

/// Archetype prediction for one respondent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Mean raw answer per dimension on the 1-5 scale
    pub trait_scores: TraitScores,
    pub archetype_name: String,
    pub archetype_id: usize,
    /// Probability assigned to the predicted archetype
    pub confidence: f64,
    /// Probability of every archetype, keyed by name
    pub distribution: BTreeMap<String, f64>,
}

/// Forest importances per question and per dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    /// Keyed `<DIM><n>`, e.g. `EXT3`
    pub per_question: BTreeMap<String, f64>,
    /// Mean of the ten question importances, keyed by dimension code
    pub per_dimension: BTreeMap<String, f64>,
}

/// Classifier and standardizer from the same training run
#[derive(Debug)]
pub struct ArtifactPair {
    pair_id: Uuid,
    classifier: RandomForest,
    standardizer: Standardizer,
}

impl ArtifactPair {
    pub fn new(
        pair_id: Uuid,
        classifier: RandomForest,
        standardizer: Standardizer,
    ) -> EngineResult<Self> {
        if classifier.n_classes() != NUM_ARCHETYPES {
            return Err(EngineError::invalid_input(
                "artifacts",
                format!(
                    "classifier predicts {} classes, expected {}",
                    classifier.n_classes(),
                    NUM_ARCHETYPES
                ),
            ));
        }
        if classifier.n_features() != NUM_QUESTIONS || standardizer.n_features() != NUM_QUESTIONS
        {
            return Err(EngineError::invalid_input(
                "artifacts",
                format!(
                    "classifier expects {} features and standardizer {}, both must be {}",
                    classifier.n_features(),
                    standardizer.n_features(),
                    NUM_QUESTIONS
                ),
            ));
        }
        Ok(Self {
            pair_id,
            classifier,
            standardizer,
        })
    }

    /// Read both artifacts. Only a model that was never saved (neither file
    /// present) is [`EngineError::MissingInput`]; half a pair, or anything
    /// that fails to decode, is a persistence failure.
    pub fn load(classifier_path: &Path, standardizer_path: &Path) -> EngineResult<Self> {
        match (classifier_path.exists(), standardizer_path.exists()) {
            (false, false) => {
                return Err(EngineError::missing_input(classifier_path, "model artifacts"))
            }
            (true, false) => return Err(half_pair(standardizer_path)),
            (false, true) => return Err(half_pair(classifier_path)),
            (true, true) => {}
        }

        let (pair_id, classifier, standardizer) =
            load_pair::<RandomForest, Standardizer>(classifier_path, standardizer_path)
                .map_err(|err| EngineError::persistence(err.path, err.error))?;
        Self::new(pair_id, classifier, standardizer)
    }

    pub fn pair_id(&self) -> Uuid {
        self.pair_id
    }

    pub fn classifier(&self) -> &RandomForest {
        &self.classifier
    }

    pub fn standardizer(&self) -> &Standardizer {
        &self.standardizer
    }

    pub fn predict(&self, response: &Response) -> EngineResult<Prediction> {
        let scaled = self
            .standardizer
            .transform_row(ArrayView1::from(response.answers()))?;
        let probs = self.classifier.predict_proba(scaled.view());
        let predicted = argmax(probs.view());
        let archetype = Archetype(predicted);

        let distribution = probs
            .iter()
            .enumerate()
            .map(|(id, &p)| (Archetype(id).name().into_owned(), p))
            .collect();

        Ok(Prediction {
            trait_scores: response.trait_scores(),
            archetype_name: archetype.name().into_owned(),
            archetype_id: archetype.id(),
            confidence: probs.get(predicted).copied().unwrap_or(0.0),
            distribution,
        })
    }

    pub fn feature_importance(&self) -> FeatureImportance {
        let importances = self.classifier.feature_importances();
        let mut per_question = BTreeMap::new();
        let mut per_dimension = BTreeMap::new();

        for dimension in TraitDimension::all() {
            let slots = dimension.slots();
            let values = importances.slice(s![slots.start..slots.end]);
            for (offset, &value) in values.iter().enumerate() {
                per_question.insert(dimension.question_key(offset + 1), value);
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            per_dimension.insert(dimension.code().to_string(), mean);
        }

        FeatureImportance {
            per_question,
            per_dimension,
        }
    }
}

fn half_pair(absent: &Path) -> EngineError {
    EngineError::persistence(
        absent,
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "artifact missing while its partner exists",
        ),
    )
}

/// Loadedness of the engine's model
#[derive(Debug, Clone, Default)]
pub enum ModelState {
    #[default]
    Unloaded,
    Loaded(Arc<ArtifactPair>),
}

impl ModelState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }

    /// The loaded pair, or `UninitializedModel` naming `operation`
    pub fn artifacts(&self, operation: &str) -> EngineResult<Arc<ArtifactPair>> {
        match self {
            ModelState::Loaded(pair) => Ok(Arc::clone(pair)),
            ModelState::Unloaded => Err(EngineError::uninitialized(operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::save_pair;
    use crate::learner::ForestConfig;
    use ndarray::Array2;

    fn forest(n_classes: usize) -> (RandomForest, Standardizer) {
        let labels: Vec<usize> = (0..20).map(|i| i % n_classes).collect();
        let x = Array2::from_shape_fn((20, NUM_QUESTIONS), |(r, c)| {
            (labels[r] * 2 + c % 2) as f64
        });
        let config = ForestConfig {
            n_trees: 3,
            max_depth: 4,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        };
        let standardizer = Standardizer::fit(x.view()).unwrap();
        let scaled = standardizer.transform(x.view()).unwrap();
        let forest = RandomForest::fit(scaled.view(), &labels, n_classes, config).unwrap();
        (forest, standardizer)
    }

    #[test]
    fn test_pair_requires_five_archetypes() {
        let (classifier, standardizer) = forest(3);
        let err = ArtifactPair::new(Uuid::new_v4(), classifier, standardizer).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");

        let (classifier, standardizer) = forest(NUM_ARCHETYPES);
        assert!(ArtifactPair::new(Uuid::new_v4(), classifier, standardizer).is_ok());
    }

    #[test]
    fn test_load_distinguishes_absent_model_from_half_pair() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("rf_model.bin");
        let s = dir.path().join("scaler.bin");

        let err = ArtifactPair::load(&c, &s).unwrap_err();
        assert_eq!(err.kind(), "missing_input");

        let (classifier, standardizer) = forest(NUM_ARCHETYPES);
        save_pair(&c, &classifier, &s, &standardizer).unwrap();
        assert!(ArtifactPair::load(&c, &s).is_ok());

        std::fs::remove_file(&s).unwrap();
        let err = ArtifactPair::load(&c, &s).unwrap_err();
        assert_eq!(err.kind(), "persistence_failure");
        assert!(err.to_string().contains("scaler.bin"));
    }
}
