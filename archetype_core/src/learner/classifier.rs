//! Archetype classification model
//!
//! A random forest of CART trees predicting one of the archetype ids from
//! 50 standardized answers.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{Artifact, ArtifactKind};
use crate::config::TrainerConfig;
use crate::error::{EngineError, EngineResult};
use crate::learner::tree::{DecisionTree, TreeParams};

/// Configuration for the forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` uses `floor(sqrt(n_features))`
    pub max_features: Option<usize>,
    /// Random seed for bootstrap sampling and feature selection
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self::from(&TrainerConfig::default())
    }
}

impl From<&TrainerConfig> for ForestConfig {
    fn from(config: &TrainerConfig) -> Self {
        Self {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: None,
            seed: config.seed,
        }
    }
}

/// Index of the largest probability; ties resolve to the lowest index
pub fn argmax(probs: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (idx, &p) in probs.iter().enumerate() {
        if p > probs[best] {
            best = idx;
        }
    }
    best
}

/// Trait for archetype classification models
pub trait Classifier: Send + Sync {
    /// Class probabilities for one standardized row
    fn predict_proba(&self, row: ArrayView1<'_, f64>) -> Array1<f64>;

    /// Most likely class; ties resolve to the lowest id
    fn predict(&self, row: ArrayView1<'_, f64>) -> usize {
        argmax(self.predict_proba(row).view())
    }

    /// Predicted class for every row
    fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Vec<usize> {
        rows.outer_iter().map(|row| self.predict(row)).collect()
    }

    /// Per-feature importance, index-aligned with the input columns
    fn feature_importances(&self) -> Array1<f64>;

    fn n_classes(&self) -> usize;

    fn n_features(&self) -> usize;

    /// Tag reported alongside training results
    fn model_type(&self) -> &'static str;
}

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub const MODEL_TYPE: &'static str = "Random Forest";

    /// Fit on standardized rows `x` with class ids `y` in `0..n_classes`.
    ///
    /// Every tree receives a seed drawn from the master RNG before any tree
    /// is built, so the parallel build reproduces the sequential one.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[usize],
        n_classes: usize,
        config: ForestConfig,
    ) -> EngineResult<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(EngineError::invalid_input(
                "training rows",
                format!("{} feature rows and {} labels", n, y.len()),
            ));
        }
        if let Some(&bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(EngineError::invalid_input(
                "labels",
                format!("label {} outside 0..{}", bad, n_classes),
            ));
        }
        if config.n_trees == 0 {
            return Err(EngineError::invalid_input("n_trees", "must be non-zero"));
        }

        let n_features = x.ncols();
        let max_features = config
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1));
        let params = TreeParams {
            n_classes,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features,
        };

        let mut master = StdRng::seed_from_u64(config.seed);
        let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.gen()).collect();

        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, bootstrap, params, &mut rng)
            })
            .collect();

        Ok(Self {
            config,
            n_classes,
            n_features,
            trees,
        })
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, row: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut probs = Array1::zeros(self.n_classes);
        for tree in &self.trees {
            for (acc, p) in probs.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let total: f64 = probs.sum();
        if total > 0.0 {
            probs /= total;
        }
        probs
    }

    fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Vec<usize> {
        let rows: Vec<ArrayView1<'_, f64>> = rows.outer_iter().collect();
        rows.par_iter().map(|row| self.predict(row.view())).collect()
    }

    /// Mean of the per-tree normalised impurity decreases, renormalised.
    /// Single-leaf trees carry no information and are skipped.
    fn feature_importances(&self) -> Array1<f64> {
        let mut total = Array1::zeros(self.n_features);
        let mut contributing = 0;
        for tree in self.trees.iter().filter(|t| t.node_count() > 1) {
            for (acc, v) in total.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
            contributing += 1;
        }
        if contributing == 0 {
            return total;
        }
        total /= contributing as f64;
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        total
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn model_type(&self) -> &'static str {
        Self::MODEL_TYPE
    }
}

impl Artifact for RandomForest {
    const KIND: ArtifactKind = ArtifactKind::Classifier;
}
