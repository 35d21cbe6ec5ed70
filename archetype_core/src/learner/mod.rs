//! Learner module - supervised half of the archetype engine
//!
//! Reproduces the cluster-assigned archetypes with a random forest so that
//! new respondents can be classified without re-running k-means:
//! - CART trees with Gini impurity
//! - Bagged, seed-reproducible forest built on the rayon pool
//! - Stratified hold-out evaluation with a per-class report

pub mod classifier;
pub mod metrics;
pub mod training;
pub mod tree;

pub use classifier::{argmax, Classifier, ForestConfig, RandomForest};
pub use metrics::{accuracy, ClassMetrics, ClassificationReport};
pub use training::{fit_and_evaluate, TrainingResult, TrainingStats};
pub use tree::{DecisionTree, TreeParams};
