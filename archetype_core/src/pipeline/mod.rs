//! Pipeline stages and the engine that sequences them
//!
//! - [`labeler`] - raw corpus to k-means archetype labels
//! - [`trainer`] - labeled dataset to persisted forest and standardizer
//! - [`predictor`] - inference and feature attribution over a loaded pair
//! - [`engine`] - state machine a serving layer talks to

pub mod engine;
pub mod labeler;
pub mod predictor;
pub mod trainer;

pub use engine::{ModelInfo, PersonalityEngine};
pub use labeler::{Labeler, LabelingSummary};
pub use predictor::{ArtifactPair, FeatureImportance, ModelState, Prediction};
pub use trainer::{Trainer, TrainingReport};
