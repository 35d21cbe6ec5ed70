//! # Archetype Engine Core
//!
//! A two-stage personality archetype engine over 50-item Big Five survey
//! responses. K-means groups the corpus into five archetypes, then a random
//! forest learns to reproduce those labels so single respondents can be
//! classified and explained without re-clustering.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archetype_engine_core::{EngineConfig, PersonalityEngine};
//!
//! let config = EngineConfig::load_from_file("config/engine.toml").unwrap();
//! let engine = PersonalityEngine::new(config);
//!
//! if !engine.load_artifacts() {
//!     assert!(engine.label_dataset());
//!     let report = engine.train().unwrap();
//!     println!("accuracy: {:.4}", report.accuracy);
//! }
//!
//! let prediction = engine.predict(&[3.0; 50]).unwrap();
//! println!("{} ({:.2})", prediction.archetype_name, prediction.confidence);
//! ```
//!
//! ## Core Modules
//!
//! - [`config`] - Engine configuration via TOML
//! - [`data`] - Survey vocabulary and dataset I/O
//! - [`cluster`] - K-means used for labeling
//! - [`learner`] - Random forest, evaluation and reporting
//! - [`checkpoint`] - Versioned artifact persistence
//! - [`logging`] - JSON line-delimited run logs
//! - [`pipeline`] - Labeler, trainer, predictor and the engine facade

pub mod checkpoint;
pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod learner;
pub mod logging;
pub mod pipeline;
pub mod preprocessing;

pub use checkpoint::{Artifact, ArtifactKind, CheckpointError};
pub use cluster::{KMeans, KMeansConfig};
pub use config::{ConfigError, EngineConfig, LabelerConfig, PathsConfig, TrainerConfig};
pub use data::{
    Archetype, LabeledDataset, Response, TraitDimension, TraitScores, ARCHETYPE_NAMES,
    LABEL_COLUMN, NUM_ARCHETYPES, NUM_QUESTIONS,
};
pub use error::{EngineError, EngineResult};
pub use learner::{Classifier, ClassificationReport, ForestConfig, RandomForest};
pub use pipeline::{
    ArtifactPair, FeatureImportance, ModelInfo, ModelState, PersonalityEngine, Prediction,
    TrainingReport,
};
pub use preprocessing::Standardizer;
