//! Engine configuration management via TOML files.
//!
//! Every section is optional; missing values fall back to the defaults the
//! archetype model was designed around (seed 42, 10 k-means restarts, a
//! 100-tree forest of depth 20 and an 80/20 split).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Engine configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use archetype_engine_core::EngineConfig;
///
/// let config = EngineConfig::load_from_file("config/engine.toml")
///     .unwrap_or_else(|_| EngineConfig::default());
///
/// println!("Labeled dataset: {}", config.paths.labeled_dataset.display());
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineConfig {
    pub paths: PathsConfig,
    pub labeler: LabelerConfig,
    pub trainer: TrainerConfig,
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawEngineConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let paths = PathsConfig::from_raw(raw.paths.unwrap_or_default());
        let labeler = LabelerConfig::try_from(raw.labeler.unwrap_or_default())?;
        let trainer = TrainerConfig::try_from(raw.trainer.unwrap_or_default())?;

        Ok(Self {
            paths,
            labeler,
            trainer,
        })
    }

    /// Resolve every relative path against `root`.
    pub fn rooted_at<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        let paths = &mut self.paths;
        for path in [
            &mut paths.raw_dataset,
            &mut paths.labeled_dataset,
            &mut paths.classifier,
            &mut paths.standardizer,
            &mut paths.log_dir,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }
}

/// Locations of the datasets, artifacts and run logs.
#[derive(Debug, Clone, Serialize)]
pub struct PathsConfig {
    /// Tab-separated raw survey corpus
    pub raw_dataset: PathBuf,
    /// CSV written by the labeler and read by the trainer
    pub labeled_dataset: PathBuf,
    /// Serialized random forest
    pub classifier: PathBuf,
    /// Serialized standardizer fitted alongside the classifier
    pub standardizer: PathBuf,
    /// Directory for JSON line run logs
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dataset: PathBuf::from("data-final.csv"),
            labeled_dataset: PathBuf::from("clustered_dataset.csv"),
            classifier: PathBuf::from("model/rf_model.bin"),
            standardizer: PathBuf::from("model/scaler.bin"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl PathsConfig {
    fn from_raw(raw: RawPaths) -> Self {
        let defaults = Self::default();
        Self {
            raw_dataset: raw.raw_dataset.unwrap_or(defaults.raw_dataset),
            labeled_dataset: raw.labeled_dataset.unwrap_or(defaults.labeled_dataset),
            classifier: raw.classifier.unwrap_or(defaults.classifier),
            standardizer: raw.standardizer.unwrap_or(defaults.standardizer),
            log_dir: raw.log_dir.unwrap_or(defaults.log_dir),
        }
    }
}

/// K-means parameters for the unsupervised labeling pass.
#[derive(Debug, Clone, Serialize)]
pub struct LabelerConfig {
    pub seed: u64,
    /// Number of independent centroid initializations
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative tolerance on total center shift
    pub tol: f64,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
        }
    }
}

impl LabelerConfig {
    fn try_from(raw: RawLabeler) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            seed: raw.seed.unwrap_or(defaults.seed),
            n_init: raw.n_init.unwrap_or(defaults.n_init),
            max_iter: raw.max_iter.unwrap_or(defaults.max_iter),
            tol: raw.tol.unwrap_or(defaults.tol),
        };

        if config.n_init == 0 {
            return Err(ConfigError::Parse("labeler.n_init must be non-zero".into()));
        }
        if config.max_iter == 0 {
            return Err(ConfigError::Parse(
                "labeler.max_iter must be non-zero".into(),
            ));
        }
        if !config.tol.is_finite() || config.tol < 0.0 {
            return Err(ConfigError::Parse(
                "labeler.tol must be a non-negative number".into(),
            ));
        }
        Ok(config)
    }
}

/// Split and random forest hyperparameters for the supervised pass.
#[derive(Debug, Clone, Serialize)]
pub struct TrainerConfig {
    pub seed: u64,
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            n_trees: 100,
            max_depth: 20,
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

impl TrainerConfig {
    fn try_from(raw: RawTrainer) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            seed: raw.seed.unwrap_or(defaults.seed),
            test_fraction: raw.test_fraction.unwrap_or(defaults.test_fraction),
            n_trees: raw.n_trees.unwrap_or(defaults.n_trees),
            max_depth: raw.max_depth.unwrap_or(defaults.max_depth),
            min_samples_split: raw.min_samples_split.unwrap_or(defaults.min_samples_split),
            min_samples_leaf: raw.min_samples_leaf.unwrap_or(defaults.min_samples_leaf),
        };

        if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
            return Err(ConfigError::Parse(
                "trainer.test_fraction must lie strictly between 0 and 1".into(),
            ));
        }
        if config.n_trees == 0 {
            return Err(ConfigError::Parse("trainer.n_trees must be non-zero".into()));
        }
        if config.max_depth == 0 {
            return Err(ConfigError::Parse(
                "trainer.max_depth must be non-zero".into(),
            ));
        }
        if config.min_samples_split < 2 {
            return Err(ConfigError::Parse(
                "trainer.min_samples_split must be at least 2".into(),
            ));
        }
        if config.min_samples_leaf == 0 {
            return Err(ConfigError::Parse(
                "trainer.min_samples_leaf must be non-zero".into(),
            ));
        }
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEngineConfig {
    paths: Option<RawPaths>,
    labeler: Option<RawLabeler>,
    trainer: Option<RawTrainer>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPaths {
    raw_dataset: Option<PathBuf>,
    labeled_dataset: Option<PathBuf>,
    classifier: Option<PathBuf>,
    standardizer: Option<PathBuf>,
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLabeler {
    seed: Option<u64>,
    n_init: Option<usize>,
    max_iter: Option<usize>,
    tol: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTrainer {
    seed: Option<u64>,
    test_fraction: Option<f64>,
    n_trees: Option<usize>,
    max_depth: Option<usize>,
    min_samples_split: Option<usize>,
    min_samples_leaf: Option<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}
