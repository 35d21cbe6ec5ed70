//! Unsupervised labeling: raw corpus → k-means archetypes → labeled CSV.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::cluster::{KMeans, KMeansConfig};
use crate::config::EngineConfig;
use crate::data::{read_raw_dataset, write_labeled_dataset, Archetype, NUM_ARCHETYPES};
use crate::error::{EngineError, EngineResult};
use crate::logging::log_labeling_run;
use crate::preprocessing::Standardizer;

/// What a labeling run produced
#[derive(Debug, Clone, Serialize)]
pub struct LabelingSummary {
    pub total_rows: usize,
    pub labeled_rows: usize,
    /// Respondents per archetype name
    pub archetype_sizes: BTreeMap<String, usize>,
    pub inertia: f64,
    pub output: PathBuf,
}

pub struct Labeler<'a> {
    config: &'a EngineConfig,
}

impl<'a> Labeler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> EngineResult<LabelingSummary> {
        let paths = &self.config.paths;
        tracing::info!("Building labeled dataset from {}", paths.raw_dataset.display());

        let raw = read_raw_dataset(&paths.raw_dataset)?;
        if raw.len() < NUM_ARCHETYPES {
            return Err(EngineError::invalid_input(
                "raw survey dataset",
                format!(
                    "{} complete rows, at least {} needed to form the archetypes",
                    raw.len(),
                    NUM_ARCHETYPES
                ),
            ));
        }

        // The clustering scale lives only inside this block.
        let clusters = {
            let scaler = Standardizer::fit(raw.features.view())?;
            let scaled = scaler.transform(raw.features.view())?;
            let kmeans_config = KMeansConfig::from_labeler(NUM_ARCHETYPES, &self.config.labeler);
            KMeans::fit(scaled.view(), &kmeans_config)?
        };

        write_labeled_dataset(
            &paths.labeled_dataset,
            &raw.headers,
            raw.features.view(),
            &clusters.labels,
        )?;

        let sizes = clusters.cluster_sizes();
        let mut archetype_sizes = BTreeMap::new();
        for (id, &count) in sizes.iter().enumerate() {
            let name = Archetype(id).name();
            tracing::info!("  {}: {} respondents", name, count);
            archetype_sizes.insert(name.into_owned(), count);
        }
        tracing::info!(
            "Labeled dataset written to {}",
            paths.labeled_dataset.display()
        );

        if let Err(err) = log_labeling_run(
            &paths.log_dir,
            raw.total_rows,
            raw.len(),
            clusters.inertia,
            clusters.n_iter,
            &sizes,
        ) {
            tracing::warn!("Failed to append labeling log: {}", err);
        }

        Ok(LabelingSummary {
            total_rows: raw.total_rows,
            labeled_rows: raw.len(),
            archetype_sizes,
            inertia: clusters.inertia,
            output: paths.labeled_dataset.clone(),
        })
    }
}
