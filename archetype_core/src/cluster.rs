//! K-means clustering used to invent the archetype taxonomy.
//!
//! Each restart seeds its centroids with k-means++ and runs Lloyd
//! iterations until the total squared centroid shift drops below
//! `tol * mean column variance`. Restarts run on the rayon pool, each with a
//! seed drawn up front from the master RNG, so the winning run does not
//! depend on scheduling.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::LabelerConfig;
use crate::error::{EngineError, EngineResult};

/// Parameters for one k-means fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

impl KMeansConfig {
    pub fn from_labeler(n_clusters: usize, labeler: &LabelerConfig) -> Self {
        Self {
            n_clusters,
            n_init: labeler.n_init,
            max_iter: labeler.max_iter,
            tol: labeler.tol,
            seed: labeler.seed,
        }
    }
}

/// Outcome of the best restart
#[derive(Debug, Clone)]
pub struct KMeans {
    pub centroids: Array2<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances of rows to their centroid
    pub inertia: f64,
    pub n_iter: usize,
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(row: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, centroid) in centroids.outer_iter().enumerate() {
        let d = squared_distance(row, centroid);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

fn assign(data: ArrayView2<'_, f64>, centroids: &Array2<f64>) -> Vec<(usize, f64)> {
    data.axis_iter(Axis(0))
        .into_par_iter()
        .map(|row| nearest(row, centroids))
        .collect()
}

/// k-means++ seeding
fn init_centroids(data: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut closest: Vec<f64> = data
        .outer_iter()
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            closest
                .iter()
                .position(|d| {
                    acc += d;
                    acc > target
                })
                .unwrap_or(n - 1)
        } else {
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(chosen));

        for (row, best) in data.outer_iter().zip(closest.iter_mut()) {
            let d = squared_distance(row, centroids.row(c));
            if d < *best {
                *best = d;
            }
        }
    }

    centroids
}

fn single_run(data: ArrayView2<'_, f64>, config: &KMeansConfig, tol: f64, seed: u64) -> KMeans {
    let k = config.n_clusters;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = init_centroids(data, k, &mut rng);
    let mut n_iter = 0;

    for _ in 0..config.max_iter {
        n_iter += 1;
        let assignment = assign(data, &centroids);

        let mut sums = Array2::<f64>::zeros(centroids.dim());
        let mut counts = vec![0usize; k];
        for (row, &(label, _)) in data.outer_iter().zip(&assignment) {
            let mut target = sums.row_mut(label);
            target += &row;
            counts[label] += 1;
        }

        let mut updated = centroids.clone();
        let mut taken: Vec<usize> = Vec::new();
        for c in 0..k {
            if counts[c] > 0 {
                let mean = &sums.row(c) / counts[c] as f64;
                updated.row_mut(c).assign(&mean);
            } else {
                // Re-seed an empty cluster with the worst-fitting row.
                let far = assignment
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !taken.contains(idx))
                    .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
                    .map(|(idx, _)| idx)
                    .unwrap_or(0);
                taken.push(far);
                updated.row_mut(c).assign(&data.row(far));
            }
        }

        let shift: f64 = updated
            .outer_iter()
            .zip(centroids.outer_iter())
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;
        if shift <= tol {
            break;
        }
    }

    let assignment = assign(data, &centroids);
    let inertia = assignment.iter().map(|(_, d)| d).sum();
    let labels = assignment.into_iter().map(|(label, _)| label).collect();

    KMeans {
        centroids,
        labels,
        inertia,
        n_iter,
    }
}

impl KMeans {
    /// Fit `config.n_init` restarts and keep the one with the lowest inertia
    /// (earliest restart on ties).
    pub fn fit(data: ArrayView2<'_, f64>, config: &KMeansConfig) -> EngineResult<Self> {
        if config.n_clusters == 0 || config.n_init == 0 {
            return Err(EngineError::invalid_input(
                "kmeans",
                "n_clusters and n_init must be non-zero",
            ));
        }
        if data.nrows() < config.n_clusters {
            return Err(EngineError::invalid_input(
                "features",
                format!(
                    "{} rows cannot form {} clusters",
                    data.nrows(),
                    config.n_clusters
                ),
            ));
        }

        let mean_variance = data
            .var_axis(Axis(0), 0.0)
            .mean()
            .unwrap_or(0.0);
        let tol = config.tol * mean_variance;

        let mut master = StdRng::seed_from_u64(config.seed);
        let seeds: Vec<u64> = (0..config.n_init).map(|_| master.gen()).collect();

        let runs: Vec<KMeans> = seeds
            .par_iter()
            .map(|&seed| single_run(data, config, tol, seed))
            .collect();

        let mut best: Option<KMeans> = None;
        for run in runs {
            let better = match &best {
                Some(current) => run.inertia < current.inertia,
                None => true,
            };
            if better {
                best = Some(run);
            }
        }
        best.ok_or_else(|| EngineError::invalid_input("kmeans", "no restart completed"))
    }

    /// Index of the nearest centroid for each row
    pub fn predict(&self, data: ArrayView2<'_, f64>) -> Vec<usize> {
        assign(data, &self.centroids)
            .into_iter()
            .map(|(label, _)| label)
            .collect()
    }

    /// Number of rows assigned to each cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.nrows()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(seed: u64) -> (Array2<f64>, Vec<usize>) {
        let centers = [[0.0, 0.0], [10.0, 10.0], [-10.0, 10.0]];
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::new();
        let mut truth = Vec::new();
        for (label, center) in centers.iter().enumerate() {
            for _ in 0..40 {
                rows.push(center[0] + rng.gen::<f64>() - 0.5);
                rows.push(center[1] + rng.gen::<f64>() - 0.5);
                truth.push(label);
            }
        }
        (Array2::from_shape_vec((120, 2), rows).unwrap(), truth)
    }

    fn config(k: usize) -> KMeansConfig {
        KMeansConfig {
            n_clusters: k,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }

    #[test]
    fn test_recovers_separated_blobs() {
        let (data, truth) = blobs(3);
        let model = KMeans::fit(data.view(), &config(3)).unwrap();

        assert_eq!(model.cluster_sizes(), vec![40, 40, 40]);
        // Same partition up to relabeling.
        for i in 0..truth.len() {
            for j in 0..truth.len() {
                assert_eq!(truth[i] == truth[j], model.labels[i] == model.labels[j]);
            }
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (data, _) = blobs(9);
        let a = KMeans::fit(data.view(), &config(3)).unwrap();
        let b = KMeans::fit(data.view(), &config(3)).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_predict_matches_fit_labels() {
        let (data, _) = blobs(5);
        let model = KMeans::fit(data.view(), &config(3)).unwrap();
        assert_eq!(model.predict(data.view()), model.labels);
    }

    #[test]
    fn test_duplicate_rows_still_fill_every_cluster() {
        let data = Array2::from_shape_fn((12, 2), |(r, _)| if r < 10 { 1.0 } else { 5.0 });
        let model = KMeans::fit(data.view(), &config(3)).unwrap();
        assert_eq!(model.labels.len(), 12);
        assert!(model.inertia.is_finite());
    }

    #[test]
    fn test_too_few_rows() {
        let data = Array2::<f64>::zeros((2, 4));
        let err = KMeans::fit(data.view(), &config(5)).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
