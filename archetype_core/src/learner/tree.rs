//! CART decision tree with Gini impurity
//!
//! Trees are grown on a (possibly repeated) set of row indices so that a
//! bootstrap sample needs no copy of the feature matrix. At each node a
//! random subset of features is searched for the threshold that minimises
//! the weighted Gini impurity of the two children.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    pub n_classes: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features examined per split
    pub max_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Class proportions of the training rows that reached this leaf
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Unnormalised impurity decrease per feature
    impurity_decrease: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity, `n_left * gini_left + n_right * gini_right`
    child_impurity: f64,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

struct Builder<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [usize],
    params: TreeParams,
    nodes: Vec<Node>,
    impurity_decrease: Vec<f64>,
    features: Vec<usize>,
}

impl<'a> Builder<'a> {
    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.params.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let distribution = counts
            .iter()
            .map(|&c| c as f64 / total.max(1) as f64)
            .collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn best_split(&mut self, indices: &[usize], rng: &mut StdRng) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let n_classes = self.params.n_classes;

        let mut features = std::mem::take(&mut self.features);
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let mut column: Vec<(f64, usize)> = Vec::with_capacity(n);

        for &feature in &features {
            if visited >= self.params.max_features {
                break;
            }

            column.clear();
            column.extend(indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            if column[0].0 >= column[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left = vec![0usize; n_classes];
            let mut right = vec![0usize; n_classes];
            for &(_, label) in &column {
                right[label] += 1;
            }

            for pos in 0..n - 1 {
                let label = column[pos].1;
                left[label] += 1;
                right[label] -= 1;

                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf {
                    continue;
                }
                if n_right < min_leaf {
                    break;
                }
                let (value, next) = (column[pos].0, column[pos + 1].0);
                if value >= next {
                    continue;
                }

                let impurity =
                    n_left as f64 * gini(&left, n_left) + n_right as f64 * gini(&right, n_right);
                let improves = best
                    .as_ref()
                    .map_or(true, |b| impurity < b.child_impurity);
                if improves {
                    let mid = value + (next - value) / 2.0;
                    let threshold = if mid >= next { value } else { mid };
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        child_impurity: impurity,
                    });
                }
            }
        }

        self.features = features;
        best
    }

    fn grow(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let n = indices.len();
        let counts = self.class_counts(&indices);
        let impurity = gini(&counts, n);

        if depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || impurity <= 0.0
        {
            return self.leaf(&counts, n);
        }

        let Some(split) = self.best_split(&indices, rng) else {
            return self.leaf(&counts, n);
        };

        self.impurity_decrease[split.feature] += n as f64 * impurity - split.child_impurity;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);
        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `indices` (duplicates allowed).
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[usize],
        indices: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.ncols();
        let mut builder = Builder {
            x: x.reborrow(),
            y,
            params,
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; n_features],
            features: (0..n_features).collect(),
        };
        builder.grow(indices, 0, rng);

        DecisionTree {
            nodes: builder.nodes,
            impurity_decrease: builder.impurity_decrease,
        }
    }

    /// Class distribution of the leaf reached by `row`
    pub fn predict_proba(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Impurity decrease per feature, normalised to sum to one (all zero for
    /// a single-leaf tree)
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total > 0.0 {
            self.impurity_decrease.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.impurity_decrease.len()]
        }
    }
}
