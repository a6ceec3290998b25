use ndarray::{ArrayView1, ArrayView2};
use rand::{seq::index, Rng};
use serde::{Deserialize, Serialize};

use crate::error::{MlErr, Result};

/// Marks a node without children.
const LEAF: u32 = u32::MAX;

/// A tree node. Split nodes send a row left when
/// `row[feature] <= threshold`; every node keeps the mean target of the
/// samples that reached it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Node {
    feature: u32,
    left: u32,
    right: u32,
    threshold: f64,
    value: f64,
}

impl Node {
    fn leaf(value: f64) -> Self {
        Self {
            feature: LEAF,
            left: LEAF,
            right: LEAF,
            threshold: 0.0,
            value,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.feature == LEAF
    }
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn, without replacement, at every split.
    pub max_features: usize,
}

/// A CART regression tree stored as a flat node vector, root first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

/// A pending node: the sample range it owns and its depth.
struct Task {
    node: usize,
    start: usize,
    end: usize,
    depth: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grows a tree on the given samples, minimising the squared error.
    ///
    /// # Arguments
    /// * `x` - The feature matrix, one row per sample.
    /// * `y` - The targets.
    /// * `samples` - Row indices to train on, repeated rows allowed.
    /// * `params` - Growth limits.
    /// * `rng` - Drives the per-split feature sampling.
    pub fn fit<R: Rng>(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        mut samples: Vec<usize>,
        params: &TreeParams,
        mut rng: R,
    ) -> Self {
        let mut nodes = vec![Node::leaf(0.0)];
        let mut scratch = Vec::with_capacity(samples.len());
        let mut stack = vec![Task {
            node: 0,
            start: 0,
            end: samples.len(),
            depth: 0,
        }];

        while let Some(Task {
            node,
            start,
            end,
            depth,
        }) = stack.pop()
        {
            let owned = &mut samples[start..end];
            let n = owned.len();
            let (sum, sq_sum) = owned.iter().fold((0.0, 0.0), |(s, q), &i| {
                let v = y[i];
                (s + v, q + v * v)
            });

            let mean = if n == 0 { 0.0 } else { sum / n as f64 };
            nodes[node].value = mean;

            let variance = if n == 0 { 0.0 } else { sq_sum / n as f64 - mean * mean };
            let exhausted = n < params.min_samples_split
                || n < 2 * params.min_samples_leaf
                || params.max_depth.is_some_and(|max| depth >= max)
                || variance <= f64::EPSILON;

            if exhausted {
                continue;
            }

            let Some(split) = find_split(x, y, owned, sum, params, &mut rng, &mut scratch) else {
                continue;
            };

            let mid = partition(owned, |i| x[[i, split.feature]] <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::leaf(0.0));
            let right = nodes.len();
            nodes.push(Node::leaf(0.0));

            nodes[node] = Node {
                feature: split.feature as u32,
                left: left as u32,
                right: right as u32,
                threshold: split.threshold,
                value: mean,
            };

            stack.push(Task {
                node: right,
                start: start + mid,
                end,
                depth: depth + 1,
            });
            stack.push(Task {
                node: left,
                start,
                end: start + mid,
                depth: depth + 1,
            });
        }

        Self {
            nodes,
            n_features: x.ncols(),
        }
    }

    /// Walks the tree for a single row.
    ///
    /// `row` must hold at least `n_features` values.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.nodes[0];
        while !node.is_leaf() {
            let next = if row[node.feature as usize] <= node.threshold {
                node.left
            } else {
                node.right
            };
            node = &self.nodes[next as usize];
        }

        node.value
    }

    /// Checks that every split reads a column below `n_features` and points
    /// at children stored after it, so [`RegressionTree::predict_row`] can
    /// neither index out of bounds nor loop.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(MlErr::InvalidArtifact("tree has no nodes".into()));
        }

        let n_nodes = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }

            if node.feature as usize >= n_features {
                return Err(MlErr::InvalidArtifact(format!(
                    "node {idx} splits on feature {} of {n_features}",
                    node.feature
                )));
            }

            for child in [node.left, node.right] {
                let child = child as usize;
                if child <= idx || child >= n_nodes {
                    return Err(MlErr::InvalidArtifact(format!(
                        "node {idx} points at child {child} of {n_nodes}"
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Finds the threshold with the lowest weighted squared error among a random
/// subset of features. Maximising `sum_l^2 / n_l + sum_r^2 / n_r` is the same
/// as minimising the children's squared error.
fn find_split<R: Rng>(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    samples: &[usize],
    total: f64,
    params: &TreeParams,
    rng: &mut R,
    scratch: &mut Vec<(f64, f64)>,
) -> Option<Split> {
    let n = samples.len();
    let n_features = x.ncols();
    let min_leaf = params.min_samples_leaf.max(1);
    let parent_score = total * total / n as f64;

    let mut best: Option<Split> = None;
    let candidates = index::sample(rng, n_features, params.max_features.clamp(1, n_features));

    for feature in candidates.iter() {
        scratch.clear();
        scratch.extend(samples.iter().map(|&i| (x[[i, feature]], y[i])));
        scratch.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            let (value, target) = scratch[pos];
            let next = scratch[pos + 1].0;
            left_sum += target;

            if next <= value {
                continue;
            }

            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;

            if score > parent_score && best.as_ref().map_or(true, |b| score > b.score) {
                let mut threshold = value / 2.0 + next / 2.0;
                // midpoint of two adjacent floats can round up to `next`
                if threshold >= next {
                    threshold = value;
                }

                best = Some(Split {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

/// Moves every sample satisfying `goes_left` to the front, returning how many
/// there are.
fn partition(samples: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..samples.len() {
        if goes_left(samples[i]) {
            samples.swap(i, mid);
            mid += 1;
        }
    }

    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};
    use rand::{rngs::StdRng, SeedableRng};

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }

    fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &TreeParams) -> RegressionTree {
        let samples = (0..y.len()).collect();
        RegressionTree::fit(x.view(), y.view(), samples, params, StdRng::seed_from_u64(0))
    }

    #[test]
    fn learns_a_step_function_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, -1.0, -1.0, -1.0];
        let tree = fit(&x, &y, &params());

        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict_row(array![2.5].view()), 5.0);
        assert_eq!(tree.predict_row(array![6.4].view()), 5.0);
        assert_eq!(tree.predict_row(array![6.6].view()), -1.0);
        assert_eq!(tree.predict_row(array![100.0].view()), -1.0);
    }

    #[test]
    fn fully_grown_tree_memorises_distinct_rows() {
        let x = array![[0.0, 3.0], [1.0, 1.0], [2.0, 4.0], [3.0, 1.5], [4.0, 9.0]];
        let y = array![0.3, -2.0, 7.5, 1.25, 4.0];
        let tree = fit(&x, &y, &params());

        for (row, &target) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(tree.predict_row(row), target);
        }
        assert_eq!(tree.n_leaves(), 5);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![3.0, 3.0, 3.0];
        let tree = fit(&x, &y, &params());

        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(array![42.0].view()), 3.0);
    }

    #[test]
    fn max_depth_limits_growth() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(32, |i| (i * i) as f64);
        let shallow = TreeParams {
            max_depth: Some(1),
            ..params()
        };
        let tree = fit(&x, &y, &shallow);

        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = array![0.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let limited = TreeParams {
            min_samples_leaf: 4,
            ..params()
        };
        let tree = fit(&x, &y, &limited);

        // the only admissible cut points are 3.5..=5.5, so there are two leaves
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn repeated_samples_weigh_the_leaf_mean() {
        let x = array![[0.0], [0.0]];
        let y = array![1.0, 4.0];
        let tree = RegressionTree::fit(
            x.view(),
            y.view(),
            vec![0, 0, 1],
            &params(),
            StdRng::seed_from_u64(0),
        );

        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(array![0.0].view()), 2.0);
    }

    #[test]
    fn fitted_trees_are_valid() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * (j + 3)) % 17) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 7) as f64);
        let tree = fit(&x, &y, &params());

        assert!(tree.n_nodes() > 1);
        assert!(tree.validate(3).is_ok());
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn validate_catches_corrupt_nodes() {
        let x = array![[1.0], [2.0], [10.0], [11.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let tree = fit(&x, &y, &params());

        let mut bad_feature = tree.clone();
        bad_feature.nodes[0].feature = 99;
        assert!(matches!(bad_feature.validate(1), Err(MlErr::InvalidArtifact(_))));

        let mut dangling = tree.clone();
        dangling.nodes[0].right = 40;
        assert!(dangling.validate(1).is_err());

        let mut cycle = tree;
        cycle.nodes[0].left = 0;
        assert!(cycle.validate(1).is_err());
    }

    #[test]
    fn partition_moves_matches_to_the_front() {
        let mut samples = vec![5, 2, 8, 1, 9];
        let mid = partition(&mut samples, |i| i < 5);
        assert_eq!(mid, 2);
        assert!(samples[..mid].iter().all(|&i| i < 5));
        assert!(samples[mid..].iter().all(|&i| i >= 5));
    }
}
