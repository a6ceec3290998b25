use log::info;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::error::{MlErr, Result};

/// How many features each split may look at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Fraction(f64),
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let amount = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
        };

        amount.clamp(1, n_features)
    }
}

/// Hyperparameters of a [`RandomForestRegressor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Trains every tree on a sample drawn with replacement.
    pub bootstrap: bool,
    /// Tree `i` is grown from an RNG seeded with `seed + i`.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            seed: 0,
        }
    }
}

impl ForestParams {
    /// Checks the parameters for values no tree could be grown with.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(MlErr::InvalidParams("n_estimators must be at least 1".into()));
        }

        if self.min_samples_split < 2 {
            return Err(MlErr::InvalidParams(
                "min_samples_split must be at least 2".into(),
            ));
        }

        if self.min_samples_leaf == 0 {
            return Err(MlErr::InvalidParams(
                "min_samples_leaf must be at least 1".into(),
            ));
        }

        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(MlErr::InvalidParams(
                format!("max_features fraction must be in (0, 1], got {f}"),
            )),
            MaxFeatures::Fixed(0) => Err(MlErr::InvalidParams(
                "max_features must be at least 1".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A bagged ensemble of regression trees; predictions are the mean of the
/// trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestRegressor {
    /// Fits a forest, growing the trees in parallel.
    ///
    /// The outcome only depends on the data and `params.seed`, not on how the
    /// trees get scheduled.
    ///
    /// # Arguments
    /// * `params` - The forest hyperparameters.
    /// * `x` - The feature matrix, one row per sample.
    /// * `y` - The targets.
    pub fn fit(params: ForestParams, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self> {
        params.validate()?;

        let (n_samples, n_features) = x.dim();
        if n_samples != y.len() {
            return Err(MlErr::SizeMismatch {
                a: "targets",
                b: "feature rows",
                got: y.len(),
                expected: n_samples,
            });
        }

        if n_samples == 0 || n_features == 0 {
            return Err(MlErr::EmptyDataset);
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(n_features),
        };

        info!(
            trees = params.n_estimators,
            rows = n_samples,
            features = n_features;
            "fitting random forest"
        );

        let trees: Vec<RegressionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|idx| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(idx as u64));
                let samples = if params.bootstrap {
                    (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                RegressionTree::fit(x, y, samples, &tree_params, rng)
            })
            .collect();

        Ok(Self {
            params,
            trees,
            n_features,
        })
    }

    /// Predicts every row of `x`.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(MlErr::SizeMismatch {
                a: "input columns",
                b: "model features",
                got: x.ncols(),
                expected: self.n_features,
            });
        }

        let mut predictions = Vec::with_capacity(x.nrows());
        x.axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.mean_prediction(row))
            .collect_into_vec(&mut predictions);

        Ok(Array1::from_vec(predictions))
    }

    /// Predicts a single row.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(MlErr::SizeMismatch {
                a: "row length",
                b: "model features",
                got: row.len(),
                expected: self.n_features,
            });
        }

        Ok(self.mean_prediction(row))
    }

    fn mean_prediction(&self, row: ArrayView1<f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
