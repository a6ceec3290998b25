use std::{env, path::PathBuf};

use machine_learning::ForestParams;

pub const DEFAULT_DATA_PATH: &str = "data/california_housing.csv";
/// The 1990 census block-group file, in the raw census layout.
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/ageron/handson-ml2/master/datasets/housing/housing.csv";
pub const DEFAULT_MODEL_DIR: &str = "model";

pub const ARTIFACT_FILE: &str = "model.joblib";
pub const METADATA_FILE: &str = "metadata.json";

/// Seed shared by the split and the forest.
pub const RANDOM_STATE: u64 = 42;
pub const TEST_SIZE: f64 = 0.2;
pub const N_ESTIMATORS: usize = 200;

/// Inputs, outputs and hyperparameters of a training run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// The dataset CSV.
    pub data_path: PathBuf,
    /// Where to download the dataset from when `data_path` is missing.
    pub data_url: Option<String>,
    /// Where the artifact and its metadata get written.
    pub model_dir: PathBuf,
    /// Share of the rows held out for evaluation.
    pub test_size: f64,
    /// Seeds the train/test shuffle.
    pub seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            data_url: Some(DEFAULT_DATA_URL.to_string()),
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            test_size: TEST_SIZE,
            seed: RANDOM_STATE,
            forest: ForestParams {
                n_estimators: N_ESTIMATORS,
                seed: RANDOM_STATE,
                ..ForestParams::default()
            },
        }
    }
}

impl TrainConfig {
    /// Reads `DATA_PATH`, `DATA_URL` and `MODEL_DIR`; hyperparameters stay
    /// fixed. An empty `DATA_URL` turns the download off.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`TrainConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("DATA_PATH").filter(|v| !v.is_empty()) {
            config.data_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("DATA_URL") {
            config.data_url = Some(url).filter(|v| !v.is_empty());
        }

        if let Some(dir) = lookup("MODEL_DIR").filter(|v| !v.is_empty()) {
            config.model_dir = PathBuf::from(dir);
        }

        config
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.model_dir.join(ARTIFACT_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.model_dir.join(METADATA_FILE)
    }
}
