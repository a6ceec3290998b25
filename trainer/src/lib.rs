//! The offline training job: load the housing data, fit a random forest,
//! evaluate it on a held-out split and persist it for the prediction service.

pub mod config;
pub mod error;
pub mod fetch;

use std::path::PathBuf;

use log::info;
use machine_learning::{metrics, Artifact, Dataset, Metadata, RandomForestRegressor, Result};

pub use config::TrainConfig;
pub use error::TrainError;

/// A fitted model together with its held-out scores.
#[derive(Debug)]
pub struct TrainOutcome {
    pub artifact: Artifact,
    pub rmse: f64,
    pub r2: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// What a completed [`run`] produced.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub rmse: f64,
    pub artifact_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Splits the dataset, fits the forest on the train rows and scores it on the
/// test rows.
pub fn fit_and_evaluate(config: &TrainConfig, dataset: &Dataset) -> Result<TrainOutcome> {
    let (train, test) = dataset.train_test_split(config.test_size, config.seed)?;
    info!(train = train.len(), test = test.len(); "split dataset");

    let model = RandomForestRegressor::fit(config.forest.clone(), train.features(), train.targets())?;

    let predictions = model.predict(test.features())?;
    let rmse = metrics::rmse(test.targets(), predictions.view())?;
    let r2 = metrics::r2(test.targets(), predictions.view())?;

    let artifact = Artifact::new(
        model,
        dataset.feature_names().to_vec(),
        dataset.target_name(),
    )?;

    Ok(TrainOutcome {
        artifact,
        rmse,
        r2,
        n_train: train.len(),
        n_test: test.len(),
    })
}

/// Runs the whole job: fetch the data if needed, load, fit, evaluate, then
/// write the artifact and the metadata sidecar into `config.model_dir`.
pub fn run(config: &TrainConfig) -> std::result::Result<TrainReport, TrainError> {
    fetch::ensure_dataset(&config.data_path, config.data_url.as_deref())?;

    let dataset = Dataset::load_csv(&config.data_path)?;
    info!(
        rows = dataset.len(),
        features = dataset.n_features();
        "loaded {}", config.data_path.display()
    );

    let outcome = fit_and_evaluate(config, &dataset)?;
    info!(r2 = outcome.r2; "Test RMSE: {:.4}", outcome.rmse);

    let artifact_path = config.artifact_path();
    outcome.artifact.save(&artifact_path)?;

    let metadata_path = config.metadata_path();
    let metadata = Metadata {
        feature_names: outcome.artifact.feature_names.clone(),
        target_name: outcome.artifact.target_name.clone(),
        rmse: outcome.rmse,
    };
    metadata.save(&metadata_path)?;

    info!("Saved model to {}", artifact_path.display());

    Ok(TrainReport {
        rmse: outcome.rmse,
        artifact_path,
        metadata_path,
    })
}
