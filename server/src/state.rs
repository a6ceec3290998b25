use std::path::{Path, PathBuf};

use log::info;
use machine_learning::{Artifact, MlErr};

use crate::{
    config::ServerConfig,
    error::StartupError,
    schema::{InputFeatures, RowLayout},
};

/// The read-only context handed to every request: the loaded artifact and
/// the column layout derived from it. Built once at startup, shared via `Arc`.
#[derive(Debug)]
pub struct AppState {
    model_path: PathBuf,
    artifact: Artifact,
    layout: RowLayout,
}

impl AppState {
    /// Loads the artifact named by the config, refusing to start on a missing
    /// or malformed file.
    pub fn load(config: &ServerConfig) -> Result<Self, StartupError> {
        let path = &config.model_path;
        if !path.exists() {
            return Err(StartupError::ArtifactNotFound(path.clone()));
        }

        let artifact = Artifact::load(path).map_err(|source| StartupError::Artifact {
            path: path.clone(),
            source,
        })?;

        let state = Self::from_artifact(artifact, path.clone())?;
        info!(
            trees = state.artifact.model.n_trees();
            "model loaded. Features: {:?}", state.artifact.feature_names
        );

        Ok(state)
    }

    /// Builds the state from an already decoded artifact.
    pub fn from_artifact(artifact: Artifact, model_path: PathBuf) -> Result<Self, StartupError> {
        artifact
            .validate()
            .map_err(|source| StartupError::Artifact {
                path: model_path.clone(),
                source,
            })?;

        let layout = RowLayout::new(&artifact.feature_names)?;

        Ok(Self {
            model_path,
            artifact,
            layout,
        })
    }

    /// Runs the model on the rows, one prediction per row, in order.
    pub fn predict(&self, rows: &[InputFeatures]) -> Result<Vec<f64>, MlErr> {
        let x = self.layout.to_matrix(rows);
        let predictions = self.artifact.model.predict(x.view())?;
        Ok(predictions.to_vec())
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    pub fn target_name(&self) -> &str {
        &self.artifact.target_name
    }
}
