use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MlErr, Result},
    forest::RandomForestRegressor,
};

const MAGIC: &[u8; 4] = b"CHRF";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4;

/// A fitted model bundled with the schema it was trained on.
///
/// `feature_names[i]` is the feature the model reads from column `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub model: RandomForestRegressor,
    pub feature_names: Vec<String>,
    pub target_name: String,
}

impl Artifact {
    /// Bundles a model with its schema, see [`Artifact::validate`].
    pub fn new(
        model: RandomForestRegressor,
        feature_names: Vec<String>,
        target_name: impl Into<String>,
    ) -> Result<Self> {
        let artifact = Self {
            model,
            feature_names,
            target_name: target_name.into(),
        };

        artifact.validate()?;
        Ok(artifact)
    }

    /// Checks that the schema is present and agrees with the model, and that
    /// every tree is safe to walk.
    pub fn validate(&self) -> Result<()> {
        if self.feature_names.is_empty() {
            return Err(MlErr::InvalidArtifact("missing feature names".into()));
        }

        if self.target_name.is_empty() {
            return Err(MlErr::InvalidArtifact("missing target name".into()));
        }

        if self.model.n_trees() == 0 {
            return Err(MlErr::InvalidArtifact("the model has no trees".into()));
        }

        if self.feature_names.len() != self.model.n_features() {
            return Err(MlErr::SizeMismatch {
                a: "feature names",
                b: "model features",
                got: self.feature_names.len(),
                expected: self.model.n_features(),
            });
        }

        for (idx, tree) in self.model.trees().iter().enumerate() {
            tree.validate(self.model.n_features()).map_err(|e| match e {
                MlErr::InvalidArtifact(msg) => MlErr::InvalidArtifact(format!("tree {idx}: {msg}")),
                other => other,
            })?;
        }

        Ok(())
    }

    /// Encodes the artifact: magic, little endian format version, bincode body.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| MlErr::Encode(e.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decodes and validates an artifact.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(MlErr::InvalidArtifact("not a model artifact".into()));
        }

        let mut version = [0; 4];
        version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(MlErr::InvalidArtifact(format!(
                "unsupported format version {version}, expected {FORMAT_VERSION}"
            )));
        }

        let artifact: Artifact =
            bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| MlErr::Decode(e.to_string()))?;

        artifact.validate()?;
        Ok(artifact)
    }

    /// Writes the artifact, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        create_parent(path)?;
        fs::write(path, &bytes).map_err(|e| MlErr::io(path, e))?;

        info!(bytes = bytes.len(); "saved artifact to {}", path.display());
        Ok(())
    }

    /// Reads and validates an artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| MlErr::io(path, e))?;
        Self::from_bytes(&bytes)
    }
}

/// The JSON sidecar describing a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub rmse: f64,
}

impl Metadata {
    /// Writes the metadata as indented JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        create_parent(path)?;

        let file = File::create(path).map_err(|e| MlErr::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| MlErr::Encode(e.to_string()))?;
        writer.flush().map_err(|e| MlErr::io(path, e))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| MlErr::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| MlErr::Decode(e.to_string()))
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| MlErr::io(dir, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestParams;
    use ndarray::{array, Array2};

    fn tiny_model() -> RandomForestRegressor {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| (i + j) as f64);
        let y = x.column(0).mapv(|v| v * 0.5);
        let params = ForestParams {
            n_estimators: 3,
            ..ForestParams::default()
        };
        RandomForestRegressor::fit(params, x.view(), y.view()).unwrap()
    }

    fn tiny_artifact() -> Artifact {
        Artifact::new(tiny_model(), vec!["a".into(), "b".into()], "y").unwrap()
    }

    #[test]
    fn survives_a_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");
        let artifact = tiny_artifact();

        artifact.save(&path).unwrap();
        let loaded = Artifact::load(&path).unwrap();

        assert_eq!(loaded, artifact);
        let row = array![[3.0, 4.0]];
        assert_eq!(
            loaded.model.predict(row.view()).unwrap(),
            artifact.model.predict(row.view()).unwrap()
        );
    }

    #[test]
    fn rejects_foreign_files() {
        assert!(matches!(
            Artifact::from_bytes(b"{\"model\": 1}"),
            Err(MlErr::InvalidArtifact(_))
        ));
        assert!(Artifact::from_bytes(b"").is_err());
    }

    #[test]
    fn rejects_truncated_bodies() {
        let bytes = tiny_artifact().to_bytes().unwrap();
        assert!(matches!(
            Artifact::from_bytes(&bytes[..bytes.len() / 2]),
            Err(MlErr::Decode(_))
        ));
    }

    #[test]
    fn rejects_unknown_versions() {
        let mut bytes = tiny_artifact().to_bytes().unwrap();
        bytes[MAGIC.len()] = 99;
        assert!(matches!(
            Artifact::from_bytes(&bytes),
            Err(MlErr::InvalidArtifact(_))
        ));
    }

    #[test]
    fn schema_must_match_the_model() {
        assert!(Artifact::new(tiny_model(), vec!["a".into()], "y").is_err());
        assert!(Artifact::new(tiny_model(), vec![], "y").is_err());
        assert!(Artifact::new(tiny_model(), vec!["a".into(), "b".into()], "").is_err());
    }

    #[test]
    fn rejects_trees_reading_unknown_columns() {
        let mut raw = serde_json::to_value(tiny_artifact()).unwrap();
        raw["model"]["trees"][0]["nodes"][0]["feature"] = serde_json::json!(99);
        let corrupt: Artifact = serde_json::from_value(raw).unwrap();

        assert!(matches!(corrupt.validate(), Err(MlErr::InvalidArtifact(_))));

        let bytes = corrupt.to_bytes().unwrap();
        assert!(matches!(
            Artifact::from_bytes(&bytes),
            Err(MlErr::InvalidArtifact(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Artifact::load(dir.path().join("absent.bin")),
            Err(MlErr::Io { .. })
        ));
    }

    #[test]
    fn metadata_is_indented_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let metadata = Metadata {
            feature_names: vec!["a".into(), "b".into()],
            target_name: "y".into(),
            rmse: 0.5,
        };

        metadata.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"target_name\": \"y\""));
        assert_eq!(Metadata::load(&path).unwrap(), metadata);
    }
}
