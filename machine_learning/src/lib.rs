pub mod artifact;
pub mod dataset;
pub mod error;
pub mod forest;
pub mod metrics;

pub use artifact::{Artifact, Metadata};
pub use dataset::{Dataset, FEATURE_NAMES, TARGET_NAME};
pub use error::{MlErr, Result};
pub use forest::{ForestParams, MaxFeatures, RandomForestRegressor};
