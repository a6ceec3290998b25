mod forest;
mod tree;

pub use forest::{ForestParams, MaxFeatures, RandomForestRegressor};
pub use tree::{RegressionTree, TreeParams};
