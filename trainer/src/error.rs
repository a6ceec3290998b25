use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use machine_learning::MlErr;

/// Failures of a training run.
#[derive(Debug)]
pub enum TrainError {
    /// The dataset could not be downloaded.
    Fetch { url: String, msg: String },
    Io { path: PathBuf, source: io::Error },
    Ml(MlErr),
}

impl TrainError {
    pub fn fetch(url: &str, msg: impl Display) -> Self {
        Self::Fetch {
            url: url.to_string(),
            msg: msg.to_string(),
        }
    }
}

impl Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { url, msg } => write!(f, "cannot download dataset from {url}: {msg}"),
            Self::Io { path, source } => write!(f, "io error at {}: {source}", path.display()),
            Self::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for TrainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Ml(e) => Some(e),
            Self::Fetch { .. } => None,
        }
    }
}

impl From<MlErr> for TrainError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}
