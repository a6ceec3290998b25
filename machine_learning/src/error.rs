use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    MissingColumn(String),
    Csv {
        line: usize,
        msg: String,
    },
    EmptyDataset,
    InvalidSplit(String),
    InvalidParams(String),
    Encode(String),
    Decode(String),
    InvalidArtifact(String),
}

impl MlErr {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::Io { path, source } => write!(f, "io error on '{}': {source}", path.display()),
            MlErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MlErr::MissingColumn(name) => write!(f, "missing column '{name}'"),
            MlErr::Csv { line, msg } => write!(f, "line {line}: {msg}"),
            MlErr::EmptyDataset => write!(f, "the dataset has no usable rows"),
            MlErr::InvalidSplit(msg) => write!(f, "invalid split: {msg}"),
            MlErr::InvalidParams(msg) => write!(f, "invalid parameters: {msg}"),
            MlErr::Encode(msg) => write!(f, "failed to encode: {msg}"),
            MlErr::Decode(msg) => write!(f, "failed to decode: {msg}"),
            MlErr::InvalidArtifact(msg) => write!(f, "invalid artifact: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
