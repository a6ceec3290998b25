//! Downloads the housing CSV the first time the job runs.

use std::{fs, path::Path, time::Duration};

use log::{debug, info};
use reqwest::{blocking::Client, header::USER_AGENT};

use crate::error::TrainError;

const TIMEOUT_SECS: u64 = 120;

/// Makes sure `path` holds the dataset, downloading it from `url` when the
/// file is missing. Returns whether a download happened.
///
/// With no `url` nothing is fetched and a missing file is left for the loader
/// to report.
pub fn ensure_dataset(path: &Path, url: Option<&str>) -> Result<bool, TrainError> {
    if path.exists() {
        debug!("dataset already present at {}", path.display());
        return Ok(false);
    }

    let Some(url) = url else {
        return Ok(false);
    };

    info!(url = url; "downloading dataset to {}", path.display());

    let client = Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECS))
        .build()
        .map_err(|e| TrainError::fetch(url, e))?;

    let response = client
        .get(url)
        .header(USER_AGENT, concat!("housing-trainer/", env!("CARGO_PKG_VERSION")))
        .send()
        .map_err(|e| TrainError::fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TrainError::fetch(url, format!("HTTP status {status}")));
    }

    let bytes = response.bytes().map_err(|e| TrainError::fetch(url, e))?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| TrainError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    // a partial download must never be mistaken for the dataset
    let partial = path.with_extension("part");
    fs::write(&partial, &bytes).map_err(|source| TrainError::Io {
        path: partial.clone(),
        source,
    })?;
    fs::rename(&partial, path).map_err(|source| TrainError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(bytes = bytes.len(); "saved dataset to {}", path.display());
    Ok(true)
}
