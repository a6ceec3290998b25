use std::{
    fmt::Write as _,
    fs,
    io::{Read, Write as _},
    net::TcpListener,
    path::Path,
    thread,
};

use machine_learning::{Artifact, ForestParams, Metadata, MlErr, FEATURE_NAMES, TARGET_NAME};
use trainer::{TrainConfig, TrainError, TrainReport};

/// A deterministic stand-in for the housing data, in the feature layout.
fn write_dataset(path: &Path, rows: usize) {
    fs::write(path, dataset_csv(rows)).unwrap();
}

fn dataset_csv(rows: usize) -> String {
    let mut csv = format!("{},{}\n", FEATURE_NAMES.join(","), TARGET_NAME);

    for i in 0..rows {
        let income = 1.0 + (i % 13) as f64 * 0.7;
        let age = ((i * 7) % 52) as f64;
        let rooms = 3.0 + (i % 5) as f64;
        let bedrooms = 1.0 + (i % 3) as f64 * 0.1;
        let population = 100.0 + (i * 3) as f64;
        let occupancy = 2.0 + (i % 4) as f64 * 0.5;
        let latitude = 32.0 + (i % 9) as f64;
        let longitude = -124.0 + (i % 11) as f64;
        let value = 0.4 * income + 0.01 * age + 0.05 * (latitude - 32.0);

        writeln!(
            csv,
            "{income},{age},{rooms},{bedrooms},{population},{occupancy},{latitude},{longitude},{value}"
        )
        .unwrap();
    }

    csv
}

/// Answers a single HTTP request with `status` and `body`, returning the URL.
fn serve_once(status: &'static str, body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
    });

    format!("http://{addr}/housing.csv")
}

fn config(data_path: &Path, model_dir: &Path) -> TrainConfig {
    TrainConfig {
        data_path: data_path.to_path_buf(),
        data_url: None,
        model_dir: model_dir.to_path_buf(),
        forest: ForestParams {
            n_estimators: 12,
            seed: 42,
            ..ForestParams::default()
        },
        ..TrainConfig::default()
    }
}

fn train_once(dir: &Path, out: &str) -> TrainReport {
    let data = dir.join("housing.csv");
    if !data.exists() {
        write_dataset(&data, 240);
    }

    trainer::run(&config(&data, &dir.join(out))).unwrap()
}

#[test]
fn writes_artifact_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let report = train_once(dir.path(), "model");

    assert_eq!(report.artifact_path, dir.path().join("model").join("model.joblib"));
    assert!(report.rmse.is_finite());

    let artifact = Artifact::load(&report.artifact_path).unwrap();
    assert_eq!(artifact.feature_names, FEATURE_NAMES);
    assert_eq!(artifact.target_name, TARGET_NAME);
    assert_eq!(artifact.model.n_trees(), 12);

    let metadata = Metadata::load(&report.metadata_path).unwrap();
    assert_eq!(metadata.feature_names, FEATURE_NAMES);
    assert_eq!(metadata.target_name, TARGET_NAME);
    assert_eq!(metadata.rmse, report.rmse);
}

#[test]
fn same_seed_reports_the_same_rmse() {
    let dir = tempfile::tempdir().unwrap();
    let first = train_once(dir.path(), "first");
    let second = train_once(dir.path(), "second");

    assert_eq!(first.rmse, second.rmse);
    assert_eq!(
        Artifact::load(&first.artifact_path).unwrap(),
        Artifact::load(&second.artifact_path).unwrap()
    );
}

#[test]
fn the_forest_beats_a_constant_guess() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("housing.csv");
    write_dataset(&data, 240);

    let dataset = machine_learning::Dataset::load_csv(&data).unwrap();
    let outcome = trainer::fit_and_evaluate(&config(&data, dir.path()), &dataset).unwrap();

    assert_eq!(outcome.n_test, 48);
    assert_eq!(outcome.n_train, 192);
    assert!(outcome.r2 > 0.5, "r2 = {}", outcome.r2);
}

#[test]
fn missing_dataset_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = trainer::run(&config(&dir.path().join("absent.csv"), dir.path()));

    assert!(matches!(result, Err(TrainError::Ml(MlErr::Io { .. }))));
    assert!(!dir.path().join("model.joblib").exists());
}

#[test]
fn missing_dataset_is_downloaded_first() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data").join("housing.csv");
    let mut config = config(&data, &dir.path().join("model"));
    config.data_url = Some(serve_once("200 OK", dataset_csv(240)));

    let report = trainer::run(&config).unwrap();

    assert_eq!(fs::read_to_string(&data).unwrap(), dataset_csv(240));
    assert!(report.artifact_path.exists());
}

#[test]
fn present_dataset_is_not_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("housing.csv");
    write_dataset(&data, 240);

    let mut config = config(&data, &dir.path().join("model"));
    // the server would hand out an unusable file if it were asked
    config.data_url = Some(serve_once("200 OK", "not,a,dataset\n".to_string()));

    trainer::run(&config).unwrap();
    assert_eq!(fs::read_to_string(&data).unwrap(), dataset_csv(240));
}

#[test]
fn failed_download_is_a_fetch_error() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("housing.csv");
    let mut config = config(&data, &dir.path().join("model"));
    config.data_url = Some(serve_once("404 Not Found", String::new()));

    let result = trainer::run(&config);

    assert!(matches!(result, Err(TrainError::Fetch { .. })));
    assert!(!data.exists());
}
