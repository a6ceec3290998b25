use std::{fs::File, io, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{MlErr, Result};

/// The California Housing feature columns, in training order.
pub const FEATURE_NAMES: [&str; 8] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// The regression target column.
pub const TARGET_NAME: &str = "MedHouseVal";

/// Raw census block-group columns the features are derived from.
const CENSUS_COLUMNS: [&str; 9] = [
    "longitude",
    "latitude",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_income",
    "median_house_value",
];

/// `median_house_value` is in dollars, `MedHouseVal` in units of 100k.
const CENSUS_TARGET_SCALE: f64 = 100_000.0;

/// An in-memory regression dataset: one row of features per target.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    targets: Array1<f64>,
    feature_names: Vec<String>,
    target_name: String,
}

impl Dataset {
    /// Creates a new dataset, checking that the shapes agree.
    ///
    /// # Arguments
    /// * `features` - One row per sample, one column per feature.
    /// * `targets` - One value per sample.
    /// * `feature_names` - The name of every feature column, in column order.
    /// * `target_name` - The name of the target.
    pub fn new(
        features: Array2<f64>,
        targets: Array1<f64>,
        feature_names: Vec<String>,
        target_name: impl Into<String>,
    ) -> Result<Self> {
        if features.nrows() != targets.len() {
            return Err(MlErr::SizeMismatch {
                a: "targets",
                b: "feature rows",
                got: targets.len(),
                expected: features.nrows(),
            });
        }

        if features.ncols() != feature_names.len() {
            return Err(MlErr::SizeMismatch {
                a: "feature names",
                b: "feature columns",
                got: feature_names.len(),
                expected: features.ncols(),
            });
        }

        Ok(Self {
            features,
            targets,
            feature_names,
            target_name: target_name.into(),
        })
    }

    /// Reads a headered CSV file, see [`Dataset::from_reader`].
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MlErr::io(path, e))?;
        let dataset = Self::from_reader(file)?;

        debug!(rows = dataset.len(); "loaded dataset from {}", path.display());
        Ok(dataset)
    }

    /// Parses an in-memory CSV document, see [`Dataset::from_reader`].
    pub fn from_csv_str(content: &str) -> Result<Self> {
        Self::from_reader(content.as_bytes())
    }

    /// Parses a headered CSV stream.
    ///
    /// Two layouts are understood: the feature layout (columns named after
    /// [`FEATURE_NAMES`] plus [`TARGET_NAME`]) and the raw census layout, from
    /// which the per-household averages are derived. Rows with empty fields are
    /// skipped.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let header = rdr.headers().map_err(csv_error)?.clone();
        if header.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let layout = Layout::detect(&header)?;

        let mut data = Vec::new();
        let mut targets = Vec::new();
        let mut skipped = 0usize;

        for record in rdr.records() {
            let record = record.map_err(csv_error)?;
            let line = record.position().map_or(0, |pos| pos.line() as usize);

            match layout.parse_row(&record, line)? {
                Some((row, target)) => {
                    data.extend_from_slice(&row);
                    targets.push(target);
                }
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped = skipped; "skipped rows with missing values");
        }

        if targets.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let features = Array2::from_shape_vec((targets.len(), FEATURE_NAMES.len()), data)
            .map_err(|e| MlErr::InvalidParams(e.to_string()))?;

        Self::new(
            features,
            Array1::from_vec(targets),
            FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            TARGET_NAME,
        )
    }

    /// Shuffles the rows with a seeded RNG and splits them in two.
    ///
    /// The test split takes `ceil(test_size * len)` rows and the train split
    /// the rest, so the same seed always yields the same partition.
    ///
    /// # Returns
    /// `(train, test)`.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(MlErr::InvalidSplit(format!(
                "test_size must be in (0, 1), got {test_size}"
            )));
        }

        let n = self.len();
        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(MlErr::InvalidSplit(format!(
                "test_size {test_size} leaves an empty split for {n} rows"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test, train) = indices.split_at(n_test);
        Ok((self.select(train), self.select(test)))
    }

    /// Returns a new dataset holding the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn targets(&self) -> ArrayView1<'_, f64> {
        self.targets.view()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }
}

/// Column positions of a recognised CSV header.
enum Layout {
    Frame { features: [usize; 8], target: usize },
    Census { columns: [usize; 9] },
}

impl Layout {
    fn detect(header: &StringRecord) -> Result<Self> {
        let position = |name: &str| header.iter().position(|column| column == name);
        let positions = |names: &[&str], out: &mut [usize]| -> Result<()> {
            for (slot, name) in out.iter_mut().zip(names) {
                *slot = position(name).ok_or_else(|| MlErr::MissingColumn(name.to_string()))?;
            }
            Ok(())
        };

        if let Some(target) = position(TARGET_NAME) {
            let mut features = [0; 8];
            positions(&FEATURE_NAMES, &mut features)?;
            return Ok(Layout::Frame { features, target });
        }

        if position(CENSUS_COLUMNS[8]).is_some() {
            let mut columns = [0; 9];
            positions(&CENSUS_COLUMNS, &mut columns)?;
            return Ok(Layout::Census { columns });
        }

        Err(MlErr::MissingColumn(TARGET_NAME.to_string()))
    }

    /// Parses one record, `None` when a required field is empty.
    fn parse_row(&self, fields: &StringRecord, line: usize) -> Result<Option<([f64; 8], f64)>> {
        match self {
            Layout::Frame { features, target } => {
                let mut row = [0.0; 8];
                if !parse_into(fields, features, &mut row, line)? {
                    return Ok(None);
                }

                let Some(y) = parse_field(&fields[*target], line)? else {
                    return Ok(None);
                };

                Ok(Some((row, y)))
            }
            Layout::Census { columns } => {
                let mut raw = [0.0; 9];
                if !parse_into(fields, columns, &mut raw, line)? {
                    return Ok(None);
                }

                let [longitude, latitude, age, rooms, bedrooms, population, households, income, value] =
                    raw;

                if households == 0.0 {
                    return Err(MlErr::Csv {
                        line,
                        msg: "households must be non-zero".to_string(),
                    });
                }

                let row = [
                    income,
                    age,
                    rooms / households,
                    bedrooms / households,
                    population,
                    population / households,
                    latitude,
                    longitude,
                ];

                Ok(Some((row, value / CENSUS_TARGET_SCALE)))
            }
        }
    }
}

fn parse_into(
    fields: &StringRecord,
    columns: &[usize],
    out: &mut [f64],
    line: usize,
) -> Result<bool> {
    for (slot, &column) in out.iter_mut().zip(columns) {
        let Some(value) = parse_field(&fields[column], line)? else {
            return Ok(false);
        };
        *slot = value;
    }

    Ok(true)
}

fn parse_field(field: &str, line: usize) -> Result<Option<f64>> {
    if field.is_empty() {
        return Ok(None);
    }

    field.parse::<f64>().map(Some).map_err(|e| MlErr::Csv {
        line,
        msg: format!("invalid number '{field}': {e}"),
    })
}

fn csv_error(e: csv::Error) -> MlErr {
    MlErr::Csv {
        line: e.position().map_or(0, |pos| pos.line() as usize),
        msg: e.to_string(),
    }
}
