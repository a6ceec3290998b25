//! The request schema: one feature row, or a list of them, coerced into the
//! column order the model was trained on.

use ndarray::Array2;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, StartupError};

/// The eight California Housing features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    MedInc,
    HouseAge,
    AveRooms,
    AveBedrms,
    Population,
    AveOccup,
    Latitude,
    Longitude,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::MedInc,
        Feature::HouseAge,
        Feature::AveRooms,
        Feature::AveBedrms,
        Feature::Population,
        Feature::AveOccup,
        Feature::Latitude,
        Feature::Longitude,
    ];

    /// The column name used in requests and in the artifact.
    pub fn name(self) -> &'static str {
        match self {
            Feature::MedInc => "MedInc",
            Feature::HouseAge => "HouseAge",
            Feature::AveRooms => "AveRooms",
            Feature::AveBedrms => "AveBedrms",
            Feature::Population => "Population",
            Feature::AveOccup => "AveOccup",
            Feature::Latitude => "Latitude",
            Feature::Longitude => "Longitude",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.name() == name)
    }
}

/// One block group's features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InputFeatures {
    /// Median income in block group (10k USD).
    #[serde(rename = "MedInc")]
    pub med_inc: f64,
    /// Median house age in years.
    #[serde(rename = "HouseAge")]
    pub house_age: f64,
    /// Average number of rooms per household.
    #[serde(rename = "AveRooms")]
    pub ave_rooms: f64,
    /// Average number of bedrooms per household.
    #[serde(rename = "AveBedrms")]
    pub ave_bedrms: f64,
    /// Block group population.
    #[serde(rename = "Population")]
    pub population: f64,
    /// Average household occupancy.
    #[serde(rename = "AveOccup")]
    pub ave_occup: f64,
    /// Block group latitude.
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    /// Block group longitude.
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

impl InputFeatures {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::MedInc => self.med_inc,
            Feature::HouseAge => self.house_age,
            Feature::AveRooms => self.ave_rooms,
            Feature::AveBedrms => self.ave_bedrms,
            Feature::Population => self.population,
            Feature::AveOccup => self.ave_occup,
            Feature::Latitude => self.latitude,
            Feature::Longitude => self.longitude,
        }
    }

    /// Reads a row from a JSON object. Every feature is required and may be a
    /// number or a string holding one; unknown keys are ignored.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self, String> {
        let mut values = [0.0; 8];
        for (slot, feature) in values.iter_mut().zip(Feature::ALL) {
            let name = feature.name();
            let value = object
                .get(name)
                .ok_or_else(|| format!("field `{name}` is required"))?;
            *slot = coerce(value).ok_or_else(|| {
                format!("field `{name}` must be a number, got {}", describe(value))
            })?;
        }

        let [med_inc, house_age, ave_rooms, ave_bedrms, population, ave_occup, latitude, longitude] =
            values;

        Ok(Self {
            med_inc,
            house_age,
            ave_rooms,
            ave_bedrms,
            population,
            ave_occup,
            latitude,
            longitude,
        })
    }
}

fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a non-numeric string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses a `/predict` body. A single object is a one-row batch.
pub fn parse_rows(body: &[u8]) -> Result<Vec<InputFeatures>, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    match value {
        Value::Object(object) => InputFeatures::from_object(&object)
            .map(|row| vec![row])
            .map_err(ApiError::Validation),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(ApiError::Validation(
                    "expected at least one feature row".to_string(),
                ));
            }

            items
                .iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Object(object) => InputFeatures::from_object(object)
                        .map_err(|msg| ApiError::Validation(format!("row {idx}: {msg}"))),
                    other => Err(ApiError::Validation(format!(
                        "row {idx}: expected an object, got {}",
                        describe(other)
                    ))),
                })
                .collect()
        }
        other => Err(ApiError::Validation(format!(
            "expected a feature object or a list of them, got {}",
            describe(&other)
        ))),
    }
}

/// Maps the artifact's feature order onto the request schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    columns: Vec<Feature>,
}

impl RowLayout {
    /// Fails on a feature name the schema does not define.
    pub fn new(feature_names: &[String]) -> Result<Self, StartupError> {
        let columns = feature_names
            .iter()
            .map(|name| {
                Feature::from_name(name).ok_or_else(|| StartupError::UnknownFeature(name.clone()))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Feature] {
        &self.columns
    }

    /// Builds the model input, one row per request row, columns in training
    /// order.
    pub fn to_matrix(&self, rows: &[InputFeatures]) -> Array2<f64> {
        Array2::from_shape_fn((rows.len(), self.columns.len()), |(i, j)| {
            rows[i].get(self.columns[j])
        })
    }
}
