use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coerce::{coerce_non_empty_string, coerce_number, non_empty_str, try_parse_json};
use super::envelope::Envelope;
use super::probe::{Probe, first_match};
use crate::types::SensorKey;

const ROW_CONTAINER_KEYS: &[&str] = &["items", "records", "list", "content", "data"];

const POINT_LABEL: &[Probe<String>] = &[
    Probe::new(&["label"], coerce_non_empty_string),
    Probe::new(&["timeLabel"], coerce_non_empty_string),
    Probe::new(&["time"], coerce_non_empty_string),
    Probe::new(&["date"], coerce_non_empty_string),
];
const POINT_VALUE: &[Probe<f64>] = &[
    Probe::new(&["avgValue"], coerce_number),
    Probe::new(&["value"], coerce_number),
];
const ROW_VALUE: &[Probe<f64>] = &[
    Probe::new(&["value"], coerce_number),
    Probe::new(&["sensorValue"], coerce_number),
    Probe::new(&["avgValue"], coerce_number),
];

/// Map a backend sensor-type key to its canonical identifier.
///
/// `co2`, `carbon_dioxide`, `carbonDioxide` → `carbondioxide`,
/// `soil_temperature` → `soilTemperature`, and so on. Matching is
/// case-insensitive; unknown keys pass through unchanged.
#[must_use]
pub fn normalize_sensor_key(key: &str) -> SensorKey {
    let lowered = key.trim().to_ascii_lowercase();
    let canonical = match lowered.as_str() {
        "carbondioxide" | "carbon_dioxide" | "co2" => SensorKey::CARBON_DIOXIDE,
        "soiltemperature" | "soil_temperature" => SensorKey::SOIL_TEMPERATURE,
        "soilwater" | "soil_water" => SensorKey::SOIL_WATER,
        "hydrogenion" | "hydrogen_ion" => SensorKey::HYDROGEN_ION,
        "temperature" => SensorKey::TEMPERATURE,
        "humidity" => SensorKey::HUMIDITY,
        "insolation" => SensorKey::INSOLATION,
        "ec" => SensorKey::EC,
        _ => return SensorKey(key.to_owned()),
    };
    SensorKey::from(canonical)
}

/// Display form of a unit: `degC` → `°C`, `W/m2` → `W/m²`, `uS/cm` → `μS/cm`.
#[must_use]
pub fn normalize_unit(unit: &str) -> Option<String> {
    let trimmed = unit.trim();
    let normalized = match trimmed {
        "" => return None,
        "degC" => "°C",
        "W/m2" => "W/m²",
        "uS/cm" => "μS/cm",
        other => other,
    };
    Some(normalized.to_owned())
}

fn object_rows(value: &Value) -> Option<Vec<Map<String, Value>>> {
    let rows: Vec<_> = value
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .cloned()
        .collect();
    (!rows.is_empty()).then_some(rows)
}

/// Locate the list of sensor rows in a `/sensor/recent`-style response.
///
/// Accepts a bare array, an array at any envelope level, or an object at an
/// envelope level holding `items`/`records`/`list`/`content`. A response with
/// `success: false` yields no rows.
#[must_use]
pub fn extract_sensor_rows(raw: &Value) -> Vec<Map<String, Value>> {
    let envelope = Envelope::parse(raw);
    let root = envelope.root();
    if let Some(rows) = object_rows(root) {
        return rows;
    }
    if root.get("success").and_then(Value::as_bool) == Some(false) {
        return Vec::new();
    }

    envelope
        .candidate_values()
        .into_iter()
        .find_map(|candidate| {
            object_rows(candidate).or_else(|| {
                let record = candidate.as_object()?;
                ROW_CONTAINER_KEYS
                    .iter()
                    .find_map(|key| record.get(*key).and_then(object_rows))
            })
        })
        .unwrap_or_default()
}

/// Latest value and unit per canonical sensor key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReadings {
    pub values: BTreeMap<SensorKey, f64>,
    pub units: BTreeMap<SensorKey, String>,
}

impl SensorReadings {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(&SensorKey::from(key)).copied()
    }

    #[must_use]
    pub fn unit(&self, key: &str) -> Option<&str> {
        self.units.get(&SensorKey::from(key)).map(String::as_str)
    }
}

/// Fold sensor rows into readings. Rows without a type or a numeric value
/// are skipped; later rows overwrite earlier ones for the same key.
#[must_use]
pub fn readings_from_rows(rows: &[Map<String, Value>]) -> SensorReadings {
    let mut readings = SensorReadings::default();
    for row in rows {
        let Some(kind) = ["type", "sensorType", "name"]
            .iter()
            .find_map(|key| row.get(*key).and_then(non_empty_str))
        else {
            continue;
        };
        let Some(value) = first_match(&[row], ROW_VALUE) else {
            continue;
        };
        let key = normalize_sensor_key(kind);
        if let Some(unit) = ["unit", "sensorUnit"]
            .iter()
            .find_map(|k| row.get(*k).and_then(non_empty_str))
            .and_then(normalize_unit)
        {
            readings.units.insert(key.clone(), unit);
        }
        readings.values.insert(key, value);
    }
    readings
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPoint {
    pub label: String,
    pub avg_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarySeries {
    pub daily: Vec<SummaryPoint>,
    pub weekly: Vec<SummaryPoint>,
    pub monthly: Vec<SummaryPoint>,
}

/// Per-period averages for the user's farm and the leader farm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSummary {
    pub my: SummarySeries,
    pub leader: SummarySeries,
}

fn point_array(value: Option<&Value>) -> Vec<SummaryPoint> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|row| {
            let rows = [row];
            Some(SummaryPoint {
                label: first_match(&rows, POINT_LABEL)?,
                avg_value: first_match(&rows, POINT_VALUE)?,
            })
        })
        .collect()
}

fn series(value: Option<&Value>) -> SummarySeries {
    let Some(value) = value else {
        return SummarySeries::default();
    };
    let parsed = try_parse_json(value);
    let Some(record) = parsed.as_object() else {
        return SummarySeries::default();
    };
    SummarySeries {
        daily: point_array(record.get("daily")),
        weekly: point_array(record.get("weekly")),
        monthly: point_array(record.get("monthly")),
    }
}

/// Normalize a `/sensor/summary` response.
///
/// The first envelope candidate with a `my` or `leader` key is used; otherwise
/// every series is empty.
#[must_use]
pub fn parse_sensor_summary(raw: &Value) -> SensorSummary {
    let envelope = Envelope::parse(raw);
    envelope
        .candidates()
        .into_iter()
        .find(|c| c.contains_key("my") || c.contains_key("leader"))
        .map(|c| SensorSummary {
            my: series(c.get("my")),
            leader: series(c.get("leader")),
        })
        .unwrap_or_default()
}
