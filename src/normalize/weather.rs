use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coerce::{coerce_non_empty_string, coerce_number, non_empty_str, normalize_percent};
use super::envelope::Envelope;
use super::probe::{Probe, first_match};

const TEMP: &[Probe<f64>] = &[
    Probe::new(&["temp"], coerce_number),
    Probe::new(&["temperature"], coerce_number),
];
const HUMIDITY: &[Probe<f64>] = &[Probe::new(&["humidity"], coerce_number)];
const POP: &[Probe<f64>] = &[
    Probe::new(&["pop"], coerce_number),
    Probe::new(&["rainProb"], coerce_number),
    Probe::new(&["precipitationProbability"], coerce_number),
];
const PRECIPITATION: &[Probe<f64>] = &[Probe::new(&["precipitation"], coerce_number)];
const WIND_SPEED: &[Probe<f64>] = &[
    Probe::new(&["windSpeed"], coerce_number),
    Probe::new(&["wind_speed"], coerce_number),
];
const LOCATION: &[Probe<String>] = &[
    Probe::new(&["name"], coerce_non_empty_string),
    Probe::new(&["timezone"], coerce_non_empty_string),
];

/// Current conditions shown on the home dashboard.
///
/// `pop` is the precipitation probability on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub location: String,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub condition: String,
    pub pop: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub icon: String,
}

impl Default for WeatherSnapshot {
    fn default() -> Self {
        Self {
            location: "-".into(),
            temp: None,
            humidity: None,
            condition: "-".into(),
            pop: None,
            precipitation: None,
            wind_speed: None,
            icon: String::new(),
        }
    }
}

/// `Asia/Seoul` → `Seoul`, `New_York` → `New York`; blank → `-`.
#[must_use]
pub fn normalize_location(value: Option<&str>) -> String {
    let Some(trimmed) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return "-".into();
    };
    let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
    tail.replace('_', " ")
}

fn snapshot_from(candidate: &Map<String, Value>, current: &Map<String, Value>) -> WeatherSnapshot {
    let currents = [current];
    let first_weather = current
        .get("weather")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object);

    let condition = first_weather
        .and_then(|w| {
            w.get("description")
                .and_then(non_empty_str)
                .or_else(|| w.get("main").and_then(non_empty_str))
        })
        .or_else(|| current.get("weatherDescription").and_then(non_empty_str))
        .unwrap_or("-")
        .to_owned();

    WeatherSnapshot {
        location: normalize_location(first_match(&[candidate], LOCATION).as_deref()),
        temp: first_match(&currents, TEMP),
        humidity: first_match(&currents, HUMIDITY),
        condition,
        pop: first_match(&currents, POP).and_then(normalize_percent),
        precipitation: first_match(&currents, PRECIPITATION),
        wind_speed: first_match(&currents, WIND_SPEED),
        icon: first_weather
            .and_then(|w| w.get("icon"))
            .and_then(non_empty_str)
            .unwrap_or_default()
            .to_owned(),
    }
}

/// Normalize a `/weather` response.
///
/// The first envelope candidate carrying a `current` object wins. Returns
/// `None` when no candidate has one.
#[must_use]
pub fn parse_weather_response(raw: &Value) -> Option<WeatherSnapshot> {
    let envelope = Envelope::parse(raw);
    envelope.candidates().into_iter().find_map(|candidate| {
        let current = candidate.get("current")?.as_object()?;
        Some(snapshot_from(candidate, current))
    })
}
