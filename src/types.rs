use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Canonical sensor-type identifier (e.g. `carbondioxide`, `soilTemperature`).
///
/// Produced by [`normalize_sensor_key`](crate::normalize::normalize_sensor_key);
/// unknown backend keys are carried through unchanged.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct SensorKey(pub String);

impl SensorKey {
    pub const TEMPERATURE: &'static str = "temperature";
    pub const HUMIDITY: &'static str = "humidity";
    pub const CARBON_DIOXIDE: &'static str = "carbondioxide";
    pub const INSOLATION: &'static str = "insolation";
    pub const EC: &'static str = "ec";
    pub const HYDROGEN_ION: &'static str = "hydrogenIon";
    pub const SOIL_TEMPERATURE: &'static str = "soilTemperature";
    pub const SOIL_WATER: &'static str = "soilWater";

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SensorKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Login name submitted to `/auth/authenticate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
