use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::endpoints;
use crate::error::Error;
use crate::normalize::{
    SensorReadings, SensorSummary, extract_sensor_rows, parse_sensor_summary, readings_from_rows,
};
use crate::storage::SecureStore;
use crate::transport::Transport;

/// Query of `GET /sensor/summary`. The backend accepts the sensor under
/// either `sensorType` or `type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub sensor_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub show_type: Option<String>,
}

impl SummaryQuery {
    #[must_use]
    pub fn for_sensor(sensor: impl Into<String>) -> Self {
        Self {
            sensor_type: Some(sensor.into()),
            ..Self::default()
        }
    }
}

impl<S: SecureStore, T: Transport> ApiClient<S, T> {
    /// Daily, weekly and monthly averages for one sensor, mine and the
    /// leader farm's.
    ///
    /// # Errors
    ///
    /// Transport, status and storage errors from [`ApiClient::call`].
    pub async fn sensor_summary(&self, query: &SummaryQuery) -> Result<SensorSummary, Error> {
        let request = endpoints::sensor_summary()
            .with_optional_query("sensorType", query.sensor_type.as_deref())
            .with_optional_query("type", query.kind.as_deref())
            .with_optional_query("showType", query.show_type.as_deref());
        let raw = self.call(request).await?;
        Ok(parse_sensor_summary(&raw))
    }

    /// Latest reading per sensor.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidResponse`] when the response holds no sensor rows, plus
    /// the errors of [`ApiClient::call`].
    pub async fn recent_sensor_data(&self) -> Result<SensorReadings, Error> {
        let raw = self.call(endpoints::recent_sensor_data()).await?;
        let rows = extract_sensor_rows(&raw);
        if rows.is_empty() {
            return Err(Error::InvalidResponse("no sensor rows in response".into()));
        }
        tracing::debug!(rows = rows.len(), "Recent sensor rows");
        Ok(readings_from_rows(&rows))
    }
}
