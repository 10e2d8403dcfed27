use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::endpoints;
use crate::error::Error;
use crate::normalize::{WeatherSnapshot, parse_weather_response};
use crate::storage::SecureStore;
use crate::transport::Transport;

/// Coordinates for `GET /weather`. `exclude` is passed through to the
/// upstream provider (e.g. `"minutely,alerts"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub lat: f64,
    pub lon: f64,
    pub exclude: Option<String>,
}

impl WeatherQuery {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            exclude: None,
        }
    }
}

impl<S: SecureStore, T: Transport> ApiClient<S, T> {
    /// Current weather at `query`, or `None` when the body has no current conditions.
    ///
    /// # Errors
    ///
    /// Transport, status and storage errors from [`ApiClient::call`].
    pub async fn weather(&self, query: &WeatherQuery) -> Result<Option<WeatherSnapshot>, Error> {
        let request = endpoints::weather()
            .with_query("lat", query.lat)
            .with_query("lon", query.lon)
            .with_optional_query("exclude", query.exclude.as_deref());
        let raw = self.call(request).await?;
        Ok(parse_weather_response(&raw))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::testing::ScriptedTransport;
    use crate::config::ClientConfig;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn sends_coordinates_and_normalizes() {
        let transport = ScriptedTransport::default();
        transport.reply(
            "/weather",
            Ok(json!({"result": {"timezone": "Asia/Seoul", "current": {"temp": 21.5}}})),
        );
        let config = ClientConfig::new("https://api.example.com".parse().unwrap());
        let client = ApiClient::with_transport(config, MemoryStore::new(), transport);

        let snapshot = client
            .weather(&WeatherQuery::new(35.0, 126.7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.location, "Seoul");

        let sent = &client.transport().requests_to("/weather")[0];
        assert_eq!(
            sent.query,
            vec![
                ("lat".to_string(), "35".to_string()),
                ("lon".to_string(), "126.7".to_string())
            ]
        );
    }
}
