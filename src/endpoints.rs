//! Backend paths and the request preset for each call.

use std::time::Duration;

use crate::request::ApiRequest;
use crate::transport::Method;

/// Weather and market listings are slow upstream.
pub const SLOW_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub const AUTHENTICATE: &str = "/auth/authenticate";
pub const REFRESH_TOKEN: &str = "/auth/refresh-token";
pub const WEATHER: &str = "/weather";
pub const FARM_ME: &str = "/farm/me";
pub const SENSOR_SUMMARY: &str = "/sensor/summary";
pub const SENSOR_RECENT: &str = "/sensor/recent";
pub const MARKET_RECENT_PRICES: &str = "/market/prices/recently";
pub const MARKET_SEARCH_PRICES: &str = "/market/prices/search";
pub const MARKET_AVERAGE_PRICES: &str = "/market/prices/average";
pub const MARKET_MARKETS: &str = "/market/meta/markets";
pub const MARKET_ITEMS: &str = "/market/meta/items";

#[must_use]
pub fn authenticate() -> ApiRequest {
    ApiRequest::new("auth", "authenticate", Method::Post, AUTHENTICATE).with_unwrap_result(false)
}

#[must_use]
pub fn refresh_token() -> ApiRequest {
    ApiRequest::new("auth", "refreshToken", Method::Post, REFRESH_TOKEN).with_unwrap_result(false)
}

#[must_use]
pub fn weather() -> ApiRequest {
    ApiRequest::new("weather", "getWeather", Method::Get, WEATHER).with_timeout(SLOW_CALL_TIMEOUT)
}

#[must_use]
pub fn my_farm() -> ApiRequest {
    ApiRequest::new("farm", "getMyFarmInfo", Method::Get, FARM_ME).with_unwrap_result(false)
}

#[must_use]
pub fn sensor_summary() -> ApiRequest {
    ApiRequest::new("sensor", "sensorTypeSummary", Method::Get, SENSOR_SUMMARY)
        .with_unwrap_result(false)
}

#[must_use]
pub fn recent_sensor_data() -> ApiRequest {
    ApiRequest::new("sensor", "recentSensorData", Method::Get, SENSOR_RECENT)
        .with_unwrap_result(false)
}

#[must_use]
pub fn recent_prices() -> ApiRequest {
    ApiRequest::new("market", "getRecentlyPrices", Method::Get, MARKET_RECENT_PRICES)
        .with_unwrap_result(false)
        .with_timeout(SLOW_CALL_TIMEOUT)
}

#[must_use]
pub fn search_prices() -> ApiRequest {
    ApiRequest::new("market", "searchMarketPrices", Method::Get, MARKET_SEARCH_PRICES)
        .with_unwrap_result(false)
        .with_timeout(SLOW_CALL_TIMEOUT)
}

#[must_use]
pub fn average_prices() -> ApiRequest {
    ApiRequest::new("market", "getSettlementAvgPrices", Method::Get, MARKET_AVERAGE_PRICES)
        .with_unwrap_result(false)
}

#[must_use]
pub fn markets() -> ApiRequest {
    ApiRequest::new("market", "getMarkets", Method::Get, MARKET_MARKETS).with_unwrap_result(false)
}

#[must_use]
pub fn items() -> ApiRequest {
    ApiRequest::new("market", "getItems", Method::Get, MARKET_ITEMS).with_unwrap_result(false)
}
