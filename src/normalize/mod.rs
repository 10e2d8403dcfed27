//! Response normalization.
//!
//! Every function here is pure and total: raw JSON in, typed record (or
//! `None` / an empty structure) out. Nothing in this module returns
//! [`Error`](crate::Error).

pub mod auth;
pub mod coerce;
pub mod envelope;
pub mod farm;
pub mod market;
pub mod probe;
pub mod sensor;
pub mod weather;

pub use auth::{AuthFarm, AuthResult, extract_refreshed_tokens, normalize_auth_response};
pub use coerce::{coerce_non_empty_string, coerce_number};
pub use envelope::{Envelope, unwrap_common_result, unwrap_envelope};
pub use farm::{FarmProfile, normalize_farm_profile};
pub use market::{
    ChartFallback, GradePrice, MarketChartPoint, MarketChartSeries, PriceSection,
    parse_market_chart_data, parse_recent_price_sections,
};
pub use probe::{Probe, extract_field, first_match};
pub use sensor::{
    SensorReadings, SensorSummary, SummaryPoint, SummarySeries, extract_sensor_rows,
    normalize_sensor_key, normalize_unit, readings_from_rows, parse_sensor_summary,
};
pub use weather::{WeatherSnapshot, parse_weather_response};

