//! Typed calls per backend feature.
//!
//! Each function issues its preset through [`ApiClient::call`](crate::ApiClient::call)
//! and hands the body to the matching composer in [`normalize`](crate::normalize).

mod auth;
mod farm;
mod market;
mod sensor;
mod weather;

pub use auth::Credentials;
pub use market::{ChartQuery, ItemQuery, SearchPage};
pub use sensor::SummaryQuery;
pub use weather::WeatherQuery;
