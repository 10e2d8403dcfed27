#![doc = include_str!("../README.md")]

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod normalize;
pub mod request;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod validation;

// Re-exports for convenient access
pub use api::{ChartQuery, Credentials, ItemQuery, SearchPage, SummaryQuery, WeatherQuery};
pub use cache::{CacheOptions, Fingerprint, Resource, ResourceCache, SharedError, SingleFlight};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::Error;
pub use request::ApiRequest;
pub use session::{ConsentState, Session, SessionController, SessionProfile, Subscription};
pub use storage::{FileStore, MemoryStore, SecureStore};
#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
pub use transport::{HttpRequest, Method, Transport};
pub use types::{SensorKey, Username};
pub use validation::{
    LoginForm, MarketSearchFilters, ThresholdDraft, ThresholdRule, ThresholdValue, ValidationError,
};
