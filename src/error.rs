use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "reqwest-transport")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("{operation} failed with status {status}: {detail}")]
    Status {
        operation: String,
        status: u16,
        detail: String,
    },

    #[error("missing token fields in authenticate response")]
    MissingTokens,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// HTTP status carried by the error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            #[cfg(feature = "reqwest-transport")]
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    /// `true` for timeouts, which callers may word differently from other
    /// network failures.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            #[cfg(feature = "reqwest-transport")]
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_helpers() {
        let err = Error::Status {
            operation: "sensor.recentSensorData".into(),
            status: 401,
            detail: String::new(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_forbidden());
        assert_eq!(err.status(), Some(401));

        let forbidden = Error::Status {
            operation: "farm.getMyFarmInfo".into(),
            status: 403,
            detail: "denied".into(),
        };
        assert!(forbidden.is_forbidden());
        assert_eq!(
            forbidden.to_string(),
            "farm.getMyFarmInfo failed with status 403: denied"
        );
    }

    #[test]
    fn timeout_is_distinguishable() {
        let err = Error::Timeout {
            operation: "weather.getWeather".into(),
        };
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
        assert!(!Error::MissingTokens.is_timeout());
    }
}
