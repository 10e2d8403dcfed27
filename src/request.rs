use std::time::Duration;

use serde_json::Value;

use crate::transport::Method;

/// Description of one backend call, before auth and base URL are applied.
///
/// `include_auth` defaults to `true` for every feature except `auth`, and
/// `unwrap_result` defaults to `true`.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ApiRequest {
    pub feature: &'static str,
    pub action: &'static str,
    pub method: Method,
    pub path: String,
    pub timeout: Option<Duration>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub include_auth: bool,
    pub unwrap_result: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(
        feature: &'static str,
        action: &'static str,
        method: Method,
        path: impl Into<String>,
    ) -> Self {
        Self {
            feature,
            action,
            method,
            path: path.into(),
            timeout: None,
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            include_auth: feature != "auth",
            unwrap_result: true,
        }
    }

    /// `feature.action`, as used in logs and errors.
    #[must_use]
    pub fn operation(&self) -> String {
        format!("{}.{}", self.feature, self.action)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Add a query pair only when `value` is present.
    #[must_use]
    pub fn with_optional_query(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.with_query(name, value),
            None => self,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_include_auth(mut self, include: bool) -> Self {
        self.include_auth = include;
        self
    }

    #[must_use]
    pub fn with_unwrap_result(mut self, unwrap: bool) -> Self {
        self.unwrap_result = unwrap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_feature_skips_bearer_by_default() {
        let login = ApiRequest::new("auth", "authenticate", Method::Post, "/auth/authenticate");
        assert!(!login.include_auth);
        assert!(login.unwrap_result);

        let farm = ApiRequest::new("farm", "getMyFarmInfo", Method::Get, "/farm/me");
        assert!(farm.include_auth);
        assert_eq!(farm.operation(), "farm.getMyFarmInfo");
    }

    #[test]
    fn optional_query_pairs() {
        let request = ApiRequest::new("market", "getItems", Method::Get, "/market/meta/items")
            .with_optional_query("keyword", Some("토마토"))
            .with_optional_query("largeCode", None::<&str>)
            .with_query("page", 1);
        assert_eq!(
            request.query,
            vec![
                ("keyword".to_string(), "토마토".to_string()),
                ("page".to_string(), "1".to_string())
            ]
        );
    }
}
