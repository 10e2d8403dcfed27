use std::fmt;

use serde::Serialize;

use crate::client::ApiClient;
use crate::endpoints;
use crate::error::Error;
use crate::normalize::{AuthResult, normalize_auth_response};
use crate::session::SessionProfile;
use crate::storage::SecureStore;
use crate::transport::Transport;
use crate::types::Username;
use crate::validation::LoginForm;

/// Body of `POST /auth/authenticate`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: Username,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies_accepted: Option<bool>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Username(username.into()),
            password: password.into(),
            terms_accepted: None,
            privacy_accepted: None,
            policies_accepted: None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl<S: SecureStore, T: Transport> ApiClient<S, T> {
    /// Log in and persist the returned session and profile.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a blank username or password (no request is sent).
    /// - [`Error::MissingTokens`] if the response carries no access token.
    /// - Transport, status and storage errors.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, Error> {
        LoginForm {
            user_id: credentials.username.as_str().to_owned(),
            password: credentials.password.clone(),
        }
        .validate()?;

        let body = serde_json::to_value(credentials)
            .map_err(|e| Error::InvalidResponse(format!("encode credentials: {e}")))?;
        let raw = self.call(endpoints::authenticate().with_body(body)).await?;

        let result = normalize_auth_response(&raw, Some(credentials.username.as_str()))
            .ok_or(Error::MissingTokens)?;
        self.sessions()
            .save_session_with_profile(
                &result.access_token,
                &result.refresh_token,
                &SessionProfile::from(&result),
            )
            .await?;

        tracing::info!(username = %result.username, farms = result.farms.len(), "Logged in");
        Ok(result)
    }

    /// Drop the stored session and profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the store rejects a delete.
    pub async fn logout(&self) -> Result<(), Error> {
        self.sessions().clear_session().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::testing::ScriptedTransport;
    use crate::config::ClientConfig;
    use crate::storage::MemoryStore;

    fn client(transport: ScriptedTransport) -> ApiClient<MemoryStore, ScriptedTransport> {
        let config = ClientConfig::new("https://api.example.com".parse().unwrap());
        ApiClient::with_transport(config, MemoryStore::new(), transport)
    }

    #[tokio::test]
    async fn authenticate_saves_session_and_profile() {
        let transport = ScriptedTransport::default();
        transport.reply(
            "/auth/authenticate",
            Ok(json!({
                "data": {"result": {
                    "accessToken": "A1",
                    "refreshToken": "R1",
                    "name": "김농부",
                    "farms": [{"farmId": 7, "address": "전남 나주", "latitude": "35.01"}]
                }}
            })),
        );
        let client = client(transport);

        let mut credentials = Credentials::new("farmer", "pw");
        credentials.terms_accepted = Some(true);
        let result = client.authenticate(&credentials).await.unwrap();
        assert_eq!(result.access_token, "A1");
        assert_eq!(result.username, "farmer");

        let session = client.sessions().get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "A1");
        assert_eq!(session.refresh_token, "R1");
        let profile = client.sessions().profile().await.unwrap().unwrap();
        assert_eq!(profile.farm_address.as_deref(), Some("전남 나주"));

        let sent = &client.transport().requests_to("/auth/authenticate")[0];
        assert_eq!(sent.bearer, None);
        assert_eq!(
            sent.body,
            Some(json!({"username": "farmer", "password": "pw", "termsAccepted": true}))
        );
    }

    #[tokio::test]
    async fn missing_tokens_is_an_error() {
        let transport = ScriptedTransport::default();
        transport.reply("/auth/authenticate", Ok(json!({"data": {"message": "ok"}})));
        let client = client(transport);

        let err = client
            .authenticate(&Credentials::new("farmer", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingTokens));
        assert_eq!(client.sessions().get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn blank_password_never_reaches_the_network() {
        let client = client(ScriptedTransport::default());
        let err = client
            .authenticate(&Credentials::new("farmer", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref v) if v.field == "password"));
        assert!(client.transport().log.lock().unwrap().is_empty());
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("farmer", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
