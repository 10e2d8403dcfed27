use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::{Value, json};
use url::Url;

use crate::cache::SingleFlight;
use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::Error;
use crate::normalize::{extract_refreshed_tokens, unwrap_common_result};
use crate::request::ApiRequest;
use crate::session::SessionController;
use crate::storage::SecureStore;
use crate::transport::{HttpRequest, Transport};

#[cfg(feature = "reqwest-transport")]
use crate::transport::ReqwestTransport;

struct ClientInner<S, T> {
    config: ClientConfig,
    transport: T,
    sessions: SessionController<S>,
    refresh: SingleFlight<(), Option<String>>,
}

/// Authenticated API client.
///
/// Attaches the stored access token to every call that includes auth, and on
/// a 401 refreshes the token once and retries once. Concurrent refreshes are
/// coalesced into a single request. Cloning is cheap; clones share the
/// session and the in-flight refresh.
pub struct ApiClient<S, T> {
    inner: Arc<ClientInner<S, T>>,
}

impl<S, T> Clone for ApiClient<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, T> fmt::Debug for ApiClient<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "reqwest-transport")]
impl<S: SecureStore> ApiClient<S, ReqwestTransport> {
    /// Create a client over a default `reqwest` transport.
    #[must_use]
    pub fn new(config: ClientConfig, store: S) -> Self {
        Self::with_transport(config, store, ReqwestTransport::new())
    }
}

impl<S: SecureStore, T: Transport> ApiClient<S, T> {
    /// Create a client over a custom transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, store: S, transport: T) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                sessions: SessionController::new(store),
                refresh: SingleFlight::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The session controller backing this client.
    #[must_use]
    pub fn sessions(&self) -> &SessionController<S> {
        &self.inner.sessions
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Issue `request`, refreshing and retrying once on 401.
    ///
    /// Calls that include auth get `Authorization: Bearer <access token>`
    /// when one is stored. A stored session with an empty access token is
    /// refreshed before the first attempt; that refresh counts as the call's
    /// one refresh, so a following 401 is returned without another.
    ///
    /// # Errors
    ///
    /// - Transport and non-401 status errors of the first attempt, unchanged.
    /// - The original 401 when the refresh fails or yields no access token.
    /// - The retry's error when the retried call fails.
    /// - [`Error::Storage`] if the session cannot be read.
    pub async fn call(&self, request: ApiRequest) -> Result<Value, Error> {
        let url = self.inner.config.endpoint_url(&request.path)?;
        let (bearer, refreshed) = if request.include_auth {
            self.resolve_access_token().await?
        } else {
            (None, false)
        };
        let http = self.inner.http_request(&request, url, bearer);

        let err = match self.inner.transport.send(http.clone()).await {
            Ok(body) => return Ok(finish(body, request.unwrap_result)),
            Err(err) => err,
        };

        if !request.include_auth {
            return Err(err);
        }
        if err.is_forbidden() {
            tracing::warn!(operation = %http.operation, "Forbidden, clearing session");
            self.inner.clear_after_auth_failure().await;
            return Err(err);
        }
        if !err.is_unauthorized() {
            return Err(err);
        }

        // One refresh per call, including the one made before the first attempt.
        if refreshed {
            if http.bearer.is_some() {
                tracing::warn!(operation = %http.operation, "Refreshed token rejected, clearing session");
                self.inner.clear_after_auth_failure().await;
            }
            return Err(err);
        }

        tracing::debug!(operation = %http.operation, "Unauthorized, refreshing access token");
        let Some(token) = self.refresh_access_token().await else {
            return Err(err);
        };

        let mut retry = http;
        retry.bearer = Some(token);
        let operation = retry.operation.clone();
        match self.inner.transport.send(retry).await {
            Ok(body) => Ok(finish(body, request.unwrap_result)),
            Err(retry_err) => {
                if retry_err.is_unauthorized() || retry_err.is_forbidden() {
                    tracing::warn!(operation = %operation, "Retry rejected after refresh, clearing session");
                    self.inner.clear_after_auth_failure().await;
                }
                Err(retry_err)
            }
        }
    }

    /// Exchange the stored refresh token for a new access token and persist
    /// the new pair.
    ///
    /// Concurrent callers share one refresh request. Returns `None` when no
    /// session is stored or the refresh fails.
    pub async fn refresh_access_token(&self) -> Option<String> {
        let inner: Weak<ClientInner<S, T>> = Arc::downgrade(&self.inner);
        self.inner
            .refresh
            .run((), move || async move {
                let inner = inner.upgrade()?;
                inner.refresh_once().await
            })
            .await
    }

    /// Bearer for the first attempt, and whether a refresh was already
    /// spent obtaining it.
    async fn resolve_access_token(&self) -> Result<(Option<String>, bool), Error> {
        let Some(session) = self.inner.sessions.get_session().await? else {
            return Ok((None, false));
        };
        if !session.access_token.is_empty() {
            return Ok((Some(session.access_token), false));
        }
        tracing::debug!("Stored session has no access token, refreshing first");
        Ok((self.refresh_access_token().await, true))
    }
}

impl<S: SecureStore, T: Transport> ClientInner<S, T> {
    fn http_request(&self, request: &ApiRequest, url: Url, bearer: Option<String>) -> HttpRequest {
        HttpRequest {
            operation: request.operation(),
            method: request.method,
            url,
            bearer,
            headers: request.headers.clone(),
            query: request.query.clone(),
            body: request.body.clone(),
            timeout: request.timeout.or(self.config.default_timeout),
        }
    }

    async fn refresh_once(&self) -> Option<String> {
        let session = match self.sessions.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read session for refresh");
                return None;
            }
        };
        let refresh_token = session.refresh_token;

        let request = endpoints::refresh_token().with_body(json!({
            "refreshToken": refresh_token,
            "refresh_token": refresh_token,
        }));
        let url = match self.config.endpoint_url(&request.path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid refresh endpoint");
                return None;
            }
        };
        let http = self.http_request(&request, url, Some(refresh_token.clone()));

        let body = match self.transport.send(http).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                if e.is_unauthorized() || e.is_forbidden() {
                    self.clear_after_auth_failure().await;
                }
                return None;
            }
        };

        let Some((access, refresh)) = extract_refreshed_tokens(&body, &refresh_token) else {
            tracing::warn!("Refresh response carried no access token");
            return None;
        };
        if let Err(e) = self.sessions.save_session(&access, &refresh).await {
            tracing::warn!(error = %e, "Failed to persist refreshed tokens");
            return None;
        }
        tracing::info!("Access token refreshed");
        Some(access.trim().to_owned())
    }

    async fn clear_after_auth_failure(&self) {
        if !self.config.clear_session_on_auth_failure {
            return;
        }
        if let Err(e) = self.sessions.clear_session().await {
            tracing::warn!(error = %e, "Failed to clear session after auth failure");
        }
    }
}

fn finish(body: Value, unwrap_result: bool) -> Value {
    if unwrap_result {
        unwrap_common_result(body)
    } else {
        body
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies are matched by URL path in FIFO order; a path with no
    /// scripted reply answers 404.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<Vec<(String, VecDeque<Result<Value, u16>>)>>,
        pub(crate) log: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn reply(&self, path: &str, reply: Result<Value, u16>) -> &Self {
            let mut replies = self.replies.lock().unwrap();
            match replies.iter_mut().find(|(p, _)| p == path) {
                Some((_, queue)) => queue.push_back(reply),
                None => replies.push((path.to_owned(), VecDeque::from([reply]))),
            }
            self
        }

        /// Reply forever with `status`.
        pub(crate) fn always(&self, path: &str, status: u16) -> &Self {
            for _ in 0..16 {
                self.reply(path, Err(status));
            }
            self
        }

        pub(crate) fn calls_to(&self, path: &str) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url.path() == path)
                .count()
        }

        pub(crate) fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url.path() == path)
                .cloned()
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<Value, Error> {
            let path = request.url.path().to_owned();
            let operation = request.operation.clone();
            self.log.lock().unwrap().push(request);
            tokio::task::yield_now().await;
            let reply = self
                .replies
                .lock()
                .unwrap()
                .iter_mut()
                .find(|(p, _)| *p == path)
                .and_then(|(_, queue)| queue.pop_front())
                .unwrap_or(Err(404));
            reply.map_err(|status| Error::Status {
                operation,
                status,
                detail: String::new(),
            })
        }
    }
}
