//! Persisted session state: token pair, cached profile, consent flags and
//! the listeners notified whenever the session changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::normalize::AuthResult;
use crate::storage::SecureStore;

pub const ACCESS_TOKEN_KEY: &str = "auth_access_token";
pub const REFRESH_TOKEN_KEY: &str = "auth_refresh_token";
pub const PROFILE_KEY: &str = "auth_profile";
pub const TERMS_ACCEPTED_KEY: &str = "auth_has_accepted_terms";
pub const PRIVACY_ACCEPTED_KEY: &str = "auth_has_accepted_privacy";
pub const POLICIES_ACCEPTED_KEY: &str = "auth_has_accepted_policies";

/// Keys written by earlier releases. Never read; removed on clear.
pub const LEGACY_KEYS: &[&str] = &[
    "saved_user_id",
    "saved_password",
    "auto_login_token",
    "terms_agreed",
    "auth_username",
    "auth_name",
    "auth_phone",
    "auth_role",
    "auth_farm_address",
    "auth_farm_latitude",
    "auth_farm_longitude",
    "auth_ipcam_address",
    "auth_mac",
];

/// The stored token pair. Exists only while a non-empty refresh token is
/// stored; the access token may be empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Account details kept next to the tokens for offline display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipcam_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

impl From<&AuthResult> for SessionProfile {
    fn from(auth: &AuthResult) -> Self {
        Self {
            username: non_blank(&auth.username),
            name: non_blank(&auth.name),
            phone: auth.phone.clone(),
            role: non_blank(&auth.role),
            farm_address: auth.farm_address.clone(),
            farm_latitude: auth.farm_latitude,
            farm_longitude: auth.farm_longitude,
            ipcam_address: auth.ipcam_address.clone(),
            mac: None,
        }
    }
}

/// Terms, privacy and combined-policy acceptance.
///
/// `policies_accepted` is stored as given; it is not derived from the other
/// two flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentState {
    pub terms_accepted: bool,
    pub privacy_accepted: bool,
    pub policies_accepted: bool,
}

type Listener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, Listener>>,
}

impl Listeners {
    fn snapshot(&self) -> Vec<Listener> {
        match self.entries.lock() {
            Ok(entries) => entries.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    fn remove(&self, id: u64) {
        match self.entries.lock() {
            Ok(mut entries) => entries.remove(&id),
            Err(poisoned) => poisoned.into_inner().remove(&id),
        };
    }
}

/// Handle returned by [`SessionController::subscribe`]. Dropping it
/// unsubscribes the listener.
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Owns the persisted session and its change listeners.
///
/// All reads and writes of the token pair go through this type.
pub struct SessionController<S> {
    store: S,
    listeners: Arc<Listeners>,
}

impl<S: SecureStore> SessionController<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            listeners: Arc::new(Listeners::default()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a callback run after every save and clear.
    ///
    /// The callback receives the new session, or `None` once no refresh
    /// token is stored.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        match self.listeners.entries.lock() {
            Ok(mut entries) => entries.insert(id, Arc::new(listener)),
            Err(poisoned) => poisoned.into_inner().insert(id, Arc::new(listener)),
        };
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    fn notify(&self, session: Option<&Session>) {
        for listener in self.listeners.snapshot() {
            listener(session);
        }
    }

    /// Persist a token pair, trimmed, replacing any previous session.
    ///
    /// The stored profile is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if either write fails; listeners are not
    /// notified in that case.
    pub async fn save_session(&self, access_token: &str, refresh_token: &str) -> Result<(), Error> {
        let session = Session {
            access_token: access_token.trim().to_owned(),
            refresh_token: refresh_token.trim().to_owned(),
        };
        futures_util::try_join!(
            self.store.set(ACCESS_TOKEN_KEY, &session.access_token),
            self.store.set(REFRESH_TOKEN_KEY, &session.refresh_token),
        )?;
        if session.refresh_token.is_empty() {
            self.notify(None);
        } else {
            self.notify(Some(&session));
        }
        Ok(())
    }

    /// [`save_session`](Self::save_session) plus the profile shown while
    /// offline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if any write fails.
    pub async fn save_session_with_profile(
        &self,
        access_token: &str,
        refresh_token: &str,
        profile: &SessionProfile,
    ) -> Result<(), Error> {
        let encoded = serde_json::to_string(profile)
            .map_err(|e| Error::Storage(format!("encode profile: {e}")))?;
        self.store.set(PROFILE_KEY, &encoded).await?;
        self.save_session(access_token, refresh_token).await
    }

    /// The stored session, or `None` when no non-empty refresh token exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the store cannot be read.
    pub async fn get_session(&self) -> Result<Option<Session>, Error> {
        let (access, refresh) = futures_util::try_join!(
            self.store.get(ACCESS_TOKEN_KEY),
            self.store.get(REFRESH_TOKEN_KEY),
        )?;
        let Some(refresh_token) = refresh.as_deref().map(str::trim).filter(|r| !r.is_empty())
        else {
            return Ok(None);
        };
        Ok(Some(Session {
            access_token: access.as_deref().map(str::trim).unwrap_or_default().to_owned(),
            refresh_token: refresh_token.to_owned(),
        }))
    }

    /// The stored profile. An unreadable profile is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the store cannot be read.
    pub async fn profile(&self) -> Result<Option<SessionProfile>, Error> {
        let Some(raw) = self.store.get(PROFILE_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable stored profile");
                Ok(None)
            }
        }
    }

    /// Delete the token pair, the profile and every legacy key, then notify
    /// listeners with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if any delete fails.
    pub async fn clear_session(&self) -> Result<(), Error> {
        let keys = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, PROFILE_KEY]
            .into_iter()
            .chain(LEGACY_KEYS.iter().copied());
        try_join_all(keys.map(|key| self.store.delete(key))).await?;
        tracing::info!("Session cleared");
        self.notify(None);
        Ok(())
    }

    async fn set_flag(&self, key: &str, accepted: bool) -> Result<(), Error> {
        self.store.set(key, if accepted { "1" } else { "0" }).await
    }

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the write fails.
    pub async fn set_terms_accepted(&self, accepted: bool) -> Result<(), Error> {
        self.set_flag(TERMS_ACCEPTED_KEY, accepted).await
    }

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the write fails.
    pub async fn set_privacy_accepted(&self, accepted: bool) -> Result<(), Error> {
        self.set_flag(PRIVACY_ACCEPTED_KEY, accepted).await
    }

    /// Record combined policy acceptance.
    ///
    /// Callers are expected to pass `true` only after terms and privacy were
    /// both accepted; a mismatch is logged, not rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the store cannot be read or written.
    pub async fn set_policies_accepted(&self, accepted: bool) -> Result<(), Error> {
        if accepted {
            let consent = self.consent_state().await?;
            if !(consent.terms_accepted && consent.privacy_accepted) {
                tracing::warn!(
                    terms = consent.terms_accepted,
                    privacy = consent.privacy_accepted,
                    "Policies accepted without both underlying consents"
                );
            }
        }
        self.set_flag(POLICIES_ACCEPTED_KEY, accepted).await
    }

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the store cannot be read.
    pub async fn consent_state(&self) -> Result<ConsentState, Error> {
        let (terms, privacy, policies) = futures_util::try_join!(
            self.store.get(TERMS_ACCEPTED_KEY),
            self.store.get(PRIVACY_ACCEPTED_KEY),
            self.store.get(POLICIES_ACCEPTED_KEY),
        )?;
        Ok(ConsentState {
            terms_accepted: terms.as_deref() == Some("1"),
            privacy_accepted: privacy.as_deref() == Some("1"),
            policies_accepted: policies.as_deref() == Some("1"),
        })
    }

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the store cannot be read.
    pub async fn has_accepted_policies(&self) -> Result<bool, Error> {
        Ok(self.consent_state().await?.policies_accepted)
    }

    /// Clear the session and all consent flags, returning the store to a
    /// first-launch state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if any delete fails.
    pub async fn reset_for_retest(&self) -> Result<(), Error> {
        self.clear_session().await?;
        futures_util::try_join!(
            self.store.delete(TERMS_ACCEPTED_KEY),
            self.store.delete(PRIVACY_ACCEPTED_KEY),
            self.store.delete(POLICIES_ACCEPTED_KEY),
        )?;
        Ok(())
    }
}

impl<S> fmt::Debug for SessionController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController").finish_non_exhaustive()
    }
}
