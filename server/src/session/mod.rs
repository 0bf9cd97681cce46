//! The session wrapper around the OIDC client.
//!
//! A [`Session`] owns discovery metadata and an [`AuthState`], and sequences
//! calls into an [`AuthorizationServer`]. Network operations never hold the
//! state lock across an `.await`: they move into an in-flight state, release
//! the lock, and settle the state again once the issuer has answered. An
//! [`InFlight`] guard rolls the state back if the future errors or is dropped.

use std::fmt;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::OidcConfig;
use crate::oidc::{
    mask_token, AuthorizationRequest, AuthorizationResponse, AuthorizationServer, CallbackParams,
    GrantType, HttpAuthorizationServer, ProtocolError, RevokeTokenRequest, ServiceConfiguration,
    TokenRequest, UserInfo,
};

pub mod state;

pub use state::AuthState;
use state::ReceiveError;

/// What happened to an operation that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Skipped(Skip),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }
}

/// A prerequisite that was missing, so nothing was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    ConfigurationMissing,
    NoAuthorizationResponse,
    NoPendingAuthorization,
    NothingToExchange,
    NoRefreshToken,
    NoAccessToken,
    RevocationUnsupported,
    UserInfoUnsupported,
    RequestInFlight,
    AlreadySignedIn,
    SessionReset,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Skip::ConfigurationMissing => "service configuration has not been fetched",
            Skip::NoAuthorizationResponse => "no authorization response in the request",
            Skip::NoPendingAuthorization => "no authorization request is pending",
            Skip::NothingToExchange => "no authorization code or token to exchange",
            Skip::NoRefreshToken => "no refresh token is held",
            Skip::NoAccessToken => "no access token is held",
            Skip::RevocationUnsupported => "the issuer has no revocation endpoint",
            Skip::UserInfoUnsupported => "the issuer has no userinfo endpoint",
            Skip::RequestInFlight => "another request is already in flight",
            Skip::AlreadySignedIn => "already signed in",
            Skip::SessionReset => "the session was reset while the request was in flight",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to fetch service configuration for {issuer}")]
    Discovery {
        issuer: String,
        #[source]
        source: ProtocolError,
    },

    #[error("authorization denied: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("authorization response does not match the pending request")]
    StateMismatch,

    #[error("token request failed")]
    TokenRequest(#[source] ProtocolError),

    #[error("token revocation failed")]
    Revocation(#[source] ProtocolError),

    #[error("userinfo request failed")]
    UserInfo(#[source] ProtocolError),

    #[error("could not build authorization URL")]
    AuthorizationUrl(#[source] ProtocolError),
}

/// Snapshot of the session for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub configuration_loaded: bool,
    pub phase: &'static str,
    pub logged_in: bool,
    pub authorized: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// The held access token is past its `expires_in`
    pub expired: bool,
}

#[derive(Debug, Default)]
struct SessionInner {
    configuration: Option<ServiceConfiguration>,
    auth: AuthState,
    /// Bumped whenever a request goes in flight or the session is reset, so a
    /// late response can tell whether the state it started from is still there
    epoch: u64,
}

pub struct Session<S: AuthorizationServer = HttpAuthorizationServer> {
    config: OidcConfig,
    server: S,
    inner: Mutex<SessionInner>,
}

impl Session<HttpAuthorizationServer> {
    pub fn from_config(config: OidcConfig) -> Result<Self, ProtocolError> {
        let server = HttpAuthorizationServer::new(config.http_timeout)?;
        Ok(Self::new(config, server))
    }
}

impl<S: AuthorizationServer> Session<S> {
    pub fn new(config: OidcConfig, server: S) -> Self {
        Self {
            config,
            server,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn configuration(&self) -> Option<ServiceConfiguration> {
        self.lock().configuration.clone()
    }

    pub fn auth_state(&self) -> AuthState {
        self.lock().auth.clone()
    }

    /// Download the issuer's discovery document and cache it.
    ///
    /// On failure the previously cached document, if any, stays in place.
    #[instrument(skip(self), fields(issuer = %self.config.issuer), err)]
    pub async fn fetch_configuration(&self) -> Result<ServiceConfiguration, SessionError> {
        let configuration = self
            .server
            .fetch_configuration(&self.config.issuer)
            .await
            .map_err(|source| SessionError::Discovery {
                issuer: self.config.issuer.clone(),
                source,
            })?;

        debug!(
            authorization_endpoint = %configuration.authorization_endpoint,
            token_endpoint = %configuration.token_endpoint,
            "Fetched service configuration"
        );
        self.lock().configuration = Some(configuration.clone());
        Ok(configuration)
    }

    /// Start a new authorization request and return the URL to send the
    /// browser to.
    #[instrument(skip(self))]
    pub fn begin_authorization(
        &self,
        identity_hint: Option<&str>,
    ) -> Result<Outcome<Url>, SessionError> {
        let mut inner = self.lock();
        let Some(configuration) = inner.configuration.as_ref() else {
            warn!("Not starting authorization: {}", Skip::ConfigurationMissing);
            return Ok(Outcome::Skipped(Skip::ConfigurationMissing));
        };

        let request = AuthorizationRequest::new(&self.config, identity_hint);
        let url = request
            .authorization_url(configuration)
            .map_err(SessionError::AuthorizationUrl)?;

        match mem::take(&mut inner.auth).begin_authorization(request) {
            Ok(next) => {
                inner.auth = next;
                info!(%url, "Authorization request started");
                Ok(Outcome::Completed(url))
            }
            Err((unchanged, skip)) => {
                inner.auth = unchanged;
                warn!("Not starting authorization: {skip}");
                Ok(Outcome::Skipped(skip))
            }
        }
    }

    /// Take the code from a redirect, if this request carries one.
    ///
    /// Safe to call on every page load.
    #[instrument(skip_all)]
    pub fn complete_authorization_if_present(
        &self,
        params: &CallbackParams,
    ) -> Result<Outcome<()>, SessionError> {
        let Some(response) = params.authorization_response() else {
            return Ok(Outcome::Skipped(Skip::NoAuthorizationResponse));
        };

        let mut inner = self.lock();
        let current = mem::take(&mut inner.auth);

        let result = match &response {
            AuthorizationResponse::Code { code, state } => {
                current.receive_code(code.clone(), state.as_deref())
            }
            AuthorizationResponse::Error { state, .. } => current.deny(state.as_deref()),
        };

        match result {
            Ok(next) => {
                inner.auth = next;
                match response {
                    AuthorizationResponse::Code { .. } => {
                        info!("Authorization code received");
                        Ok(Outcome::Completed(()))
                    }
                    AuthorizationResponse::Error {
                        error, description, ..
                    } => {
                        warn!(%error, ?description, "Authorization denied");
                        Err(SessionError::AuthorizationDenied { error, description })
                    }
                }
            }
            Err((unchanged, ReceiveError::NotPending)) => {
                inner.auth = unchanged;
                warn!("Ignoring authorization response: {}", Skip::NoPendingAuthorization);
                Ok(Outcome::Skipped(Skip::NoPendingAuthorization))
            }
            Err((unchanged, ReceiveError::StateMismatch)) => {
                inner.auth = unchanged;
                error!("Authorization response state does not match the pending request");
                Err(SessionError::StateMismatch)
            }
        }
    }

    /// True only while a code is held that has not been exchanged yet
    pub fn is_authorized_user(&self) -> bool {
        self.lock().auth.pending_code().is_some()
    }

    /// Exchange a held code for tokens, or refresh held tokens.
    #[instrument(skip(self), err)]
    pub async fn request_token(&self) -> Result<Outcome<GrantType>, SessionError> {
        let (configuration, grant, guard) = {
            let mut inner = self.lock();
            let Some(configuration) = inner.configuration.clone() else {
                warn!("Not requesting token: {}", Skip::ConfigurationMissing);
                return Ok(Outcome::Skipped(Skip::ConfigurationMissing));
            };

            match mem::take(&mut inner.auth).start_token_request() {
                Ok((next, grant)) => {
                    inner.auth = next;
                    let guard = InFlight::start(&self.inner, &mut inner);
                    (configuration, grant, guard)
                }
                Err((unchanged, skip)) => {
                    inner.auth = unchanged;
                    warn!("Not requesting token: {skip}");
                    return Ok(Outcome::Skipped(skip));
                }
            }
        };

        let grant_type = grant.grant_type();
        let request = TokenRequest {
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            redirect_uri: self.config.redirect_uri.clone(),
            grant,
        };

        let response = self
            .server
            .perform_token_request(&configuration, &request)
            .await
            .map_err(SessionError::TokenRequest)?;

        info!(
            %grant_type,
            access_token = %mask_token(&response.access_token),
            expires_in = ?response.expires_in,
            "Token response received"
        );
        if !guard.settle(|auth| auth.finish_token_request(response)) {
            return Ok(Outcome::Skipped(Skip::SessionReset));
        }

        Ok(Outcome::Completed(grant_type))
    }

    /// True when a token with a non-empty access token is held. Expiry is
    /// not checked.
    pub fn has_valid_token(&self) -> bool {
        self.lock()
            .auth
            .token()
            .is_some_and(|token| token.has_access_token())
    }

    /// Revoke the access token at the issuer and forget it locally.
    ///
    /// The token is only cleared once the issuer has accepted the revocation;
    /// a failed revocation leaves the session signed in.
    #[instrument(skip(self), err)]
    pub async fn sign_out(&self) -> Result<Outcome<()>, SessionError> {
        let (configuration, access_token, guard) = {
            let mut inner = self.lock();
            let Some(configuration) = inner.configuration.clone() else {
                warn!("Not signing out: {}", Skip::ConfigurationMissing);
                return Ok(Outcome::Skipped(Skip::ConfigurationMissing));
            };

            match mem::take(&mut inner.auth).start_sign_out() {
                Ok((next, _)) if configuration.revocation_endpoint.is_none() => {
                    inner.auth = next.abort();
                    warn!("Not signing out: {}", Skip::RevocationUnsupported);
                    return Ok(Outcome::Skipped(Skip::RevocationUnsupported));
                }
                Ok((next, access_token)) => {
                    inner.auth = next;
                    let guard = InFlight::start(&self.inner, &mut inner);
                    (configuration, access_token, guard)
                }
                Err((unchanged, skip)) => {
                    inner.auth = unchanged;
                    warn!("Not signing out: {skip}");
                    return Ok(Outcome::Skipped(skip));
                }
            }
        };

        let request = RevokeTokenRequest::access_token(
            &self.config.client_id,
            self.config.client_secret.as_deref(),
            &access_token,
        );
        self.server
            .perform_revoke_token_request(&configuration, &request)
            .await
            .map_err(SessionError::Revocation)?;

        info!(access_token = %mask_token(&access_token), "Token revoked");
        if !guard.settle(AuthState::finish_sign_out) {
            return Ok(Outcome::Skipped(Skip::SessionReset));
        }

        Ok(Outcome::Completed(()))
    }

    /// Drop all local session state without contacting the issuer.
    ///
    /// Cached discovery metadata is kept. A request still in flight will find
    /// the session reset when it returns and leave it that way.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.auth = AuthState::Unauthenticated;
        info!("Session disposed");
    }

    /// Fetch the standard claims for the signed-in user
    #[instrument(skip(self), err)]
    pub async fn user_info(&self) -> Result<Outcome<UserInfo>, SessionError> {
        let (configuration, access_token) = {
            let inner = self.lock();
            let Some(configuration) = inner.configuration.clone() else {
                return Ok(Outcome::Skipped(Skip::ConfigurationMissing));
            };
            if configuration.userinfo_endpoint.is_none() {
                return Ok(Outcome::Skipped(Skip::UserInfoUnsupported));
            }
            match inner.auth.token().filter(|token| token.has_access_token()) {
                Some(token) => (configuration, token.access_token.clone()),
                None => return Ok(Outcome::Skipped(Skip::NoAccessToken)),
            }
        };

        let info = self
            .server
            .fetch_user_info(&configuration, &access_token)
            .await
            .map_err(SessionError::UserInfo)?;

        debug!(sub = %info.sub, "Fetched user info");
        Ok(Outcome::Completed(info))
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.lock();
        let token = inner.auth.token();
        let expires_at = token
            .and_then(|token| token.expires_at())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let expired = token.is_some_and(|token| token.is_expired_at(Utc::now().timestamp()));

        SessionStatus {
            configuration_loaded: inner.configuration.is_some(),
            phase: inner.auth.phase(),
            logged_in: token.is_some_and(|token| token.has_access_token()),
            authorized: inner.auth.pending_code().is_some(),
            expires_at,
            expired,
        }
    }
}

/// Rolls an in-flight state back unless the request settles it first.
///
/// Both the rollback and the settle only apply if nothing else has touched
/// the session since the request went out.
struct InFlight<'a> {
    inner: &'a Mutex<SessionInner>,
    epoch: u64,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn start(inner: &'a Mutex<SessionInner>, locked: &mut SessionInner) -> Self {
        locked.epoch = locked.epoch.wrapping_add(1);
        Self {
            inner,
            epoch: locked.epoch,
            armed: true,
        }
    }

    /// Apply the response to the session. Returns false if the session was
    /// reset while the request was out and the response was dropped.
    fn settle(mut self, finish: impl FnOnce(AuthState) -> Result<AuthState, AuthState>) -> bool {
        self.armed = false;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.epoch != self.epoch {
            warn!("Session changed while the request was in flight, discarding response");
            return false;
        }

        match finish(mem::take(&mut inner.auth)) {
            Ok(next) => inner.auth = next,
            Err(unchanged) => {
                warn!(phase = unchanged.phase(), "Response did not match session phase");
                inner.auth = unchanged;
            }
        }
        true
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.epoch == self.epoch {
            let restored = mem::take(&mut inner.auth).abort();
            debug!(phase = restored.phase(), "Request did not complete, state restored");
            inner.auth = restored;
        }
    }
}
