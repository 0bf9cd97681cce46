//! The session's authorization state as an explicit tagged union.
//!
//! Transitions are pure: they take the current state by value and hand back
//! the next one, so [`super::Session`] only has to swap the value under its
//! lock. Variants ending in `-ing` mark a network request in flight.

use crate::oidc::{AuthorizationRequest, Grant, TokenResponse};

use super::Skip;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    AuthorizationPending {
        request: AuthorizationRequest,
    },
    AuthorizationCodeReceived {
        code: String,
        request: AuthorizationRequest,
    },
    CodeExchanging {
        code: String,
        request: AuthorizationRequest,
    },
    TokenAcquired {
        token: TokenResponse,
    },
    TokenRefreshing {
        token: TokenResponse,
    },
    SigningOut {
        token: TokenResponse,
    },
}

/// Why an authorization response could not be taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveError {
    NotPending,
    StateMismatch,
}

impl AuthState {
    pub fn phase(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::AuthorizationPending { .. } => "authorization pending",
            AuthState::AuthorizationCodeReceived { .. } => "authorization code received",
            AuthState::CodeExchanging { .. } => "exchanging code",
            AuthState::TokenAcquired { .. } => "token acquired",
            AuthState::TokenRefreshing { .. } => "refreshing token",
            AuthState::SigningOut { .. } => "signing out",
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            AuthState::CodeExchanging { .. }
                | AuthState::TokenRefreshing { .. }
                | AuthState::SigningOut { .. }
        )
    }

    /// Tokens currently held, including while they are being refreshed or revoked
    pub fn token(&self) -> Option<&TokenResponse> {
        match self {
            AuthState::TokenAcquired { token }
            | AuthState::TokenRefreshing { token }
            | AuthState::SigningOut { token } => Some(token),
            _ => None,
        }
    }

    /// An authorization code that has not been exchanged yet
    pub fn pending_code(&self) -> Option<&str> {
        match self {
            AuthState::AuthorizationCodeReceived { code, .. }
            | AuthState::CodeExchanging { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn begin_authorization(self, request: AuthorizationRequest) -> Result<Self, (Self, Skip)> {
        match self {
            AuthState::Unauthenticated
            | AuthState::AuthorizationPending { .. }
            | AuthState::AuthorizationCodeReceived { .. } => {
                Ok(AuthState::AuthorizationPending { request })
            }
            AuthState::TokenAcquired { .. } => Err((self, Skip::AlreadySignedIn)),
            in_flight => Err((in_flight, Skip::RequestInFlight)),
        }
    }

    /// Capture the code from a redirect, checking it answers the pending request
    pub fn receive_code(self, code: String, state: Option<&str>) -> Result<Self, (Self, ReceiveError)> {
        match self {
            AuthState::AuthorizationPending { request } => {
                if state != Some(request.state.as_str()) {
                    return Err((
                        AuthState::AuthorizationPending { request },
                        ReceiveError::StateMismatch,
                    ));
                }
                Ok(AuthState::AuthorizationCodeReceived { code, request })
            }
            other => Err((other, ReceiveError::NotPending)),
        }
    }

    /// The issuer refused the pending request
    pub fn deny(self, state: Option<&str>) -> Result<Self, (Self, ReceiveError)> {
        match self {
            AuthState::AuthorizationPending { request } => {
                if state != Some(request.state.as_str()) {
                    return Err((
                        AuthState::AuthorizationPending { request },
                        ReceiveError::StateMismatch,
                    ));
                }
                Ok(AuthState::Unauthenticated)
            }
            other => Err((other, ReceiveError::NotPending)),
        }
    }

    /// Move into an in-flight state and say which grant to send.
    ///
    /// A held code always wins over held tokens, and a code is only ever
    /// handed out once.
    pub fn start_token_request(self) -> Result<(Self, Grant), (Self, Skip)> {
        match self {
            AuthState::AuthorizationCodeReceived { code, request } => {
                let grant = Grant::AuthorizationCode {
                    code: code.clone(),
                    code_verifier: Some(request.code_verifier().to_string()),
                };
                Ok((AuthState::CodeExchanging { code, request }, grant))
            }
            AuthState::TokenAcquired { token } => match token.refresh_token.clone() {
                Some(refresh_token) if !refresh_token.is_empty() => Ok((
                    AuthState::TokenRefreshing { token },
                    Grant::RefreshToken { refresh_token },
                )),
                _ => Err((AuthState::TokenAcquired { token }, Skip::NoRefreshToken)),
            },
            state if state.is_in_flight() => Err((state, Skip::RequestInFlight)),
            state => Err((state, Skip::NothingToExchange)),
        }
    }

    /// Apply a successful token response.
    ///
    /// Returns `Err(self)` unchanged if no token request is in flight, which
    /// happens when the session was disposed while the request was out.
    pub fn finish_token_request(self, response: TokenResponse) -> Result<Self, Self> {
        match self {
            AuthState::CodeExchanging { .. } => Ok(AuthState::TokenAcquired { token: response }),
            AuthState::TokenRefreshing { mut token } => {
                token.merge_refresh(response);
                Ok(AuthState::TokenAcquired { token })
            }
            other => Err(other),
        }
    }

    pub fn start_sign_out(self) -> Result<(Self, String), (Self, Skip)> {
        match self {
            AuthState::TokenAcquired { token } if token.has_access_token() => {
                let access_token = token.access_token.clone();
                Ok((AuthState::SigningOut { token }, access_token))
            }
            state if state.is_in_flight() => Err((state, Skip::RequestInFlight)),
            state => Err((state, Skip::NoAccessToken)),
        }
    }

    pub fn finish_sign_out(self) -> Result<Self, Self> {
        match self {
            AuthState::SigningOut { .. } => Ok(AuthState::Unauthenticated),
            other => Err(other),
        }
    }

    /// Roll an in-flight state back to where it started
    pub fn abort(self) -> Self {
        match self {
            AuthState::CodeExchanging { code, request } => {
                AuthState::AuthorizationCodeReceived { code, request }
            }
            AuthState::TokenRefreshing { token } | AuthState::SigningOut { token } => {
                AuthState::TokenAcquired { token }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OidcConfig;

    fn request() -> AuthorizationRequest {
        AuthorizationRequest::new(&OidcConfig::default(), None)
    }

    fn token(refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "access-1".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: refresh.map(str::to_string),
            scope: Some("openid".to_string()),
            id_token: None,
            issued_at: 1_000,
            expires_in: Some(3600),
        }
    }

    #[test]
    fn test_code_is_only_accepted_for_matching_state() {
        let request = request();
        let pending = AuthState::AuthorizationPending {
            request: request.clone(),
        };

        let (unchanged, err) = pending
            .clone()
            .receive_code("code".to_string(), Some("forged"))
            .unwrap_err();
        assert_eq!(err, ReceiveError::StateMismatch);
        assert_eq!(unchanged, pending);

        let received = pending
            .receive_code("code".to_string(), Some(&request.state))
            .unwrap();
        assert_eq!(received.pending_code(), Some("code"));
    }

    #[test]
    fn test_code_without_pending_request_is_rejected() {
        let (state, err) = AuthState::Unauthenticated
            .receive_code("code".to_string(), Some("s"))
            .unwrap_err();
        assert_eq!(err, ReceiveError::NotPending);
        assert_eq!(state, AuthState::Unauthenticated);
    }

    #[test]
    fn test_code_exchange_carries_pkce_verifier() {
        let request = request();
        let state = AuthState::AuthorizationCodeReceived {
            code: "code".to_string(),
            request: request.clone(),
        };

        let (in_flight, grant) = state.start_token_request().unwrap();
        assert!(matches!(in_flight, AuthState::CodeExchanging { .. }));
        assert_eq!(
            grant,
            Grant::AuthorizationCode {
                code: "code".to_string(),
                code_verifier: Some(request.code_verifier().to_string()),
            }
        );
    }

    #[test]
    fn test_refresh_requires_refresh_token() {
        let (state, skip) = AuthState::TokenAcquired { token: token(None) }
            .start_token_request()
            .unwrap_err();
        assert_eq!(skip, Skip::NoRefreshToken);
        assert!(matches!(state, AuthState::TokenAcquired { .. }));
    }

    #[test]
    fn test_in_flight_blocks_second_request() {
        let (in_flight, _) = AuthState::TokenAcquired {
            token: token(Some("refresh-1")),
        }
        .start_token_request()
        .unwrap();

        let (state, skip) = in_flight.clone().start_token_request().unwrap_err();
        assert_eq!(skip, Skip::RequestInFlight);
        assert_eq!(state, in_flight);

        let (_, skip) = in_flight.start_sign_out().unwrap_err();
        assert_eq!(skip, Skip::RequestInFlight);
    }

    #[test]
    fn test_abort_restores_previous_state() {
        let request = request();
        let received = AuthState::AuthorizationCodeReceived {
            code: "code".to_string(),
            request,
        };
        let (in_flight, _) = received.clone().start_token_request().unwrap();
        assert_eq!(in_flight.abort(), received);

        let acquired = AuthState::TokenAcquired {
            token: token(Some("refresh-1")),
        };
        let (signing_out, _) = acquired.clone().start_sign_out().unwrap();
        assert_eq!(signing_out.abort(), acquired);
    }

    #[test]
    fn test_finish_without_request_in_flight_is_refused() {
        let state = AuthState::Unauthenticated;
        assert_eq!(
            state.finish_token_request(token(None)).unwrap_err(),
            AuthState::Unauthenticated
        );
    }

    #[test]
    fn test_signed_in_user_cannot_restart_authorization() {
        let acquired = AuthState::TokenAcquired {
            token: token(Some("r")),
        };
        let (state, skip) = acquired.clone().begin_authorization(request()).unwrap_err();
        assert_eq!(skip, Skip::AlreadySignedIn);
        assert_eq!(state, acquired);
    }

    #[test]
    fn test_denial_resets_to_unauthenticated() {
        let request = request();
        let state = AuthState::AuthorizationPending {
            request: request.clone(),
        };
        assert_eq!(
            state.deny(Some(&request.state)).unwrap(),
            AuthState::Unauthenticated
        );
    }
}
