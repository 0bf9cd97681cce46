use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use super::{
    pkce::{random_state, PkceCodes, CODE_CHALLENGE_METHOD},
    ProtocolError, ServiceConfiguration,
};
use crate::config::OidcConfig;

pub const RESPONSE_TYPE_CODE: &str = "code";

/// An authorization request, kept around until the redirect comes back so the
/// response can be matched by `state` and the PKCE verifier recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub response_type: String,
    pub state: String,
    pub code_challenge: String,
    pub extras: BTreeMap<String, String>,
    code_verifier: String,
}

impl AuthorizationRequest {
    pub fn new(config: &OidcConfig, identity_hint: Option<&str>) -> Self {
        let pkce = PkceCodes::generate();

        let mut extras = BTreeMap::new();
        extras.insert("prompt".to_string(), "consent".to_string());
        extras.insert("access_type".to_string(), "offline".to_string());
        if let Some(hint) = identity_hint.map(str::trim).filter(|h| !h.is_empty()) {
            extras.insert("login_hint".to_string(), hint.to_string());
        }

        Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            response_type: RESPONSE_TYPE_CODE.to_string(),
            state: random_state(),
            code_challenge: pkce.challenge,
            extras,
            code_verifier: pkce.verifier,
        }
    }

    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// The URL the browser is sent to
    pub fn authorization_url(
        &self,
        configuration: &ServiceConfiguration,
    ) -> Result<Url, ProtocolError> {
        let mut url = configuration.authorization_endpoint()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", &self.response_type)
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("scope", &self.scope)
                .append_pair("state", &self.state)
                .append_pair("code_challenge", &self.code_challenge)
                .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
            for (key, value) in &self.extras {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Query parameters delivered to the redirect URI
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// What the issuer said about an authorization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResponse {
    Code {
        code: String,
        state: Option<String>,
    },
    Error {
        error: String,
        description: Option<String>,
        state: Option<String>,
    },
}

impl CallbackParams {
    /// `None` when this page load is not an authorization redirect at all
    pub fn authorization_response(&self) -> Option<AuthorizationResponse> {
        if let Some(error) = &self.error {
            return Some(AuthorizationResponse::Error {
                error: error.clone(),
                description: self.error_description.clone(),
                state: self.state.clone(),
            });
        }

        self.code
            .as_ref()
            .filter(|code| !code.is_empty())
            .map(|code| AuthorizationResponse::Code {
                code: code.clone(),
                state: self.state.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn configuration() -> ServiceConfiguration {
        ServiceConfiguration {
            issuer: Some("https://issuer.test".to_string()),
            authorization_endpoint: "https://issuer.test/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://issuer.test/token".to_string(),
            revocation_endpoint: None,
            userinfo_endpoint: None,
            end_session_endpoint: None,
        }
    }

    #[test]
    fn test_authorization_url_carries_flow_parameters() {
        let request = AuthorizationRequest::new(&OidcConfig::default(), Some("alice@example.com"));
        let url = request.authorization_url(&configuration()).unwrap();

        assert!(url
            .as_str()
            .starts_with("https://issuer.test/o/oauth2/v2/auth?"));

        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let config = OidcConfig::default();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], config.client_id);
        assert_eq!(query["redirect_uri"], config.redirect_uri);
        assert_eq!(query["scope"], "openid");
        assert_eq!(query["state"], request.state);
        assert_eq!(query["code_challenge"], request.code_challenge);
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["prompt"], "consent");
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["login_hint"], "alice@example.com");
        assert!(!query.contains_key("code_verifier"));
    }

    #[test]
    fn test_blank_identity_hint_is_dropped() {
        let request = AuthorizationRequest::new(&OidcConfig::default(), Some("   "));
        assert!(!request.extras.contains_key("login_hint"));
    }

    #[test]
    fn test_challenge_is_derived_from_verifier() {
        let request = AuthorizationRequest::new(&OidcConfig::default(), None);
        assert_eq!(
            super::super::pkce::challenge_for(request.code_verifier()),
            request.code_challenge
        );
    }

    #[test]
    fn test_callback_without_code_or_error_is_not_a_response() {
        let params = CallbackParams {
            state: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(params.authorization_response(), None);
    }

    #[test]
    fn test_error_takes_precedence_over_code() {
        let params = CallbackParams {
            code: Some("code".to_string()),
            state: Some("abc".to_string()),
            error: Some("access_denied".to_string()),
            error_description: None,
        };

        assert_eq!(
            params.authorization_response(),
            Some(AuthorizationResponse::Error {
                error: "access_denied".to_string(),
                description: None,
                state: Some("abc".to_string()),
            })
        );
    }
}
