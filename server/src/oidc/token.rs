use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => GRANT_TYPE_AUTHORIZATION_CODE,
            GrantType::RefreshToken => GRANT_TYPE_REFRESH_TOKEN,
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode {
        code: String,
        code_verifier: Option<String>,
    },
    RefreshToken {
        refresh_token: String,
    },
}

impl Grant {
    pub fn grant_type(&self) -> GrantType {
        match self {
            Grant::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Grant::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

/// A request to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub grant: Grant,
}

impl TokenRequest {
    /// Form fields for an `application/x-www-form-urlencoded` body
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("grant_type", self.grant.grant_type().as_str().to_string()),
            ("client_id", self.client_id.clone()),
        ];

        match &self.grant {
            Grant::AuthorizationCode {
                code,
                code_verifier,
            } => {
                form.push(("code", code.clone()));
                form.push(("redirect_uri", self.redirect_uri.clone()));
                if let Some(verifier) = code_verifier {
                    form.push(("code_verifier", verifier.clone()));
                }
            }
            Grant::RefreshToken { refresh_token } => {
                form.push(("refresh_token", refresh_token.clone()));
            }
        }

        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        form
    }
}

/// RFC 7009 revocation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeTokenRequest {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub token: String,
    pub token_type_hint: Option<&'static str>,
}

impl RevokeTokenRequest {
    pub fn access_token(client_id: &str, client_secret: Option<&str>, token: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.map(str::to_string),
            token: token.to_string(),
            token_type_hint: Some("access_token"),
        }
    }

    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("token", self.token.clone()),
            ("client_id", self.client_id.clone()),
        ];
        if let Some(hint) = self.token_type_hint {
            form.push(("token_type_hint", hint.to_string()));
        }
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.clone()));
        }
        form
    }
}

/// Token endpoint response as it comes off the wire
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponseJson {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Tokens held by the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    /// Unix timestamp (seconds) at which the response was received
    pub issued_at: i64,
    /// Lifetime in seconds, if the server reported one
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    pub fn from_json(json: TokenResponseJson) -> Self {
        Self::from_json_at(json, Utc::now().timestamp())
    }

    pub fn from_json_at(json: TokenResponseJson, issued_at: i64) -> Self {
        Self {
            access_token: json.access_token,
            token_type: json.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: json.refresh_token,
            scope: json.scope,
            id_token: json.id_token,
            issued_at,
            expires_in: json.expires_in,
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Unix timestamp at which the access token expires
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_in
            .map(|secs| self.issued_at.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX)))
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }

    /// Fold a refresh response into the held tokens.
    ///
    /// Servers commonly omit `refresh_token` on refresh, so the held one is
    /// kept unless a rotated token comes back.
    pub fn merge_refresh(&mut self, fresh: TokenResponse) {
        self.access_token = fresh.access_token;
        self.issued_at = fresh.issued_at;
        self.expires_in = fresh.expires_in;
        self.token_type = fresh.token_type;
        self.scope = fresh.scope;
        if fresh.id_token.is_some() {
            self.id_token = fresh.id_token;
        }
        if let Some(rotated) = fresh.refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(rotated);
        }
    }
}

/// Masked form of a token for log lines
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    format!("{}...", token.chars().take(8).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(access: &str, refresh: Option<&str>, issued_at: i64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: refresh.map(str::to_string),
            scope: Some("openid".to_string()),
            id_token: Some("id-1".to_string()),
            issued_at,
            expires_in: Some(3600),
        }
    }

    #[test]
    fn test_merge_refresh_keeps_refresh_token_when_omitted() {
        let mut held = token("access-1", Some("refresh-1"), 100);
        let fresh = TokenResponse {
            access_token: "access-2".to_string(),
            token_type: "bearer".to_string(),
            refresh_token: None,
            scope: Some("openid email".to_string()),
            id_token: None,
            issued_at: 200,
            expires_in: Some(1800),
        };

        held.merge_refresh(fresh);

        assert_eq!(held.access_token, "access-2");
        assert_eq!(held.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(held.issued_at, 200);
        assert_eq!(held.expires_in, Some(1800));
        assert_eq!(held.token_type, "bearer");
        assert_eq!(held.scope.as_deref(), Some("openid email"));
        assert_eq!(held.id_token.as_deref(), Some("id-1"));
    }

    #[test]
    fn test_merge_refresh_adopts_rotated_refresh_token() {
        let mut held = token("access-1", Some("refresh-1"), 100);
        held.merge_refresh(token("access-2", Some("refresh-2"), 200));
        assert_eq!(held.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[test]
    fn test_code_grant_form_includes_verifier() {
        let request = TokenRequest {
            client_id: "client".to_string(),
            client_secret: None,
            redirect_uri: "http://localhost:8000/app/redirect.html".to_string(),
            grant: Grant::AuthorizationCode {
                code: "abc".to_string(),
                code_verifier: Some("verifier".to_string()),
            },
        };

        let form = request.to_form();
        assert!(form.contains(&("grant_type", "authorization_code".to_string())));
        assert!(form.contains(&("code", "abc".to_string())));
        assert!(form.contains(&("code_verifier", "verifier".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "refresh_token"));
        assert!(!form.iter().any(|(k, _)| *k == "client_secret"));
    }

    #[test]
    fn test_refresh_grant_form_has_no_code() {
        let request = TokenRequest {
            client_id: "client".to_string(),
            client_secret: Some("secret".to_string()),
            redirect_uri: "http://localhost:8000/app/redirect.html".to_string(),
            grant: Grant::RefreshToken {
                refresh_token: "refresh-1".to_string(),
            },
        };

        let form = request.to_form();
        assert!(form.contains(&("grant_type", "refresh_token".to_string())));
        assert!(form.contains(&("refresh_token", "refresh-1".to_string())));
        assert!(form.contains(&("client_secret", "secret".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "code" || *k == "code_verifier"));
    }

    #[test]
    fn test_wire_response_gets_defaults() {
        let json: TokenResponseJson =
            serde_json::from_str(r#"{"access_token":"ya29.abc"}"#).unwrap();
        let token = TokenResponse::from_json_at(json, 1_700_000_000);

        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.issued_at, 1_700_000_000);
        assert_eq!(token.expires_at(), None);
        assert!(!token.is_expired_at(i64::MAX));
        assert!(!token.has_refresh_token());
    }

    #[test]
    fn test_expiry() {
        let token = token("a", None, 1_000);
        assert_eq!(token.expires_at(), Some(4_600));
        assert!(!token.is_expired_at(4_599));
        assert!(token.is_expired_at(4_600));
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("ya29.a0AfH6SMBx-long-token"), "ya29.a0A...");
        assert_eq!(mask_token("short"), "***");
    }
}
