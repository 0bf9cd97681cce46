use serde::{Deserialize, Serialize};
use url::Url;

use super::ProtocolError;

/// Path of the OpenID Provider metadata document, relative to the issuer
pub const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

/// The subset of OpenID Provider metadata this app cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    #[serde(default)]
    pub issuer: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

impl ServiceConfiguration {
    pub fn authorization_endpoint(&self) -> Result<Url, ProtocolError> {
        Ok(Url::parse(&self.authorization_endpoint)?)
    }

    pub fn revocation_endpoint(&self) -> Result<Url, ProtocolError> {
        let endpoint = self
            .revocation_endpoint
            .as_deref()
            .ok_or(ProtocolError::MissingEndpoint("revocation_endpoint"))?;
        Ok(Url::parse(endpoint)?)
    }

    pub fn userinfo_endpoint(&self) -> Result<Url, ProtocolError> {
        let endpoint = self
            .userinfo_endpoint
            .as_deref()
            .ok_or(ProtocolError::MissingEndpoint("userinfo_endpoint"))?;
        Ok(Url::parse(endpoint)?)
    }
}

/// Resolve the discovery document URL for an issuer.
///
/// Issuers may or may not carry a trailing slash or a path component
/// (`https://example.com/realms/demo`), so the well-known suffix is appended
/// to the issuer path rather than resolved against it.
pub fn discovery_url(issuer: &str) -> Result<Url, ProtocolError> {
    let base = format!("{}/", issuer.trim_end_matches('/'));
    Ok(Url::parse(&base)?.join(DISCOVERY_PATH)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_url_for_bare_issuer() {
        let url = discovery_url("https://accounts.google.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://accounts.google.com/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_discovery_url_keeps_issuer_path() {
        let url = discovery_url("https://sso.example.com/realms/demo/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sso.example.com/realms/demo/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_optional_endpoints_default_to_none() {
        let config: ServiceConfiguration = serde_json::from_str(
            r#"{
                "authorization_endpoint": "https://issuer.test/authorize",
                "token_endpoint": "https://issuer.test/token",
                "jwks_uri": "https://issuer.test/jwks"
            }"#,
        )
        .unwrap();

        assert_eq!(config.revocation_endpoint, None);
        assert!(matches!(
            config.revocation_endpoint(),
            Err(ProtocolError::MissingEndpoint("revocation_endpoint"))
        ));
    }
}
