use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::{
    discovery::discovery_url, ProtocolError, RevokeTokenRequest, ServiceConfiguration,
    TokenRequest, TokenResponse, TokenResponseJson,
};

/// Standard claims returned by the userinfo endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserInfo {
    /// Best label for the signed-in user
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

/// The network side of the OIDC flow.
///
/// `Session` only ever talks to the issuer through this trait, which keeps the
/// state machine testable without a server.
#[async_trait]
pub trait AuthorizationServer: Send + Sync + 'static {
    async fn fetch_configuration(&self, issuer: &str)
        -> Result<ServiceConfiguration, ProtocolError>;

    async fn perform_token_request(
        &self,
        configuration: &ServiceConfiguration,
        request: &TokenRequest,
    ) -> Result<TokenResponse, ProtocolError>;

    async fn perform_revoke_token_request(
        &self,
        configuration: &ServiceConfiguration,
        request: &RevokeTokenRequest,
    ) -> Result<(), ProtocolError>;

    async fn fetch_user_info(
        &self,
        configuration: &ServiceConfiguration,
        access_token: &str,
    ) -> Result<UserInfo, ProtocolError>;
}

/// `AuthorizationServer` over HTTPS
#[derive(Debug, Clone)]
pub struct HttpAuthorizationServer {
    http: reqwest::Client,
}

impl HttpAuthorizationServer {
    pub fn new(timeout: Duration) -> Result<Self, ProtocolError> {
        let http = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .use_rustls_tls()
            .build()?;

        Ok(Self { http })
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProtocolError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(ProtocolError::from_response_body(status, body))
    }
}

#[async_trait]
impl AuthorizationServer for HttpAuthorizationServer {
    #[instrument(skip(self), err)]
    async fn fetch_configuration(
        &self,
        issuer: &str,
    ) -> Result<ServiceConfiguration, ProtocolError> {
        let url = discovery_url(issuer)?;
        debug!(%url, "Fetching service configuration");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Self::read_json(response).await
    }

    #[instrument(skip_all, fields(grant_type = %request.grant.grant_type()), err)]
    async fn perform_token_request(
        &self,
        configuration: &ServiceConfiguration,
        request: &TokenRequest,
    ) -> Result<TokenResponse, ProtocolError> {
        let url = Url::parse(&configuration.token_endpoint)?;
        debug!(%url, "Sending token request");

        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .form(&request.to_form())
            .send()
            .await?;

        let json: TokenResponseJson = Self::read_json(response).await?;
        Ok(TokenResponse::from_json(json))
    }

    #[instrument(skip_all, err)]
    async fn perform_revoke_token_request(
        &self,
        configuration: &ServiceConfiguration,
        request: &RevokeTokenRequest,
    ) -> Result<(), ProtocolError> {
        let url = configuration.revocation_endpoint()?;
        debug!(%url, "Revoking token");

        let response = self.http.post(url).form(&request.to_form()).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProtocolError::from_response_body(status, body))
    }

    #[instrument(skip_all, err)]
    async fn fetch_user_info(
        &self,
        configuration: &ServiceConfiguration,
        access_token: &str,
    ) -> Result<UserInfo, ProtocolError> {
        let url = configuration.userinfo_endpoint()?;

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Self::read_json(response).await
    }
}
