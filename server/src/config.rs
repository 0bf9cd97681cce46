use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr};

/// Example OpenID Connect provider
pub const DEFAULT_ISSUER: &str = "https://accounts.google.com";

/// Example client registered for the local redirect below
pub const DEFAULT_CLIENT_ID: &str =
    "511828570984-7nmej36h9j2tebiqmpqh835naet4vci4.apps.googleusercontent.com";

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/app/redirect.html";
pub const DEFAULT_SCOPE: &str = "openid";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Where the app talks to and who it says it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub http_timeout: Duration,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl OidcConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let defaults = Self::default();

        let http_timeout = match env::var("OIDC_HTTP_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .wrap_err_with(|| format!("OIDC_HTTP_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            Err(_) => defaults.http_timeout,
        };

        Ok(Self {
            issuer: env::var("OIDC_ISSUER").unwrap_or(defaults.issuer),
            client_id: env::var("OIDC_CLIENT_ID").unwrap_or(defaults.client_id),
            client_secret: env::var("OIDC_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            redirect_uri: env::var("OIDC_REDIRECT_URI").unwrap_or(defaults.redirect_uri),
            scope: env::var("OIDC_SCOPE").unwrap_or(defaults.scope),
            http_timeout,
        })
    }

    /// Path component of the redirect URI, which the app must serve
    pub fn redirect_path(&self) -> color_eyre::Result<String> {
        let url = url::Url::parse(&self.redirect_uri)
            .wrap_err_with(|| format!("Invalid redirect URI: {}", self.redirect_uri))?;
        Ok(url.path().to_string())
    }
}

/// Listener settings for the web server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl ServerConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());

        Self::from_parts(&host, &port)
    }

    /// `host` is a bare IPv4 or IPv6 address; brackets around IPv6 are accepted
    pub fn from_parts(host: &str, port: &str) -> color_eyre::Result<Self> {
        let ip = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|e| eyre!("Invalid HOST {}: {}", host, e))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| eyre!("Invalid PORT {}: {}", port, e))?;

        Ok(Self {
            addr: SocketAddr::new(ip, port),
        })
    }
}
