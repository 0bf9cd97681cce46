use reqwest::StatusCode;
use serde::Deserialize;

/// Failures talking to the authorization server
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authorization server returned {error} ({status}){}", describe(.description))]
    OAuth {
        status: StatusCode,
        error: String,
        description: Option<String>,
    },

    #[error("authorization server returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("service configuration has no {0}")]
    MissingEndpoint(&'static str),
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

/// RFC 6749 section 5.2 error body
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

impl ProtocolError {
    /// Build an error from a non-success response, preferring the structured
    /// OAuth error body when the server sent one.
    pub(crate) fn from_response_body(status: StatusCode, body: String) -> Self {
        match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(parsed) => ProtocolError::OAuth {
                status,
                error: parsed.error,
                description: parsed.error_description,
            },
            Err(_) => ProtocolError::UnexpectedStatus { status, body },
        }
    }
}
