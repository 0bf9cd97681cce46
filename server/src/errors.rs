use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use color_eyre::Report;

/// A failed request: the report that gets logged plus what the browser sees
#[derive(Debug)]
pub struct ServerError<R: IntoResponse>(pub(crate) Report, pub(crate) R);

pub type ServerResult<S, F = Response> = Result<S, ServerError<F>>;

fn is_dev_mode() -> bool {
    std::env::var("DEVELOPMENT_MODE")
        .map(|v| v == "1")
        .unwrap_or(false)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn dev_error_page(status: StatusCode, report: &Report) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Development Error - {code}</title>
    <style>
        body {{ font-family: monospace; margin: 20px; background: #1a1a1a; color: #fff; }}
        .error-container {{ background: #2d2d2d; padding: 20px; border-radius: 8px; }}
        .error-title {{ color: #ff6b6b; font-size: 24px; margin-bottom: 20px; }}
        .error-details {{ background: #000; padding: 15px; border-radius: 4px; overflow-x: auto; }}
        pre {{ margin: 0; white-space: pre-wrap; word-wrap: break-word; }}
    </style>
</head>
<body>
    <div class="error-container">
        <div class="error-title">Development Mode - {reason}</div>
        <div class="error-details">
            <pre>{details}</pre>
        </div>
    </div>
</body>
</html>"#,
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or("Error"),
        details = escape_html(&format!("{report:?}")),
    ))
}

impl<R: IntoResponse> IntoResponse for ServerError<R> {
    fn into_response(self) -> Response {
        let response = self.1.into_response();
        let status = response.status();

        if status.is_server_error() {
            tracing::error!(error = ?self.0, %status, "Request Error");
        } else {
            tracing::warn!(error = %self.0, %status, "Request rejected");
        }

        if is_dev_mode() && (status.is_client_error() || status.is_server_error()) {
            return (status, dev_error_page(status, &self.0)).into_response();
        }

        response
    }
}

impl<E> From<E> for ServerError<StatusCode>
where
    E: Into<Report>,
{
    fn from(err: E) -> Self {
        ServerError(err.into(), StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub(crate) trait WithStatus<T> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError<StatusCode>>;
}

impl<T, E: Into<Report>> WithStatus<T> for Result<T, E> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError<StatusCode>> {
        self.map_err(|err| ServerError(err.into(), status))
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;

    use super::*;

    #[test]
    fn test_with_status_keeps_status() {
        let result: Result<(), Report> = Err(eyre!("bad state"));
        let response = result
            .with_status(StatusCode::BAD_REQUEST)
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href='x'>"), "&lt;a href=&#39;x&#39;&gt;");
    }
}
