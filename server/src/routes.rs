use std::error::Error as StdError;

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use color_eyre::eyre::eyre;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    components::{
        form::{ActionForm, InputField},
        layout::{Card, ContentSection, Page},
        status::StatusPanel,
        ui::{button::Button, heading::Heading, notice::NoticeBanner},
    },
    errors::{ServerResult, WithStatus},
    oidc::{CallbackParams, GrantType},
    session::{Outcome, SessionError, Skip},
    state::{AppState, Notice},
};

/// Build the application router. The callback is served on the path of the
/// configured redirect URI.
pub fn routes(app_state: AppState) -> color_eyre::Result<axum::Router> {
    let redirect_path = app_state.session.config().redirect_path()?;
    if redirect_path == "/" || !redirect_path.starts_with('/') {
        return Err(eyre!(
            "Redirect URI path {redirect_path:?} would shadow the home page"
        ));
    }

    Ok(axum::Router::new()
        .route("/", get(root_page))
        .route("/login", post(login))
        .route(&redirect_path, get(authorization_callback))
        .route("/token", post(get_token))
        .route("/check", post(check_token))
        .route("/logout", post(logout))
        .route("/forget", post(forget))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state))
}

/// Flatten an error and its sources into one line for the page
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

fn back_home() -> Redirect {
    Redirect::to("/")
}

async fn root_page(State(state): State<AppState>) -> Page {
    let status = state.session.status();
    let logged_in = status.logged_in;
    let (display_name, notice) = {
        let mut view = state.view();
        (view.display_name.clone(), view.take_notice())
    };

    let controls = maud::html! {
        div class="space-y-3" {
            @if logged_in {
                div class="grid grid-cols-2 gap-3" {
                    (ActionForm::new("/token", Button::primary("Get Token").icon("fa-solid fa-rotate").full_width(true)))
                    (ActionForm::new("/check", Button::secondary("Check Token").icon("fa-solid fa-magnifying-glass").full_width(true)))
                }
                (ActionForm::new("/logout", Button::danger("Logout").icon("fa-solid fa-right-from-bracket").full_width(true)))
            } @else {
                (ActionForm::new("/login", Button::primary("Login").icon("fa-solid fa-right-to-bracket").full_width(true))
                    .field(
                        InputField::new("identity_hint")
                            .label("Account (optional)")
                            .input_type("email")
                            .placeholder("you@example.com"),
                    ))
                div class="grid grid-cols-2 gap-3" {
                    (ActionForm::new("/token", Button::secondary("Get Token").icon("fa-solid fa-key").full_width(true)))
                    (ActionForm::new("/check", Button::secondary("Check Token").icon("fa-solid fa-magnifying-glass").full_width(true)))
                }
            }
        }
    };

    let content = maud::html! {
        (ContentSection::new(maud::html! {
            (Heading::h1("OIDC Demo").with_color("text-indigo-700"))
            p class="text-sm text-gray-500 mb-4" { "Issuer: " code { (state.session.config().issuer) } }

            @if let Some(notice) = &notice {
                (NoticeBanner(notice))
            }

            (Heading::h2("Session"))
            (StatusPanel {
                status: &status,
                display_name: display_name.as_deref().filter(|_| logged_in),
            })
        }))
        (ContentSection::new(controls).divided())
        (ContentSection::new(
            ActionForm::new("/forget", Button::secondary("Forget Session").icon("fa-solid fa-eraser").full_width(true))
        ).divided())
    };

    Page::new(
        "OIDC Demo",
        Card::new(content).with_max_width("max-w-lg"),
    )
    .version(state.version())
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    identity_hint: Option<String>,
}

/// Refresh discovery metadata. A failure is logged and handed back so the
/// caller can report it if nothing was cached to fall back on.
async fn refresh_configuration(state: &AppState) -> Option<SessionError> {
    match state.session.fetch_configuration().await {
        Ok(_) => None,
        Err(err) => {
            warn!(error = %describe(&err), "Discovery failed, using cached configuration if any");
            Some(err)
        }
    }
}

fn skipped_notice(action: &str, skip: Skip, discovery_error: Option<SessionError>) -> Notice {
    match discovery_error {
        Some(err) if skip == Skip::ConfigurationMissing => Notice::error(describe(&err)),
        _ => Notice::warning(format!("{action}: {skip}")),
    }
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let discovery_error = refresh_configuration(&state).await;

    match state
        .session
        .begin_authorization(form.identity_hint.as_deref())
    {
        Ok(Outcome::Completed(url)) => {
            info!(%url, "Redirecting to issuer");
            Redirect::to(url.as_str()).into_response()
        }
        Ok(Outcome::Skipped(skip)) => {
            state.settle_view(skipped_notice("Login not started", skip, discovery_error));
            back_home().into_response()
        }
        Err(err) => {
            state.settle_view(Notice::error(describe(&err)));
            back_home().into_response()
        }
    }
}

/// Fetch the user's name for the page, if the issuer offers userinfo
async fn load_display_name(state: &AppState) {
    match state.session.user_info().await {
        Ok(Outcome::Completed(info)) => {
            state.view().display_name = Some(info.display_name().to_string());
        }
        Ok(Outcome::Skipped(skip)) => {
            info!("Not loading user info: {skip}");
        }
        Err(err) => {
            warn!(error = %describe(&err), "Failed to load user info");
        }
    }
}

fn token_notice(
    result: Result<Outcome<GrantType>, SessionError>,
    discovery_error: Option<SessionError>,
) -> Notice {
    match result {
        Ok(Outcome::Completed(GrantType::AuthorizationCode)) => {
            Notice::success("Signed in: authorization code exchanged for tokens")
        }
        Ok(Outcome::Completed(GrantType::RefreshToken)) => {
            Notice::success("Access token refreshed")
        }
        Ok(Outcome::Skipped(skip)) => skipped_notice("No token request sent", skip, discovery_error),
        Err(err) => Notice::error(describe(&err)),
    }
}

async fn authorization_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ServerResult<Redirect, StatusCode> {
    let notice = match state.session.complete_authorization_if_present(&params) {
        Ok(Outcome::Completed(())) => {
            let result = state.session.request_token().await;
            if matches!(result, Ok(Outcome::Completed(_))) {
                load_display_name(&state).await;
            }
            token_notice(result, None)
        }
        Ok(Outcome::Skipped(skip)) => Notice::info(format!("Nothing to do: {skip}")),
        Err(SessionError::StateMismatch) => {
            state.settle_view(Notice::error(SessionError::StateMismatch.to_string()));
            return Err::<Redirect, _>(SessionError::StateMismatch).with_status(StatusCode::BAD_REQUEST);
        }
        Err(err) => Notice::error(describe(&err)),
    };

    state.settle_view(notice);
    Ok(back_home())
}

async fn get_token(State(state): State<AppState>) -> Redirect {
    let discovery_error = refresh_configuration(&state).await;

    let result = state.session.request_token().await;
    let needs_name = state.view().display_name.is_none();
    if needs_name && matches!(result, Ok(Outcome::Completed(_))) {
        load_display_name(&state).await;
    }

    state.settle_view(token_notice(result, discovery_error));
    back_home()
}

async fn check_token(State(state): State<AppState>) -> Redirect {
    let notice = if state.session.has_valid_token() {
        Notice::success("An access token is held")
    } else {
        Notice::warning("No access token is held")
    };

    state.settle_view(notice);
    back_home()
}

async fn logout(State(state): State<AppState>) -> Redirect {
    let notice = match state.session.sign_out().await {
        Ok(Outcome::Completed(())) => Notice::success("Signed out and token revoked"),
        Ok(Outcome::Skipped(skip)) => Notice::warning(format!("Not signed out: {skip}")),
        Err(err) => Notice::error(describe(&err)),
    };

    state.settle_view(notice);
    back_home()
}

async fn forget(State(state): State<AppState>) -> Redirect {
    state.session.dispose();
    state.settle_view(Notice::info("Session forgotten"));
    back_home()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::ProtocolError;
    use crate::state::NoticeKind;

    #[test]
    fn test_describe_includes_source() {
        let err = SessionError::TokenRequest(ProtocolError::MissingEndpoint("token_endpoint"));
        assert_eq!(
            describe(&err),
            "token request failed: service configuration has no token_endpoint"
        );
    }

    #[test]
    fn test_refresh_notice() {
        let notice = token_notice(Ok(Outcome::Completed(GrantType::RefreshToken)), None);
        assert_eq!(notice, Notice::success("Access token refreshed"));
    }

    #[tokio::test]
    async fn test_home_page_status_comes_from_session() {
        let state = AppState::new(crate::config::OidcConfig::default()).unwrap();
        {
            let mut view = state.view();
            view.logged_in = true;
            view.display_name = Some("Stale Name".to_string());
        }

        let page = maud::Render::render(&root_page(State(state)).await).into_string();

        assert!(page.contains(">Not Logged In<"));
        assert!(!page.contains("Stale Name"));
        assert!(page.contains("action=\"/login\""));
    }

    #[test]
    fn test_discovery_error_only_reported_without_cached_configuration() {
        let discovery_error = || SessionError::Discovery {
            issuer: "https://issuer.test".to_string(),
            source: ProtocolError::MissingEndpoint("token_endpoint"),
        };

        let unset = token_notice(
            Ok(Outcome::Skipped(Skip::ConfigurationMissing)),
            Some(discovery_error()),
        );
        assert_eq!(unset.kind, NoticeKind::Error);
        assert!(unset.message.contains("failed to fetch service configuration"));

        let cached = token_notice(
            Ok(Outcome::Completed(GrantType::RefreshToken)),
            Some(discovery_error()),
        );
        assert_eq!(cached, Notice::success("Access token refreshed"));
    }
}
