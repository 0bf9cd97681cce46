//! An in-memory OpenID Connect issuer for tests and local runs.
//!
//! Authorization is approved automatically. A `login_hint` of `denied`
//! makes the issuer refuse instead. Codes are single use and PKCE S256 is
//! enforced when a challenge was sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

pub const ACCESS_TOKEN_LIFETIME_SECS: u64 = 3600;

/// The login hint that makes the issuer refuse authorization
pub const DENIED_LOGIN_HINT: &str = "denied";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureUser {
    pub sub: String,
    pub name: String,
    pub email: String,
}

impl FixtureUser {
    fn for_hint(hint: Option<&str>) -> Self {
        match hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(email) => Self {
                sub: format!("sub-{}", hex_digest(email)),
                name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
            },
            None => Self {
                sub: "sub-fixture-user".to_string(),
                name: "Fixture User".to_string(),
                email: "fixture-user@example.test".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct IssuedCode {
    client_id: String,
    redirect_uri: String,
    scope: String,
    code_challenge: Option<String>,
    user: FixtureUser,
}

#[derive(Debug, Clone)]
struct Grant {
    client_id: String,
    scope: String,
    user: FixtureUser,
}

#[derive(Debug, Default)]
struct IssuerData {
    codes: HashMap<String, IssuedCode>,
    access_tokens: HashMap<String, Grant>,
    refresh_tokens: HashMap<String, Grant>,
    revoked: Vec<String>,
    discovery_down: bool,
}

#[derive(Clone)]
pub struct IssuerState {
    base_url: String,
    data: Arc<Mutex<IssuerData>>,
}

impl IssuerState {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            data: Arc::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn data(&self) -> MutexGuard<'_, IssuerData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_access_token_active(&self, token: &str) -> bool {
        self.data().access_tokens.contains_key(token)
    }

    pub fn outstanding_codes(&self) -> usize {
        self.data().codes.len()
    }

    pub fn revoked_tokens(&self) -> Vec<String> {
        self.data().revoked.clone()
    }

    /// Make the discovery document answer 503 until switched back. The other
    /// endpoints keep working.
    pub fn set_discovery_down(&self, down: bool) {
        self.data().discovery_down = down;
    }
}

pub fn router(state: IssuerState) -> Router {
    Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/revoke", post(revoke))
        .route("/userinfo", get(userinfo))
        .with_state(state)
}

fn hex_digest(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "error_description": description,
        })),
    )
        .into_response()
}

async fn discovery(State(state): State<IssuerState>) -> Response {
    if state.data().discovery_down {
        warn!("Discovery is switched off, refusing");
        return (StatusCode::SERVICE_UNAVAILABLE, "discovery unavailable").into_response();
    }

    let base = state.base_url();
    Json(json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/authorize"),
        "token_endpoint": format!("{base}/token"),
        "revocation_endpoint": format!("{base}/revoke"),
        "userinfo_endpoint": format!("{base}/userinfo"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "scopes_supported": ["openid", "email", "profile"],
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    response_type: Option<String>,
    client_id: Option<String>,
    redirect_uri: Option<String>,
    scope: Option<String>,
    state: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    login_hint: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RedirectParams<'a> {
    Code {
        code: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<&'a str>,
    },
    Error {
        error: &'a str,
        error_description: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<&'a str>,
    },
}

fn redirect_back(redirect_uri: &str, params: &RedirectParams<'_>) -> Response {
    match serde_urlencoded::to_string(params) {
        Ok(query) => {
            let separator = if redirect_uri.contains('?') { '&' } else { '?' };
            Redirect::to(&format!("{redirect_uri}{separator}{query}")).into_response()
        }
        Err(e) => oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", &e.to_string()),
    }
}

async fn authorize(
    State(state): State<IssuerState>,
    Query(params): Query<AuthorizeQuery>,
) -> Response {
    let (Some(client_id), Some(redirect_uri)) = (params.client_id, params.redirect_uri) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "client_id and redirect_uri are required",
        );
    };

    if params.response_type.as_deref() != Some("code") {
        return redirect_back(
            &redirect_uri,
            &RedirectParams::Error {
                error: "unsupported_response_type",
                error_description: "Only the code flow is supported",
                state: params.state.as_deref(),
            },
        );
    }

    if params.login_hint.as_deref() == Some(DENIED_LOGIN_HINT) {
        info!("Issuer: denying authorization for {client_id}");
        return redirect_back(
            &redirect_uri,
            &RedirectParams::Error {
                error: "access_denied",
                error_description: "The user declined the request",
                state: params.state.as_deref(),
            },
        );
    }

    if params.code_challenge.is_some()
        && params.code_challenge_method.as_deref().unwrap_or("plain") != "S256"
    {
        return redirect_back(
            &redirect_uri,
            &RedirectParams::Error {
                error: "invalid_request",
                error_description: "Only S256 code challenges are supported",
                state: params.state.as_deref(),
            },
        );
    }

    let code = format!("fixture_code_{}", Uuid::new_v4());
    let user = FixtureUser::for_hint(params.login_hint.as_deref());
    info!("Issuer: authorizing {} for {client_id}", user.email);

    state.data().codes.insert(
        code.clone(),
        IssuedCode {
            client_id,
            redirect_uri: redirect_uri.clone(),
            scope: params.scope.unwrap_or_else(|| "openid".to_string()),
            code_challenge: params.code_challenge,
            user,
        },
    );

    redirect_back(
        &redirect_uri,
        &RedirectParams::Code {
            code: &code,
            state: params.state.as_deref(),
        },
    )
}

#[derive(Debug, Deserialize)]
struct TokenForm {
    grant_type: String,
    client_id: Option<String>,
    code: Option<String>,
    redirect_uri: Option<String>,
    code_verifier: Option<String>,
    refresh_token: Option<String>,
}

/// Unsigned stand-in for an ID token; nothing here validates signatures
fn fake_id_token(issuer: &str, client_id: &str, user: &FixtureUser) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "none", "typ": "JWT"}).to_string());
    let claims = URL_SAFE_NO_PAD.encode(
        json!({
            "iss": issuer,
            "aud": client_id,
            "sub": user.sub,
            "email": user.email,
            "name": user.name,
        })
        .to_string(),
    );
    format!("{header}.{claims}.")
}

async fn token(State(state): State<IssuerState>, Form(form): Form<TokenForm>) -> Response {
    match form.grant_type.as_str() {
        "authorization_code" => exchange_code(&state, form),
        "refresh_token" => refresh(&state, form),
        other => {
            warn!("Issuer: unsupported grant type {other}");
            oauth_error(
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                "Only authorization_code and refresh_token are supported",
            )
        }
    }
}

fn exchange_code(state: &IssuerState, form: TokenForm) -> Response {
    let Some(code) = form.code.filter(|c| !c.is_empty()) else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "Missing code");
    };

    let mut data = state.data();
    let Some(issued) = data.codes.remove(&code) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "Unknown or already used authorization code",
        );
    };

    if form.client_id.as_deref() != Some(issued.client_id.as_str())
        || form.redirect_uri.as_deref() != Some(issued.redirect_uri.as_str())
    {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "client_id or redirect_uri does not match the authorization request",
        );
    }

    if let Some(challenge) = &issued.code_challenge {
        let verified = form
            .code_verifier
            .as_deref()
            .is_some_and(|verifier| s256(verifier) == *challenge);
        if !verified {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "PKCE verification failed",
            );
        }
    }

    let access_token = format!("fixture_access_{}", Uuid::new_v4());
    let refresh_token = format!("fixture_refresh_{}", Uuid::new_v4());
    let grant = Grant {
        client_id: issued.client_id.clone(),
        scope: issued.scope.clone(),
        user: issued.user.clone(),
    };
    data.access_tokens.insert(access_token.clone(), grant.clone());
    data.refresh_tokens.insert(refresh_token.clone(), grant);

    info!("Issuer: issued tokens for {}", issued.user.email);
    Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": ACCESS_TOKEN_LIFETIME_SECS,
        "refresh_token": refresh_token,
        "scope": issued.scope,
        "id_token": fake_id_token(state.base_url(), &issued.client_id, &issued.user),
    }))
    .into_response()
}

/// Refresh responses leave out `refresh_token`; clients keep the one they have
fn refresh(state: &IssuerState, form: TokenForm) -> Response {
    let Some(refresh_token) = form.refresh_token.filter(|t| !t.is_empty()) else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "Missing refresh_token");
    };

    let mut data = state.data();
    let Some(grant) = data.refresh_tokens.get(&refresh_token).cloned() else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "Unknown refresh token");
    };

    if form.client_id.as_deref() != Some(grant.client_id.as_str()) {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "client_id does not match");
    }

    let access_token = format!("fixture_access_{}", Uuid::new_v4());
    let scope = grant.scope.clone();
    data.access_tokens.insert(access_token.clone(), grant);

    Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": ACCESS_TOKEN_LIFETIME_SECS,
        "scope": scope,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct RevokeForm {
    token: Option<String>,
    #[allow(dead_code)]
    token_type_hint: Option<String>,
}

/// RFC 7009: unknown tokens still get a 200
async fn revoke(State(state): State<IssuerState>, Form(form): Form<RevokeForm>) -> Response {
    let Some(token) = form.token.filter(|t| !t.is_empty()) else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "Missing token");
    };

    let mut data = state.data();
    let was_access = data.access_tokens.remove(&token).is_some();
    let was_refresh = data.refresh_tokens.remove(&token).is_some();
    if was_access || was_refresh {
        data.revoked.push(token);
    }

    StatusCode::OK.into_response()
}

async fn userinfo(State(state): State<IssuerState>, headers: HeaderMap) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let grant = token.and_then(|token| state.data().access_tokens.get(token).cloned());

    match grant {
        Some(grant) => Json(grant.user).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
        )
            .into_response(),
    }
}
