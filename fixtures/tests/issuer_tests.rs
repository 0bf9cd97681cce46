use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use fixtures::spawn_issuer;
use serde_json::Value;
use sha2::{Digest, Sha256};

const CLIENT_ID: &str = "test-client";
const REDIRECT_URI: &str = "http://localhost:8000/app/redirect.html";
const VERIFIER: &str = "a-sufficiently-long-code-verifier-for-the-fixture-issuer-tests";

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn challenge() -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(VERIFIER.as_bytes()))
}

/// Follow `/authorize` by hand and return the callback query
async fn authorize(base_url: &str, login_hint: Option<&str>) -> HashMap<String, String> {
    let challenge = challenge();
    let mut query = vec![
        ("response_type", "code"),
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
        ("scope", "openid"),
        ("state", "state-123"),
        ("code_challenge", challenge.as_str()),
        ("code_challenge_method", "S256"),
    ];
    if let Some(hint) = login_hint {
        query.push(("login_hint", hint));
    }

    let response = client()
        .get(format!("{base_url}/authorize"))
        .query(&query)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);

    let location = response.headers()["location"].to_str().unwrap().to_string();
    assert!(location.starts_with(REDIRECT_URI), "{location}");

    let (_, query) = location.split_once('?').unwrap();
    serde_urlencoded::from_str(query).unwrap()
}

async fn exchange(base_url: &str, code: &str, verifier: &str) -> reqwest::Response {
    client()
        .post(format!("{base_url}/token"))
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("code", code),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_discovery_document() {
    let issuer = spawn_issuer().await.unwrap();

    let json: Value = client()
        .get(format!("{}/.well-known/openid-configuration", issuer.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["issuer"], issuer.base_url);
    assert_eq!(
        json["token_endpoint"],
        format!("{}/token", issuer.base_url)
    );
    assert_eq!(
        json["revocation_endpoint"],
        format!("{}/revoke", issuer.base_url)
    );
    assert_eq!(json["code_challenge_methods_supported"][0], "S256");
}

#[tokio::test]
async fn test_code_exchange_is_single_use() {
    let issuer = spawn_issuer().await.unwrap();
    let callback = authorize(&issuer.base_url, None).await;
    assert_eq!(callback["state"], "state-123");
    let code = &callback["code"];

    let response = exchange(&issuer.base_url, code, VERIFIER).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);
    assert!(json["refresh_token"].is_string());
    assert!(issuer
        .state
        .is_access_token_active(json["access_token"].as_str().unwrap()));

    let replay = exchange(&issuer.base_url, code, VERIFIER).await;
    assert_eq!(replay.status(), reqwest::StatusCode::BAD_REQUEST);
    let json: Value = replay.json().await.unwrap();
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_wrong_verifier_is_rejected() {
    let issuer = spawn_issuer().await.unwrap();
    let callback = authorize(&issuer.base_url, None).await;

    let response = exchange(&issuer.base_url, &callback["code"], "not-the-verifier").await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "invalid_grant");
    assert_eq!(issuer.state.outstanding_codes(), 0);
}

#[tokio::test]
async fn test_denied_login_hint_redirects_with_error() {
    let issuer = spawn_issuer().await.unwrap();

    let callback = authorize(&issuer.base_url, Some("denied")).await;

    assert_eq!(callback["error"], "access_denied");
    assert_eq!(callback["state"], "state-123");
    assert!(!callback.contains_key("code"));
}

#[tokio::test]
async fn test_refresh_omits_refresh_token() {
    let issuer = spawn_issuer().await.unwrap();
    let callback = authorize(&issuer.base_url, None).await;
    let tokens: Value = exchange(&issuer.base_url, &callback["code"], VERIFIER)
        .await
        .json()
        .await
        .unwrap();

    let response = client()
        .post(format!("{}/token", issuer.base_url))
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", CLIENT_ID),
            ("refresh_token", tokens["refresh_token"].as_str().unwrap()),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let refreshed: Value = response.json().await.unwrap();
    assert_ne!(refreshed["access_token"], tokens["access_token"]);
    assert!(refreshed.get("refresh_token").is_none());
}

#[tokio::test]
async fn test_userinfo_and_revocation() {
    let issuer = spawn_issuer().await.unwrap();
    let callback = authorize(&issuer.base_url, Some("ada@example.com")).await;
    let tokens: Value = exchange(&issuer.base_url, &callback["code"], VERIFIER)
        .await
        .json()
        .await
        .unwrap();
    let access_token = tokens["access_token"].as_str().unwrap();

    let info: Value = client()
        .get(format!("{}/userinfo", issuer.base_url))
        .bearer_auth(access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["email"], "ada@example.com");

    let revoked = client()
        .post(format!("{}/revoke", issuer.base_url))
        .form(&[("token", access_token), ("token_type_hint", "access_token")])
        .send()
        .await
        .unwrap();
    assert_eq!(revoked.status(), reqwest::StatusCode::OK);
    assert_eq!(issuer.state.revoked_tokens(), vec![access_token.to_string()]);

    let after = client()
        .get(format!("{}/userinfo", issuer.base_url))
        .bearer_auth(access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_discovery_can_be_switched_off() {
    let issuer = spawn_issuer().await.unwrap();
    let url = format!("{}/.well-known/openid-configuration", issuer.base_url);

    issuer.state.set_discovery_down(true);
    let down = client().get(&url).send().await.unwrap();
    assert_eq!(down.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let callback = authorize(&issuer.base_url, None).await;
    assert!(callback.contains_key("code"));

    issuer.state.set_discovery_down(false);
    let up = client().get(&url).send().await.unwrap();
    assert_eq!(up.status(), reqwest::StatusCode::OK);
}
