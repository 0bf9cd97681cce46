//! OpenID Connect protocol plumbing for the authorization code flow.
//!
//! Discovery, authorization requests with PKCE, the token and revocation
//! endpoints, and userinfo. The session state machine lives in
//! [`crate::session`]; this module only knows how to talk to an issuer.

pub mod client;
pub mod discovery;
pub mod error;
pub mod pkce;
pub mod request;
pub mod token;

pub use client::{AuthorizationServer, HttpAuthorizationServer, UserInfo};
pub use discovery::ServiceConfiguration;
pub use error::ProtocolError;
pub use request::{AuthorizationRequest, AuthorizationResponse, CallbackParams};
pub use token::{
    mask_token, Grant, GrantType, RevokeTokenRequest, TokenRequest, TokenResponse,
    TokenResponseJson,
};
