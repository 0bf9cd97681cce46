//! A small web app that signs a user in with the OpenID Connect authorization
//! code flow and shows what the session holds.

pub mod components;
pub mod config;
pub mod errors;
pub mod oidc;
pub mod routes;
pub mod session;
pub mod setup;
pub mod state;

pub use config::{OidcConfig, ServerConfig};
pub use session::{Outcome, Session, SessionError, Skip};
pub use state::AppState;
