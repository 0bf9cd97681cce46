use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use color_eyre::eyre::WrapErr;

use crate::config::OidcConfig;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

/// One-shot message shown on the next page render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }
}

/// What the page shows besides the session itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub logged_in: bool,
    pub display_name: Option<String>,
    notice: Option<Notice>,
}

impl ViewState {
    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Recompute the logged-in flag, dropping the name once signed out
    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.logged_in = logged_in;
        if !logged_in {
            self.display_name = None;
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    view: Arc<Mutex<ViewState>>,
}

impl AppState {
    pub fn new(config: OidcConfig) -> color_eyre::Result<Self> {
        let session = Session::from_config(config).wrap_err("Failed to build HTTP client")?;

        Ok(Self {
            session: Arc::new(session),
            view: Arc::new(Mutex::new(ViewState::default())),
        })
    }

    pub fn from_env() -> color_eyre::Result<Self> {
        let config = OidcConfig::from_env()?;
        tracing::info!(issuer = %config.issuer, client_id = %config.client_id, "Loaded OIDC configuration");
        Self::new(config)
    }

    pub fn view(&self) -> MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh the logged-in flag from the session and queue a notice
    pub fn settle_view(&self, notice: Notice) {
        let logged_in = self.session.has_valid_token();
        let mut view = self.view();
        view.set_logged_in(logged_in);
        view.set_notice(notice);
    }

    pub fn version(&self) -> &'static str {
        env!("VERGEN_GIT_SHA")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_is_shown_once() {
        let mut view = ViewState::default();
        view.set_notice(Notice::info("hello"));
        assert_eq!(view.take_notice(), Some(Notice::info("hello")));
        assert_eq!(view.take_notice(), None);
    }

    #[test]
    fn test_logging_out_forgets_display_name() {
        let mut view = ViewState {
            logged_in: true,
            display_name: Some("Ada".to_string()),
            ..Default::default()
        };
        view.set_logged_in(false);
        assert!(!view.logged_in);
        assert_eq!(view.display_name, None);
    }

    #[test]
    fn test_fresh_state_is_logged_out() {
        let state = AppState::new(OidcConfig::default()).unwrap();
        assert!(!state.view().logged_in);
        assert!(!state.session.has_valid_token());
    }
}
