use maud::{html, Markup, Render};

use crate::components::ui::badge::{Badge, BadgeColor};
use crate::session::SessionStatus;

/// The status block at the top of the page
pub struct StatusPanel<'a> {
    pub status: &'a SessionStatus,
    pub display_name: Option<&'a str>,
}

impl Render for StatusPanel<'_> {
    fn render(&self) -> Markup {
        html! {
            dl class="grid grid-cols-3 gap-x-4 gap-y-2 text-sm" {
                dt class="text-gray-500" { "Status" }
                dd class="col-span-2" id="login-status" { (Badge::login_status(self.status.logged_in)) }

                dt class="text-gray-500" { "Name" }
                dd class="col-span-2 text-gray-900" id="display-name" {
                    (self.display_name.unwrap_or("-"))
                }

                dt class="text-gray-500" { "Session" }
                dd class="col-span-2 text-gray-900" id="phase" { (self.status.phase) }

                dt class="text-gray-500" { "Expires" }
                dd class="col-span-2 text-gray-900" {
                    @match self.status.expires_at {
                        Some(expires_at) => {
                            time datetime=(expires_at.to_rfc3339()) {
                                (expires_at.format("%Y-%m-%d %H:%M:%S UTC"))
                            }
                            @if self.status.expired {
                                " " (Badge::new("Expired", BadgeColor::Yellow).rounded(true))
                            }
                        }
                        None => { "-" }
                    }
                }

                @if !self.status.configuration_loaded {
                    dt class="text-gray-500" { "Issuer" }
                    dd class="col-span-2 text-yellow-700" { "not discovered yet" }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn status(logged_in: bool, expired: bool) -> SessionStatus {
        SessionStatus {
            configuration_loaded: true,
            phase: "token acquired",
            logged_in,
            authorized: false,
            expires_at: Utc.timestamp_opt(4_600, 0).single(),
            expired,
        }
    }

    #[test]
    fn test_expired_token_gets_badge() {
        let status = status(true, true);
        let markup = StatusPanel {
            status: &status,
            display_name: Some("Ada"),
        }
        .render()
        .into_string();

        assert!(markup.contains("Logged In"));
        assert!(markup.contains("Expired"));
        assert!(markup.contains("1970-01-01 01:16:40 UTC"));
    }

    #[test]
    fn test_live_token_has_no_expired_badge() {
        let status = status(true, false);
        let markup = StatusPanel {
            status: &status,
            display_name: None,
        }
        .render()
        .into_string();

        assert!(!markup.contains("Expired"));
        assert!(!markup.contains("not discovered yet"));
    }
}
