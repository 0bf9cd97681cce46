use maud::{html, Markup, Render};

use crate::state::{Notice, NoticeKind};

/// Banner for the outcome of the last action
pub struct NoticeBanner<'a>(pub &'a Notice);

impl Render for NoticeBanner<'_> {
    fn render(&self) -> Markup {
        let (classes, icon) = match self.0.kind {
            NoticeKind::Success => (
                "bg-green-50 border-green-200 text-green-800",
                "fa-solid fa-circle-check",
            ),
            NoticeKind::Info => (
                "bg-blue-50 border-blue-200 text-blue-800",
                "fa-solid fa-circle-info",
            ),
            NoticeKind::Warning => (
                "bg-yellow-50 border-yellow-200 text-yellow-800",
                "fa-solid fa-triangle-exclamation",
            ),
            NoticeKind::Error => (
                "bg-red-50 border-red-200 text-red-800",
                "fa-solid fa-circle-xmark",
            ),
        };

        html! {
            div class={"flex items-start gap-2 p-3 mb-4 border rounded-lg text-sm " (classes)} role="status" {
                i class={(icon) " mt-0.5"} {}
                span { (self.0.message) }
            }
        }
    }
}
