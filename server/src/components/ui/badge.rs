use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BadgeColor {
    Green,
    Yellow,
    Gray,
}

pub struct Badge {
    pub text: String,
    pub color: BadgeColor,
    pub rounded: bool,
}

impl Badge {
    pub fn new(text: &str, color: BadgeColor) -> Self {
        Self {
            text: text.to_string(),
            color,
            rounded: false,
        }
    }

    pub fn rounded(mut self, rounded: bool) -> Self {
        self.rounded = rounded;
        self
    }

    /// "Logged In" / "Not Logged In"
    pub fn login_status(logged_in: bool) -> Self {
        if logged_in {
            Self::new("Logged In", BadgeColor::Green).rounded(true)
        } else {
            Self::new("Not Logged In", BadgeColor::Gray).rounded(true)
        }
    }

    fn color_classes(&self) -> &'static str {
        match self.color {
            BadgeColor::Green => "bg-green-100 text-green-800",
            BadgeColor::Yellow => "bg-yellow-100 text-yellow-800",
            BadgeColor::Gray => "bg-gray-100 text-gray-800",
        }
    }
}

impl Render for Badge {
    fn render(&self) -> Markup {
        let rounded = if self.rounded { "rounded-full" } else { "rounded" };
        let classes = format!(
            "{} text-xs font-medium px-2 py-1 {}",
            self.color_classes(),
            rounded
        );

        html! {
            span class=(classes) { (self.text) }
        }
    }
}
