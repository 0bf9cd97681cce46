use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadingLevel {
    H1,
    H2,
}

pub struct Heading {
    pub text: String,
    pub level: HeadingLevel,
    pub color: Option<String>,
}

impl Heading {
    pub fn new(text: &str, level: HeadingLevel) -> Self {
        Self {
            text: text.to_string(),
            level,
            color: None,
        }
    }

    pub fn h1(text: &str) -> Self {
        Self::new(text, HeadingLevel::H1)
    }

    pub fn h2(text: &str) -> Self {
        Self::new(text, HeadingLevel::H2)
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    fn level_classes(&self) -> &'static str {
        match self.level {
            HeadingLevel::H1 => "text-2xl sm:text-3xl font-bold mb-2",
            HeadingLevel::H2 => "text-xl font-semibold mb-2",
        }
    }
}

impl Render for Heading {
    fn render(&self) -> Markup {
        let classes = format!(
            "{} {}",
            self.level_classes(),
            self.color.as_deref().unwrap_or("text-gray-800"),
        );

        match self.level {
            HeadingLevel::H1 => html! { h1 class=(classes) { (self.text) } },
            HeadingLevel::H2 => html! { h2 class=(classes) { (self.text) } },
        }
    }
}
