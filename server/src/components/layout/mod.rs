use maud::{html, Markup, Render, DOCTYPE};

pub struct Page {
    pub title: String,
    pub content: Box<dyn Render>,
    pub version: Option<String>,
}

impl Page {
    pub fn new(title: &str, content: impl Render + 'static) -> Self {
        Self {
            title: title.to_string(),
            content: Box::new(content),
            version: None,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }
}

impl Render for Page {
    fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src="https://unpkg.com/@tailwindcss/browser@4" {}
                    link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                }

                body class="min-h-screen bg-white md:bg-gradient-to-br md:from-blue-100 md:via-indigo-50 md:to-purple-100 py-4 md:py-8 px-0 sm:px-4" {
                    (self.content.render())

                    footer class="mt-6 md:mt-8 text-center text-xs text-gray-500" {
                        p { "OpenID Connect authorization code demo" }
                        @if let Some(version) = &self.version {
                            p class="font-mono mt-1" { "build " (version) }
                        }
                    }
                }
            }
        }
    }
}

impl axum::response::IntoResponse for Page {
    fn into_response(self) -> axum::response::Response {
        self.render().into_response()
    }
}

pub struct Card {
    pub content: Box<dyn Render>,
    pub max_width: Option<String>,
}

impl Card {
    pub fn new(content: impl Render + 'static) -> Self {
        Self {
            content: Box::new(content),
            max_width: None,
        }
    }

    pub fn with_max_width(mut self, max_width: &str) -> Self {
        self.max_width = Some(max_width.to_string());
        self
    }
}

impl Render for Card {
    fn render(&self) -> Markup {
        let width_class = self.max_width.as_deref().unwrap_or("max-w-md");

        html! {
            div class={(width_class) " mx-auto bg-white rounded-lg sm:rounded-xl border border-gray-100 shadow-md sm:shadow-lg overflow-hidden w-full"} {
                (self.content.render())
            }
        }
    }
}

pub struct ContentSection {
    pub padding: String,
    pub content: Box<dyn Render>,
    pub divided: bool,
}

impl ContentSection {
    pub fn new(content: impl Render + 'static) -> Self {
        Self {
            padding: "px-6 sm:px-8 py-6".to_string(),
            content: Box::new(content),
            divided: false,
        }
    }

    /// Separate this section from the one above it
    pub fn divided(mut self) -> Self {
        self.divided = true;
        self
    }
}

impl Render for ContentSection {
    fn render(&self) -> Markup {
        let classes = if self.divided {
            format!("{} border-t border-gray-100", self.padding)
        } else {
            self.padding.clone()
        };

        html! {
            section class=(classes) {
                (self.content.render())
            }
        }
    }
}
