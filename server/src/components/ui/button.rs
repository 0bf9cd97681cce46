use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonVariant {
    Primary,
    Secondary,
    Danger,
}

pub struct Button {
    pub text: String,
    pub variant: ButtonVariant,
    pub full_width: bool,
    pub icon: Option<String>,
    pub button_type: &'static str,
}

impl Default for Button {
    fn default() -> Self {
        Self {
            text: String::new(),
            variant: ButtonVariant::Primary,
            full_width: false,
            icon: None,
            button_type: "button",
        }
    }
}

impl Button {
    pub fn primary(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn secondary(text: &str) -> Self {
        Self {
            text: text.to_string(),
            variant: ButtonVariant::Secondary,
            ..Default::default()
        }
    }

    pub fn danger(text: &str) -> Self {
        Self {
            text: text.to_string(),
            variant: ButtonVariant::Danger,
            ..Default::default()
        }
    }

    pub fn full_width(mut self, full_width: bool) -> Self {
        self.full_width = full_width;
        self
    }

    /// Font Awesome class list, e.g. `fa-solid fa-key`
    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn submit(mut self) -> Self {
        self.button_type = "submit";
        self
    }

    fn variant_classes(&self) -> &'static str {
        match self.variant {
            ButtonVariant::Primary => "bg-indigo-600 hover:bg-indigo-700 active:bg-indigo-800 text-white focus:ring-2 focus:ring-indigo-500 focus:ring-offset-2",
            ButtonVariant::Secondary => "bg-white hover:bg-gray-50 active:bg-gray-100 text-indigo-600 border border-indigo-300 hover:border-indigo-400 focus:ring-2 focus:ring-indigo-500 focus:ring-offset-2",
            ButtonVariant::Danger => "bg-white hover:bg-red-50 active:bg-red-100 text-red-600 border border-red-300 hover:border-red-400 focus:ring-2 focus:ring-red-500 focus:ring-offset-2",
        }
    }
}

impl Render for Button {
    fn render(&self) -> Markup {
        let classes = format!(
            "{} py-2 sm:py-2.5 px-3 sm:px-4 text-sm sm:text-base {} font-medium rounded-lg shadow-sm hover:shadow transition-all duration-200 flex items-center justify-center cursor-pointer",
            self.variant_classes(),
            if self.full_width { "w-full" } else { "" },
        );

        html! {
            button type=(self.button_type) class=(classes) {
                @if let Some(icon) = &self.icon {
                    span class="mr-2" { i class=(icon) {} }
                }
                (self.text)
            }
        }
    }
}
