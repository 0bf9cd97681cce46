use maud::{html, Markup, Render};

use crate::components::ui::button::Button;

pub struct InputField {
    pub name: String,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    pub input_type: String,
    pub required: bool,
}

impl InputField {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            placeholder: None,
            value: None,
            input_type: "text".to_string(),
            required: false,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn input_type(mut self, input_type: &str) -> Self {
        self.input_type = input_type.to_string();
        self
    }
}

impl Render for InputField {
    fn render(&self) -> Markup {
        html! {
            div class="mb-3" {
                @if let Some(label) = &self.label {
                    label for=(self.name) class="block text-sm font-medium text-gray-700 mb-1" { (label) }
                }
                input
                    type=(self.input_type)
                    name=(self.name)
                    id=(self.name)
                    value=(self.value.as_deref().unwrap_or(""))
                    placeholder=(self.placeholder.as_deref().unwrap_or(""))
                    class="w-full px-4 py-2 border border-gray-300 rounded-lg focus:ring-2 focus:ring-indigo-500 focus:border-indigo-500 text-gray-900"
                    required[self.required] {}
            }
        }
    }
}

/// A POST form that is just a submit button, optionally with fields above it
pub struct ActionForm {
    pub action: String,
    pub fields: Vec<InputField>,
    pub button: Button,
}

impl ActionForm {
    pub fn new(action: &str, button: Button) -> Self {
        Self {
            action: action.to_string(),
            fields: Vec::new(),
            button: button.submit(),
        }
    }

    pub fn field(mut self, field: InputField) -> Self {
        self.fields.push(field);
        self
    }
}

impl Render for ActionForm {
    fn render(&self) -> Markup {
        html! {
            form action=(self.action) method="post" {
                @for field in &self.fields {
                    (field)
                }
                (self.button)
            }
        }
    }
}
