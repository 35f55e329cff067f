use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a fillable control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Number,
    Date,
    Textarea,
    Select,
    Radio,
    Checkbox,
    File,
}

impl FieldKind {
    /// Kind for an `<input type=...>`; `None` for non-fillable types.
    pub fn from_input_type(input_type: &str) -> Option<Self> {
        match input_type.to_ascii_lowercase().as_str() {
            "" | "text" | "search" | "url" | "password" => Some(Self::Text),
            "email" => Some(Self::Email),
            "tel" => Some(Self::Tel),
            "number" => Some(Self::Number),
            "date" | "month" => Some(Self::Date),
            "file" => Some(Self::File),
            "radio" => Some(Self::Radio),
            "checkbox" => Some(Self::Checkbox),
            "hidden" | "submit" | "button" | "reset" | "image" => None,
            _ => Some(Self::Text),
        }
    }

    /// Accepts free text through value assignment.
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Email | Self::Tel | Self::Number | Self::Date | Self::Textarea
        )
    }

    pub fn has_options(self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

/// How the control is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    #[default]
    Native,
    /// Non-native dropdown: click to open, then pick from revealed options.
    CustomDropdown,
    /// `role="radio"` inside a `role="radiogroup"`.
    AriaRadio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub text: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// Canonical representation of one fillable control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub selector: String,
    pub kind: FieldKind,
    pub label: String,
    pub required: bool,
    pub current_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_native")]
    pub widget: Widget,
    /// `name` attribute, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub is_visible: bool,
}

fn is_native(widget: &Widget) -> bool {
    *widget == Widget::Native
}

impl Field {
    /// A visible native control with no value and no options.
    pub fn new(selector: impl Into<String>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind,
            label: label.into(),
            required: false,
            current_value: String::new(),
            options: None,
            group_name: None,
            widget: Widget::Native,
            name: None,
            is_visible: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current_value.trim().is_empty()
    }

    /// Has at least one discovered option.
    pub fn has_resolved_options(&self) -> bool {
        self.options.as_ref().is_some_and(|o| !o.is_empty())
    }

    pub fn options(&self) -> &[FieldOption] {
        self.options.as_deref().unwrap_or_default()
    }

    /// Label, name and selector joined and lowercased, for keyword matching.
    pub fn haystack(&self) -> String {
        let mut out = self.label.to_lowercase();
        if let Some(name) = &self.name {
            out.push(' ');
            out.push_str(&name.to_lowercase().replace(['_', '-', '[', ']'], " "));
        }
        out
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} \"{}\" ({})", self.kind, self.label, self.selector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonKind {
    Add,
    Next,
    Submit,
    Other,
}

impl ButtonKind {
    pub fn from_text(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.starts_with("add") || text.starts_with("+ add") || text.contains("add another") {
            Self::Add
        } else if ["next", "continue", "save and continue", "save & continue", "proceed"]
            .iter()
            .any(|k| text.starts_with(k))
        {
            Self::Next
        } else if ["submit", "apply", "send application", "finish"]
            .iter()
            .any(|k| text.starts_with(k))
        {
            Self::Submit
        } else {
            Self::Other
        }
    }
}

/// An enabled, visible, clickable button offered to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub selector: String,
    pub text: String,
    pub kind: ButtonKind,
}

/// One observation of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub url: String,
    pub title: String,
    pub fields: Vec<Field>,
    pub buttons: Vec<Button>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_section: Option<String>,
}
