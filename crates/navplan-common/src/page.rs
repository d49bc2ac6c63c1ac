use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a live element on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u32);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Snapshot of an element as seen by the driver at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInfo {
    pub handle: ElementHandle,
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub content_editable: bool,
}

impl ElementInfo {
    /// Trimmed, lowercased text with runs of whitespace collapsed.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    /// Text, aria-label and title joined and lowercased.
    pub fn combined_text(&self) -> String {
        let parts = [
            self.text.as_str(),
            self.aria_label.as_deref().unwrap_or(""),
            self.title.as_deref().unwrap_or(""),
        ];
        parts.join(" ").to_lowercase().trim().to_string()
    }

    /// Accessible name as a screen reader would announce it.
    pub fn accessible_name(&self) -> &str {
        match self.aria_label.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => &self.text,
        }
    }

    pub fn is_button_like(&self) -> bool {
        self.tag == "button" || self.role.as_deref() == Some("button")
    }

    pub fn is_link(&self) -> bool {
        self.tag == "a" || self.role.as_deref() == Some("link")
    }

    /// Whether the symbol appears in the text, aria-label or title.
    pub fn carries(&self, symbol: &str) -> bool {
        self.text.contains(symbol)
            || self.aria_label.as_deref().is_some_and(|l| l.contains(symbol))
            || self.title.as_deref().is_some_and(|t| t.contains(symbol))
    }

    /// Label-ish attributes a field can be identified by.
    pub fn field_labels(&self) -> impl Iterator<Item = &str> {
        [
            self.placeholder.as_deref(),
            self.aria_label.as_deref(),
            self.name.as_deref(),
            self.title.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
