use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Single-glyph targets that are resolved by context rather than by text.
pub const RESERVED_SYMBOLS: &[&str] = &[
    "+", "×", "−", "÷", "•", "·", "…", "→", "←", "↑", "↓", "✓", "✗", "★", "☆", "⚙", "⚡",
];

/// Icon glyphs only recognised as bare click targets.
pub const ICON_SYMBOLS: &[&str] = &["🔍", "📝", "➕", "✏", "🗑", "⭐"];

lazy_static! {
    static ref SCOPED_TEXT: Regex =
        Regex::new(r#"^(\[role=["']?(?:dialog|alertdialog)["']?\])\s+text=(.+)$"#).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    Navigate { url: String },
    WaitReady,
    WaitFor { target: Target },
    WaitForEither { first: Target, second: Target },
    WaitUrlChange { pattern: Option<String> },
    /// `chained` is set for the `else if_element_exists(...)` form.
    IfExists { target: Target, step: u32, chained: bool },
    IfUrlContains { pattern: String, step: u32 },
    IfVisible { target: Target },
    Else { step: Option<u32> },
    Type { target: Target, text: String },
    Click { target: Target },
    Press { key: String },
    Assert { target: Target },
    Comment(String),
}

impl Action {
    /// Short name used in logs and artifact file names.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "open_page",
            Action::WaitReady => "wait_ready",
            Action::WaitFor { .. } => "wait_for",
            Action::WaitForEither { .. } => "wait_for_either",
            Action::WaitUrlChange { .. } => "wait_url_change",
            Action::IfExists { .. } => "if_exists",
            Action::IfUrlContains { .. } => "if_url",
            Action::IfVisible { .. } => "if_visible",
            Action::Else { .. } => "else",
            Action::Type { .. } => "type",
            Action::Click { .. } => "click",
            Action::Press { .. } => "press",
            Action::Assert { .. } => "assert",
            Action::Comment(_) => "comment",
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            Action::IfExists { .. } | Action::IfUrlContains { .. } | Action::IfVisible { .. }
        )
    }
}

/// What an action points at on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Target {
    /// `text=...`, optionally restricted to a container such as a dialog.
    Text { phrase: String, scope: Option<String> },
    Symbol(String),
    Selector(String),
    /// `a OR b`: first alternative that resolves wins.
    AnyOf(Vec<Target>),
}

impl Target {
    pub fn parse(raw: &str) -> Target {
        let raw = raw.trim();

        if raw.contains(" OR ") {
            let alternatives: Vec<Target> = raw
                .split(" OR ")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(Target::parse)
                .collect();
            if alternatives.len() > 1 {
                return Target::AnyOf(alternatives);
            }
        }

        if let Some(rest) = raw.strip_prefix("text=") {
            return Target::Text {
                phrase: unquote(rest).to_string(),
                scope: None,
            };
        }

        if let Some(rest) = raw.strip_prefix("symbol=") {
            return Target::Symbol(unquote(rest).to_string());
        }

        if is_symbol(raw) {
            return Target::Symbol(raw.to_string());
        }

        if let Some(caps) = SCOPED_TEXT.captures(raw) {
            return Target::Text {
                phrase: unquote(&caps[2]).to_string(),
                scope: Some("[role=\"dialog\"]".to_string()),
            };
        }

        Target::Selector(raw.to_string())
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Target::Symbol(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Text { phrase, scope: None } => write!(f, "text={}", phrase),
            Target::Text {
                phrase,
                scope: Some(scope),
            } => write!(f, "{} text={}", scope, phrase),
            Target::Symbol(symbol) => write!(f, "symbol={}", symbol),
            Target::Selector(selector) => write!(f, "{}", selector),
            Target::AnyOf(alternatives) => {
                let parts: Vec<String> = alternatives.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", parts.join(" OR "))
            }
        }
    }
}

pub fn is_symbol(raw: &str) -> bool {
    let trimmed = raw.trim_end_matches('\u{fe0f}');
    RESERVED_SYMBOLS.contains(&trimmed) || ICON_SYMBOLS.contains(&trimmed)
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
