pub mod keywords;
pub mod symbol;
pub mod text;

pub use keywords::SymbolContext;
pub use symbol::{ScoredCandidate, SymbolOutcome, SymbolResolver};
pub use text::{Resolved, TextResolver, TextStrategy, TEXT_STRATEGIES};

use navplan_common::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No element matched '{target}' (tried {})", .attempted.join(", "))]
    Exhausted {
        target: String,
        attempted: Vec<&'static str>,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ResolutionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolutionError::Driver(e) if e.is_fatal())
    }
}

/// Whole-word containment on already-lowercased text.
pub(crate) fn contains_word(haystack: &str, word: &str) -> bool {
    words(haystack).any(|w| w == word)
}

/// Alphanumeric runs of `text`.
pub(crate) fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
}
