pub mod ast;
pub mod normalizer;
pub mod parser;

pub use ast::*;
pub use normalizer::{normalize, placeholders, substitute_placeholders};
pub use parser::{parse_action, ActionParser, ParseError, Rule};

use std::collections::HashMap;

/// Normalize, substitute credentials and parse a raw action line.
pub fn process(raw: &str, credentials: &HashMap<String, String>) -> Result<Action, ParseError> {
    let normalized = normalize(raw);
    let substituted = substitute_placeholders(&normalized, credentials);
    parse_action(&substituted)
}
