use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"<([A-Za-z][A-Za-z0-9_]*)>").unwrap();
}

/// Trim an action line and drop any trailing statement terminators.
pub fn normalize(input: &str) -> String {
    input.trim().trim_end_matches(';').trim_end().to_string()
}

/// Replace `<KEY>` placeholders with the credential stored under `key`.
///
/// Keys are matched case-insensitively; unknown placeholders are left intact.
pub fn substitute_placeholders(action: &str, credentials: &HashMap<String, String>) -> String {
    if credentials.is_empty() {
        return action.to_string();
    }

    let lookup: HashMap<String, &String> = credentials
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    PLACEHOLDER
        .replace_all(action, |caps: &Captures| {
            match lookup.get(&caps[1].to_lowercase()) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Names of all placeholders in `action`, lowercased.
pub fn placeholders(action: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(action)
        .map(|caps| caps[1].to_lowercase())
        .collect()
}
