//! Coarse page classification derived from the current URL.

use serde::Serialize;
use std::collections::BTreeMap;

const CREATE_MARKERS: &[&str] = &["/new", "/create", "/add", "/edit"];
const VIEW_MARKERS: &[&str] = &["/view", "/views"];
const ISSUE_MARKERS: &[&str] = &["/issue", "/issues"];
const PROJECT_MARKERS: &[&str] = &["/project", "/projects"];
const SETTINGS_MARKERS: &[&str] = &["/settings", "/config", "/preferences"];
const LOGIN_MARKERS: &[&str] = &["/login", "/signin", "/auth", "/sign-in"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlState {
    /// Lowercased URL the flags were computed from.
    pub url: String,
    pub path_parts: Vec<String>,
    pub query_params: BTreeMap<String, Vec<String>>,
    pub is_create: bool,
    pub is_view: bool,
    pub is_issue: bool,
    pub is_project: bool,
    pub is_settings: bool,
    pub is_login: bool,
}

impl UrlState {
    /// Classify `location`. Unparseable input still yields keyword flags.
    pub fn from_url(location: &str) -> Self {
        let url = location.trim().to_lowercase();
        let mut state = UrlState {
            is_create: contains_any(&url, CREATE_MARKERS),
            is_view: contains_any(&url, VIEW_MARKERS),
            is_issue: contains_any(&url, ISSUE_MARKERS),
            is_project: contains_any(&url, PROJECT_MARKERS),
            is_settings: contains_any(&url, SETTINGS_MARKERS),
            is_login: contains_any(&url, LOGIN_MARKERS),
            ..Default::default()
        };

        if let Ok(parsed) = url::Url::parse(&url) {
            state.path_parts = parsed
                .path_segments()
                .map(|segments| {
                    segments
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            for (key, value) in parsed.query_pairs() {
                state
                    .query_params
                    .entry(key.into_owned())
                    .or_default()
                    .push(value.into_owned());
            }
        }

        state.url = url;
        state
    }

    /// Names of the flags that are set, for logging.
    pub fn active_flags(&self) -> Vec<&'static str> {
        [
            (self.is_create, "create"),
            (self.is_view, "view"),
            (self.is_issue, "issue"),
            (self.is_project, "project"),
            (self.is_settings, "settings"),
            (self.is_login, "login"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }

    /// Object kinds implied by the URL, used as symbol context.
    pub fn context_keywords(&self) -> Vec<&'static str> {
        [
            (self.is_issue, "issue"),
            (self.is_project, "project"),
            (self.is_view, "view"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

fn contains_any(url: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| url.contains(m))
}
