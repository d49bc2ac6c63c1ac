use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_exact_match_ms")]
    pub exact_match_ms: u64,
    #[serde(default = "default_click_ms")]
    pub click_ms: u64,
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_post_navigation_ms")]
    pub post_navigation_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            exact_match_ms: default_exact_match_ms(),
            click_ms: default_click_ms(),
            wait_ms: default_wait_ms(),
            navigation_ms: default_navigation_ms(),
            settle_ms: default_settle_ms(),
            post_navigation_ms: default_post_navigation_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn exact_match(&self) -> Duration {
        Duration::from_millis(self.exact_match_ms)
    }

    pub fn click(&self) -> Duration {
        Duration::from_millis(self.click_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn post_navigation(&self) -> Duration {
        Duration::from_millis(self.post_navigation_ms)
    }
}

fn default_exact_match_ms() -> u64 {
    3000
}

fn default_click_ms() -> u64 {
    5000
}

fn default_wait_ms() -> u64 {
    10000
}

fn default_navigation_ms() -> u64 {
    60000
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_post_navigation_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    #[serde(default = "default_login_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_login_paths")]
    pub login_paths: Vec<String>,
    #[serde(default = "default_email_selectors")]
    pub email_selectors: Vec<String>,
    #[serde(default = "default_password_selectors")]
    pub password_selectors: Vec<String>,
    #[serde(default = "default_post_login_indicators")]
    pub post_login_indicators: Vec<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
            settle_ms: default_login_settle_ms(),
            login_paths: default_login_paths(),
            email_selectors: default_email_selectors(),
            password_selectors: default_password_selectors(),
            post_login_indicators: default_post_login_indicators(),
        }
    }
}

impl LoginConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_wait_ms() -> u64 {
    300_000
}

fn default_login_settle_ms() -> u64 {
    2000
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_login_paths() -> Vec<String> {
    strings(&["/login", "/signin", "/auth", "/sign-in", "/log-in"])
}

fn default_email_selectors() -> Vec<String> {
    strings(&[
        r#"input[type="email"]"#,
        r#"input[name*="email" i]"#,
        r#"input[name*="username" i]"#,
        r#"input[id*="email" i]"#,
        r#"input[id*="username" i]"#,
        r#"input[placeholder*="email" i]"#,
        r#"input[placeholder*="username" i]"#,
    ])
}

fn default_password_selectors() -> Vec<String> {
    strings(&[
        r#"input[type="password"]"#,
        r#"input[name*="password" i]"#,
        r#"input[id*="password" i]"#,
        r#"input[placeholder*="password" i]"#,
    ])
}

fn default_post_login_indicators() -> Vec<String> {
    strings(&[
        r#"[data-test*="dashboard" i]"#,
        r#"[data-test*="sidebar" i]"#,
        r#"[data-test*="workspace" i]"#,
        r#"[class*="dashboard" i]"#,
        r#"[class*="sidebar" i]"#,
        "nav",
        "aside",
        r#"[aria-label*="menu" i]"#,
        r#"[aria-label*="navigation" i]"#,
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Verb -> interchangeable button labels, tried in order.
    #[serde(default = "default_synonyms")]
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// Elements left of this fraction of the viewport count as sidebar.
    #[serde(default = "default_sidebar_fraction")]
    pub sidebar_fraction: f32,
    #[serde(default = "default_viewport_width")]
    pub default_viewport_width: f32,
    /// Words that keep fallback strategies away from a candidate.
    #[serde(default = "default_destructive_words")]
    pub destructive_words: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            synonyms: default_synonyms(),
            sidebar_fraction: default_sidebar_fraction(),
            default_viewport_width: default_viewport_width(),
            destructive_words: default_destructive_words(),
        }
    }
}

fn default_synonyms() -> BTreeMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        (
            "create",
            &[
                "save", "submit", "add", "confirm", "done", "finish", "apply", "ok", "continue",
                "next", "send", "post", "publish",
            ],
        ),
        (
            "save",
            &[
                "create", "submit", "update", "confirm", "done", "finish", "apply", "ok",
                "continue", "next",
            ],
        ),
        (
            "submit",
            &[
                "create", "save", "confirm", "done", "finish", "apply", "ok", "continue", "next",
                "send",
            ],
        ),
        ("add", &["create", "new", "insert", "plus"]),
        ("new", &["create", "add", "new"]),
        ("edit", &["update", "modify", "change", "save"]),
        ("update", &["save", "submit", "confirm", "apply"]),
        ("delete", &["remove", "trash", "archive"]),
        ("cancel", &["close", "dismiss", "back"]),
        ("confirm", &["save", "submit", "ok", "yes", "accept"]),
    ];
    table
        .iter()
        .map(|(verb, alts)| (verb.to_string(), strings(alts)))
        .collect()
}

fn default_sidebar_fraction() -> f32 {
    0.3
}

fn default_viewport_width() -> f32 {
    1920.0
}

fn default_destructive_words() -> Vec<String> {
    strings(&["delete", "remove", "cancel", "close", "back", "draft", "discard"])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Upper bound on step entries per run, guarding against branch cycles.
    #[serde(default = "default_max_transitions")]
    pub max_transitions: usize,
    /// Pause after the last step so the final state can be inspected.
    #[serde(default)]
    pub final_pause_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_transitions: default_max_transitions(),
            final_pause_ms: 0,
        }
    }
}

fn default_max_transitions() -> usize {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    #[serde(default = "default_true")]
    pub full_page: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            screenshot_dir: default_screenshot_dir(),
            full_page: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("./screenshots")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            temperature: default_temperature(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.3
}
