use super::schema::EngineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Points at a config file outside the usual search locations.
pub const CONFIG_ENV: &str = "NAVPLAN_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve, read and validate the engine config.
    ///
    /// The first existing file among [`ConfigLoader::search_paths`] is used;
    /// with none, defaults apply. `NAVPLAN_*` environment overrides are
    /// layered on top either way.
    pub async fn load(explicit: Option<&Path>) -> Result<EngineConfig, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path).await?,
            None => match Self::discover() {
                Some(path) => Self::load_from(&path).await?,
                None => {
                    tracing::debug!("No config file found, using defaults");
                    EngineConfig::default()
                }
            },
        };
        apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        validate(&config)?;
        Ok(config)
    }

    /// Candidate files in priority order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("./navplan.yaml"));
        paths.push(PathBuf::from("./navplan.yml"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".navplan").join("config.yaml"));
        }
        paths
    }

    fn discover() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.is_file())
    }

    /// Parse a single file. Sections and keys left out keep their defaults.
    pub async fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(EngineConfig::default());
        }
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Environment overrides for the settings people change per run.
pub fn apply_overrides<F>(config: &mut EngineConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("NAVPLAN_SCREENSHOT_DIR") {
        config.artifacts.screenshot_dir = PathBuf::from(dir);
    }
    if let Some(flag) = lookup("NAVPLAN_SCREENSHOTS") {
        config.artifacts.enabled = !matches!(flag.to_lowercase().as_str(), "0" | "false" | "off" | "no");
    }
    if let Some(ms) = lookup("NAVPLAN_LOGIN_WAIT_MS") {
        config.login.max_wait_ms = parse_millis("NAVPLAN_LOGIN_WAIT_MS", &ms)?;
    }
    if let Some(ms) = lookup("NAVPLAN_WAIT_MS") {
        config.timeouts.wait_ms = parse_millis("NAVPLAN_WAIT_MS", &ms)?;
    }
    if let Some(model) = lookup("NAVPLAN_MODEL") {
        config.planner.model = model;
    }
    if let Some(base) = lookup("OPENAI_BASE_URL") {
        config.planner.api_base = base.trim_end_matches('/').to_string();
    }
    Ok(())
}

fn parse_millis(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{}' is not a number of milliseconds ({})", raw, e),
    })
}

/// Reject values the runner cannot work with.
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.login.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid {
            key: "login.poll_interval_ms",
            reason: "must be greater than zero".to_string(),
        });
    }
    if !(0.0..1.0).contains(&config.resolver.sidebar_fraction) {
        return Err(ConfigError::Invalid {
            key: "resolver.sidebar_fraction",
            reason: format!("{} is outside [0, 1)", config.resolver.sidebar_fraction),
        });
    }
    if config.runner.max_transitions == 0 {
        return Err(ConfigError::Invalid {
            key: "runner.max_transitions",
            reason: "must allow at least one step".to_string(),
        });
    }
    Ok(())
}
