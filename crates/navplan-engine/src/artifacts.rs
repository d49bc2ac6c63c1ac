use crate::config::ArtifactConfig;
use crate::driver::PageDriver;
use crate::url_state::UrlState;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

/// A screenshot taken during a run.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub step: u32,
    pub goal: String,
    pub label: Option<String>,
    pub url: String,
    pub url_flags: Vec<String>,
}

/// Collects per-step screenshots under a timestamped run folder.
///
/// Capturing talks to the driver inline; the file write is spawned so a slow
/// disk never stalls the plan.
pub struct ArtifactStore {
    run_dir: Option<PathBuf>,
    full_page: bool,
    captured: Vec<Artifact>,
    pending: Vec<JoinHandle<()>>,
}

impl ArtifactStore {
    pub fn disabled() -> Self {
        Self {
            run_dir: None,
            full_page: false,
            captured: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Create `run_<timestamp>` below the configured screenshot directory.
    pub async fn create(config: &ArtifactConfig) -> std::io::Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let run_dir = config.screenshot_dir.join(format!("run_{}", stamp));
        tokio::fs::create_dir_all(&run_dir).await?;
        tracing::info!("Saving screenshots to {}", run_dir.display());
        Ok(Self {
            run_dir: Some(run_dir),
            full_page: config.full_page,
            captured: Vec::new(),
            pending: Vec::new(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.run_dir.is_some()
    }

    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.captured
    }

    /// Screenshot the page for `step`. Failures are logged, never raised.
    pub async fn capture<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        step: u32,
        goal: &str,
        label: Option<&str>,
    ) -> Option<PathBuf> {
        let run_dir = self.run_dir.clone()?;

        let bytes = match driver.screenshot(self.full_page).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Screenshot for step {} failed: {}", step, e);
                return None;
            }
        };
        let url = driver.current_url().await.unwrap_or_default();
        let state = UrlState::from_url(&url);

        let path = run_dir.join(artifact_file_name(step, goal, label));
        let target = path.clone();
        self.pending.push(tokio::spawn(async move {
            if let Err(e) = tokio::fs::write(&target, bytes).await {
                tracing::warn!("Failed to write {}: {}", target.display(), e);
            }
        }));

        tracing::info!(
            "Captured {} (url flags: {:?})",
            path.display(),
            state.active_flags()
        );
        self.captured.push(Artifact {
            path: path.clone(),
            step,
            goal: goal.to_string(),
            label: label.map(str::to_string),
            url,
            url_flags: state.active_flags().iter().map(|f| f.to_string()).collect(),
        });
        Some(path)
    }

    /// Wait for outstanding writes and hand back everything captured.
    pub async fn finish(&mut self) -> Vec<Artifact> {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                tracing::debug!("Screenshot writer task failed: {}", e);
            }
        }
        self.captured.clone()
    }
}

/// `step_<NN>_<goal>[_<label>].png` with the goal reduced to a filesystem-safe slug.
pub fn artifact_file_name(step: u32, goal: &str, label: Option<&str>) -> String {
    let mut name = format!("step_{:02}_{}", step, slug(goal));
    if let Some(label) = label {
        name.push('_');
        name.push_str(&slug(label));
    }
    name.push_str(".png");
    name
}

fn slug(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let collapsed = mapped
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    collapsed.chars().take(50).collect()
}
