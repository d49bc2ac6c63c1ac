//! Resolution of bare symbol targets such as `+` or `⚙`.
//!
//! A page usually carries several controls with the same glyph. Candidates are
//! scored against the [`SymbolContext`] and tried best first; literal lookups
//! and keyboard shortcuts follow when scoring finds nothing.

use super::keywords::SymbolContext;
use super::text::{lenient, try_click};
use super::{words, ResolutionError};
use crate::config::ResolverConfig;
use crate::driver::{find_visible, PageDriver, Probe};
use navplan_common::{DriverError, ElementInfo};
use std::collections::BTreeSet;
use std::time::Duration;

const CANDIDATES: &str = r#"button, [role="button"], a"#;
const CLICKABLES: &str = r#"button, [role="button"], a, [role="link"], [onclick]"#;
const LABELLED: &str = "[aria-label], [title]";
const CREATE_VOCABULARY: &[&str] = &["add", "create", "new"];
const CREATE_LABELS: &[&str] = &["add", "create", "new", "plus", "insert"];
const CONFLICTING: &[&str] = &[
    "team",
    "workspace",
    "settings",
    "profile",
    "account",
    "preferences",
];
const CREATE_SHORTCUTS: &[&str] = &["c", "n", "a"];
const CREATION_SURFACE: &str =
    r#"form, [role="dialog"], [role="modal"], input[type="text"], textarea"#;

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub element: ElementInfo,
    pub score: i32,
}

#[derive(Debug, Clone)]
pub enum SymbolOutcome {
    Clicked(ElementInfo),
    /// A keyboard shortcut opened a creation surface instead.
    Shortcut(String),
}

/// Relevance of `element` for `context`. Higher is better.
pub fn score_candidate(
    element: &ElementInfo,
    context: &SymbolContext,
    viewport_width: f32,
    sidebar_fraction: f32,
) -> i32 {
    let combined = element.combined_text();
    let mut score = 0;

    if let Some(intended) = &context.intended {
        if combined.contains(intended.as_str()) {
            score += 50;
        }
        let wanted: BTreeSet<&str> = words(intended).collect();
        if !wanted.is_empty() {
            let present: BTreeSet<&str> = words(&combined).collect();
            let matched = wanted.intersection(&present).count();
            score += (matched as f32 / wanted.len() as f32 * 30.0) as i32;
        }
    }

    for keyword in &context.keywords {
        if combined.contains(keyword.as_str()) {
            score += 10;
        }
    }

    if element.rect.x > viewport_width * sidebar_fraction {
        score += 5;
    }

    let in_context = context.keywords.is_empty()
        || context.keywords.iter().any(|k| combined.contains(k.as_str()));
    if in_context {
        for word in CREATE_VOCABULARY {
            if combined.contains(word) {
                score += 3;
            }
        }
    }

    if !context.keywords.is_empty() {
        for word in CONFLICTING {
            if combined.contains(word) && !context.keywords.iter().any(|k| k == word) {
                score -= 5;
            }
        }
    }

    score
}

/// Candidates carrying `symbol` with a positive score, best first.
pub fn rank_candidates(
    elements: Vec<ElementInfo>,
    symbol: &str,
    context: &SymbolContext,
    viewport_width: f32,
    sidebar_fraction: f32,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = elements
        .into_iter()
        .filter(|e| e.visible && e.carries(symbol))
        .map(|element| {
            let score = score_candidate(&element, context, viewport_width, sidebar_fraction);
            ScoredCandidate { element, score }
        })
        .filter(|c| c.score > 0)
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

pub struct SymbolResolver<'a> {
    config: &'a ResolverConfig,
    settle: Duration,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(config: &'a ResolverConfig, settle: Duration) -> Self {
        Self { config, settle }
    }

    /// Scored candidates for `symbol` on the current page.
    pub async fn ranked<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        symbol: &str,
        context: &SymbolContext,
    ) -> Result<Vec<ScoredCandidate>, DriverError> {
        let elements = lenient(driver.locate(CANDIDATES).await)?;
        let width = self.viewport_width(driver).await?;
        let ranked = rank_candidates(elements, symbol, context, width, self.config.sidebar_fraction);
        for candidate in ranked.iter().take(3) {
            tracing::debug!(
                "Symbol '{}' candidate '{}' scored {}",
                symbol,
                candidate.element.combined_text(),
                candidate.score
            );
        }
        Ok(ranked)
    }

    /// Best visible element for `symbol` without clicking it.
    pub async fn find<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        symbol: &str,
        context: &SymbolContext,
    ) -> Result<Option<ElementInfo>, DriverError> {
        if !context.is_empty() {
            if let Some(best) = self.ranked(driver, symbol, context).await?.into_iter().next() {
                return Ok(Some(best.element));
            }
        }
        Ok(lenient(driver.locate(CLICKABLES).await)?
            .into_iter()
            .find(|e| e.visible && e.carries(symbol)))
    }

    /// Activate the control `symbol` most plausibly refers to.
    pub async fn activate<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        symbol: &str,
        context: &SymbolContext,
    ) -> Result<SymbolOutcome, ResolutionError> {
        let mut attempted = Vec::new();

        if !context.is_empty() {
            attempted.push("scored");
            let ranked = self.ranked(driver, symbol, context).await?;
            let candidates = ranked.into_iter().map(|c| c.element).collect();
            if let Some(element) = try_click(driver, candidates).await? {
                tracing::info!("Clicked '{}' for symbol '{}'", element.combined_text(), symbol);
                return Ok(SymbolOutcome::Clicked(element));
            }
        }

        attempted.push("literal");
        let literal = lenient(driver.locate_text(symbol).await)?
            .into_iter()
            .filter(|e| e.visible && e.text.trim() == symbol)
            .collect();
        if let Some(element) = try_click(driver, literal).await? {
            return Ok(SymbolOutcome::Clicked(element));
        }

        attempted.push("containing");
        let containing = lenient(driver.locate(CLICKABLES).await)?
            .into_iter()
            .filter(|e| e.visible && e.text.contains(symbol))
            .collect();
        if let Some(element) = try_click(driver, containing).await? {
            return Ok(SymbolOutcome::Clicked(element));
        }

        if symbol == "+" {
            attempted.push("create-label");
            let labelled = lenient(driver.locate(LABELLED).await)?
                .into_iter()
                .filter(|e| e.visible && (e.is_button_like() || e.is_link()))
                .filter(|e| {
                    let label = format!(
                        "{} {}",
                        e.aria_label.as_deref().unwrap_or(""),
                        e.title.as_deref().unwrap_or("")
                    )
                    .to_lowercase();
                    CREATE_LABELS.iter().any(|w| label.contains(w))
                })
                .collect();
            if let Some(element) = try_click(driver, labelled).await? {
                return Ok(SymbolOutcome::Clicked(element));
            }
        }

        attempted.push("label");
        let labelled = lenient(driver.locate(LABELLED).await)?
            .into_iter()
            .filter(|e| {
                e.visible
                    && (e.aria_label.as_deref().is_some_and(|l| l.contains(symbol))
                        || e.title.as_deref().is_some_and(|t| t.contains(symbol)))
            })
            .collect();
        if let Some(element) = try_click(driver, labelled).await? {
            return Ok(SymbolOutcome::Clicked(element));
        }

        if symbol == "+" {
            attempted.push("shortcut");
            for key in CREATE_SHORTCUTS {
                if let Err(e) = driver.press_key(key).await {
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    continue;
                }
                driver.pause(self.settle).await;
                if find_visible(driver, Probe::Css(CREATION_SURFACE)).await?.is_some() {
                    tracing::info!("Shortcut '{}' opened a creation surface", key);
                    return Ok(SymbolOutcome::Shortcut(key.to_string()));
                }
            }
        }

        Err(ResolutionError::Exhausted {
            target: format!("symbol={}", symbol),
            attempted,
        })
    }

    async fn viewport_width<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<f32, DriverError> {
        match driver.viewport_width().await {
            Ok(width) if width > 0.0 => Ok(width),
            Ok(_) => Ok(self.config.default_viewport_width),
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => Ok(self.config.default_viewport_width),
        }
    }
}
