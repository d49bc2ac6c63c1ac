//! Resolution of `text=...` targets.
//!
//! Plans name buttons by the label a human would expect ("Create project"),
//! which often differs from what the app renders ("Save"). Strategies are
//! tried from most to least literal; within a strategy candidates are tried
//! in order until one accepts the click.

use super::{contains_word, words, ResolutionError};
use crate::config::{ResolverConfig, TimeoutConfig};
use crate::driver::{PageDriver, POLL_INTERVAL};
use crate::fields::scoped_selector;
use navplan_common::page::normalize_text;
use navplan_common::{DriverError, ElementInfo};
use regex::RegexBuilder;

const BUTTONS: &str = r#"button, [role="button"]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStrategy {
    Exact,
    Synonym,
    Partial,
    ButtonPartial,
    VisibleAncestor,
    RoleName,
}

pub const TEXT_STRATEGIES: [TextStrategy; 6] = [
    TextStrategy::Exact,
    TextStrategy::Synonym,
    TextStrategy::Partial,
    TextStrategy::ButtonPartial,
    TextStrategy::VisibleAncestor,
    TextStrategy::RoleName,
];

impl TextStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            TextStrategy::Exact => "exact",
            TextStrategy::Synonym => "synonym",
            TextStrategy::Partial => "partial",
            TextStrategy::ButtonPartial => "button-partial",
            TextStrategy::VisibleAncestor => "visible-ancestor",
            TextStrategy::RoleName => "role-name",
        }
    }
}

/// An element that accepted the click, and how it was found.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub element: ElementInfo,
    pub strategy: &'static str,
}

pub struct TextResolver<'a> {
    config: &'a ResolverConfig,
    timeouts: &'a TimeoutConfig,
}

impl<'a> TextResolver<'a> {
    pub fn new(config: &'a ResolverConfig, timeouts: &'a TimeoutConfig) -> Self {
        Self { config, timeouts }
    }

    /// Click the element best matching `phrase`.
    ///
    /// With a `scope`, buttons inside that container are tried first.
    pub async fn click<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        phrase: &str,
        scope: Option<&str>,
    ) -> Result<Resolved, ResolutionError> {
        let mut attempted = Vec::new();

        if let Some(scope) = scope {
            attempted.push("scoped");
            let candidates = self.scoped_candidates(driver, scope, phrase).await?;
            if let Some(element) = try_click(driver, candidates).await? {
                return Ok(Resolved {
                    element,
                    strategy: "scoped",
                });
            }
        }

        for strategy in TEXT_STRATEGIES {
            attempted.push(strategy.name());
            let candidates = self.candidates(driver, strategy, phrase).await?;
            if candidates.is_empty() {
                continue;
            }
            if let Some(element) = try_click(driver, candidates).await? {
                if strategy != TextStrategy::Exact {
                    tracing::info!(
                        "Clicked '{}' for '{}' via {} match",
                        element.text.trim(),
                        phrase,
                        strategy.name()
                    );
                }
                return Ok(Resolved {
                    element,
                    strategy: strategy.name(),
                });
            }
        }

        Err(ResolutionError::Exhausted {
            target: format!("text={}", phrase),
            attempted,
        })
    }

    /// Presence check without clicking: exact visible match, then first visible partial.
    pub async fn find<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        phrase: &str,
    ) -> Result<Option<ElementInfo>, DriverError> {
        let wanted = normalize_text(phrase);
        let visible: Vec<ElementInfo> = lenient(driver.locate_text(phrase).await)?
            .into_iter()
            .filter(|e| e.visible)
            .collect();
        if let Some(exact) = visible.iter().find(|e| e.normalized_text() == wanted) {
            return Ok(Some(exact.clone()));
        }
        Ok(visible.into_iter().next())
    }

    /// Candidates produced by a single strategy, best first.
    pub async fn candidates<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        strategy: TextStrategy,
        phrase: &str,
    ) -> Result<Vec<ElementInfo>, DriverError> {
        let wanted = normalize_text(phrase);
        let found = match strategy {
            TextStrategy::Exact => return self.exact(driver, phrase, &wanted).await,
            TextStrategy::Synonym => {
                let buttons = visible_buttons(driver).await?;
                let mut out: Vec<ElementInfo> = Vec::new();
                for synonym in self.synonyms_for(phrase) {
                    for button in &buttons {
                        let text = button.normalized_text();
                        let hit = text == synonym || text.contains(synonym.as_str());
                        if hit && !out.iter().any(|o| o.handle == button.handle) {
                            out.push(button.clone());
                        }
                    }
                }
                out
            }
            TextStrategy::Partial => lenient(driver.locate_text(phrase).await)?
                .into_iter()
                .filter(|e| e.visible)
                .collect(),
            TextStrategy::ButtonPartial => visible_buttons(driver)
                .await?
                .into_iter()
                .filter(|b| b.normalized_text().contains(&wanted))
                .collect(),
            TextStrategy::VisibleAncestor => {
                let hidden: Vec<ElementInfo> = lenient(driver.locate_text(phrase).await)?
                    .into_iter()
                    .filter(|e| !e.visible && !self.is_excluded(e, &wanted))
                    .collect();
                let mut out = Vec::new();
                for element in hidden {
                    match driver.visible_ancestor(element.handle).await {
                        Ok(Some(ancestor)) => out.push(ancestor),
                        Ok(None) => {}
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => tracing::debug!("No visible ancestor for {}: {}", element.handle, e),
                    }
                }
                return Ok(out);
            }
            TextStrategy::RoleName => {
                let Ok(pattern) = RegexBuilder::new(&regex::escape(phrase.trim()))
                    .case_insensitive(true)
                    .build()
                else {
                    return Ok(Vec::new());
                };
                visible_buttons(driver)
                    .await?
                    .into_iter()
                    .filter(|b| pattern.is_match(b.accessible_name()))
                    .collect()
            }
        };

        Ok(found
            .into_iter()
            .filter(|e| !self.is_excluded(e, &wanted))
            .collect())
    }

    /// Alternative labels for the verb in `phrase`.
    ///
    /// A phrase that is itself a verb wins; otherwise the first verb appearing
    /// as a whole word in the phrase is used.
    pub fn synonyms_for(&self, phrase: &str) -> Vec<String> {
        let wanted = normalize_text(phrase);
        if let Some(list) = self.config.synonyms.get(&wanted) {
            return list.clone();
        }
        for (verb, list) in &self.config.synonyms {
            if contains_word(&wanted, verb) {
                return list.clone();
            }
        }
        Vec::new()
    }

    /// Fallback matches must not land on a destructive control the phrase did not ask for.
    pub fn is_excluded(&self, element: &ElementInfo, wanted: &str) -> bool {
        let label = element.combined_text();
        self.config
            .destructive_words
            .iter()
            .any(|word| contains_word(&label, word) && !contains_word(wanted, word))
    }

    async fn exact<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        phrase: &str,
        wanted: &str,
    ) -> Result<Vec<ElementInfo>, DriverError> {
        let attempts = (self.timeouts.exact_match_ms / POLL_INTERVAL.as_millis() as u64).max(1);
        for attempt in 0..attempts {
            let matches: Vec<ElementInfo> = lenient(driver.locate_text(phrase).await)?
                .into_iter()
                .filter(|e| e.visible && e.normalized_text() == wanted)
                .collect();
            if !matches.is_empty() {
                return Ok(matches);
            }
            if attempt + 1 < attempts {
                driver.pause(POLL_INTERVAL).await;
            }
        }
        Ok(Vec::new())
    }

    async fn scoped_candidates<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        scope: &str,
        phrase: &str,
    ) -> Result<Vec<ElementInfo>, DriverError> {
        let wanted = normalize_text(phrase);
        let selector = scoped_selector(scope, BUTTONS);
        let buttons = lenient(driver.locate(&selector).await)?;
        let mut matching: Vec<ElementInfo> = buttons
            .into_iter()
            .filter(|b| b.visible)
            .filter(|b| {
                let text = b.normalized_text();
                text.contains(&wanted) && !contains_word(&text, "draft")
            })
            .collect();
        matching.sort_by_key(|b| b.normalized_text() != wanted);
        Ok(matching)
    }
}

/// Click candidates in order; the first that accepts wins.
pub(crate) async fn try_click<D: PageDriver + ?Sized>(
    driver: &mut D,
    candidates: Vec<ElementInfo>,
) -> Result<Option<ElementInfo>, DriverError> {
    for candidate in candidates {
        match driver.click(candidate.handle).await {
            Ok(()) => return Ok(Some(candidate)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!("Click on {} rejected: {}", candidate.handle, e),
        }
    }
    Ok(None)
}

pub(crate) async fn visible_buttons<D: PageDriver + ?Sized>(
    driver: &mut D,
) -> Result<Vec<ElementInfo>, DriverError> {
    Ok(lenient(driver.locate(BUTTONS).await)?
        .into_iter()
        .filter(|b| b.visible)
        .collect())
}

/// Non-fatal query failures count as "nothing found".
pub(crate) fn lenient(found: Result<Vec<ElementInfo>, DriverError>) -> Result<Vec<ElementInfo>, DriverError> {
    match found {
        Ok(elements) => Ok(elements),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!("Query failed, treating as empty: {}", e);
            Ok(Vec::new())
        }
    }
}

/// Lowercased words longer than two characters.
pub(crate) fn significant_words(text: &str) -> Vec<String> {
    words(&text.to_lowercase())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}
