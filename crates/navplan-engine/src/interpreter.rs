//! Executes a single parsed plan action against the page.

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::driver::{find_visible, wait_for_any, PageDriver, Probe, POLL_INTERVAL};
use crate::error::ActionError;
use crate::fields::{allocate, fill_field, scoped_selector, FieldRequest, FIELD_SELECTOR, SCOPES};
use crate::login::{is_login_goal, LoginHandshake};
use crate::resolution::text::{lenient, try_click, visible_buttons};
use crate::resolution::{contains_word, ResolutionError, SymbolContext, SymbolResolver, TextResolver};
use crate::url_state::UrlState;
use navplan_common::page::normalize_text;
use navplan_common::{DriverError, ElementInfo};
use navplan_parser::{Action, ParseError, Target};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Labels a bare Enter is translated into, in order.
const SUBMIT_LABELS: &[&str] = &[
    "Create", "Submit", "Save", "Add", "Confirm", "Done", "Finish", "Apply", "OK", "Continue",
    "Next", "Send",
];

/// Single-letter app shortcuts and the button verbs they stand for.
const SHORTCUTS: &[(&str, &[&str])] = &[
    ("c", &["create", "add", "new"]),
    ("n", &["new", "create"]),
    ("a", &["add"]),
    ("s", &["save", "submit"]),
    ("e", &["edit"]),
    ("d", &["delete"]),
    ("f", &["find", "search"]),
];

/// Verbs whose click is expected to commit something and move the app on.
const COMMIT_VERBS: &[&str] = &[
    "create", "save", "submit", "add", "confirm", "send", "post", "publish",
];

/// Keywords in a raw selector that name the button it was meant to hit.
const SELECTOR_KEYWORDS: &[&str] = &[
    "create", "save", "submit", "add", "new", "confirm", "continue", "next", "done", "send",
];

const FORM_SURFACE: &str = r#"[role="dialog"], [role="modal"], form"#;

static SELECTOR_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:has-text|text)\(\s*["']([^"']+)["']\s*\)|aria-label\*?=\s*["']([^"']+)["']"#)
        .unwrap()
});

/// What the runner should do after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    /// Leave the current step and jump to the step with this number.
    BranchTo(u32),
    ConditionFalse,
    /// An `if_visible` guard failed; skip the next action.
    SkipNext,
}

/// Where in the plan an action sits.
#[derive(Debug, Clone, Copy)]
pub struct StepScope<'a> {
    pub number: u32,
    pub goal: &'a str,
    pub action_index: usize,
}

pub struct ActionInterpreter<'a> {
    config: &'a EngineConfig,
}

impl<'a> ActionInterpreter<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn text_resolver(&self) -> TextResolver<'a> {
        TextResolver::new(&self.config.resolver, &self.config.timeouts)
    }

    pub fn symbol_resolver(&self) -> SymbolResolver<'a> {
        SymbolResolver::new(&self.config.resolver, self.config.timeouts.settle())
    }

    pub fn login(&self) -> LoginHandshake<'a> {
        LoginHandshake::new(&self.config.login)
    }

    /// Substitute credentials into `raw` and parse it.
    pub fn prepare(&self, raw: &str, ctx: &ExecutionContext) -> Result<Action, ParseError> {
        navplan_parser::process(raw, &ctx.credentials)
    }

    pub async fn execute<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
        action: &Action,
    ) -> Result<Signal, ActionError> {
        let signal = match action {
            Action::Navigate { url } => self.navigate(driver, ctx, scope, url).await?,
            Action::WaitReady => self.wait_ready(driver).await?,
            Action::WaitFor { target } => {
                let timeout = self.config.timeouts.wait();
                if self.wait_for_target(driver, target, timeout).await?.is_none() {
                    self.wait_fallback(driver, target).await?;
                }
                Signal::Continue
            }
            Action::WaitForEither { first, second } => {
                let probes: Vec<Probe<'_>> = probes_for(first)
                    .into_iter()
                    .chain(probes_for(second))
                    .collect();
                let timeout = self.config.timeouts.wait();
                if wait_for_any(driver, &probes, timeout).await?.is_none() {
                    tracing::warn!("Neither {} nor {} appeared", first, second);
                }
                if mentions_login(first) || mentions_login(second) {
                    self.login_if_needed(driver, ctx, scope).await?;
                }
                Signal::Continue
            }
            Action::WaitUrlChange { pattern } => {
                self.wait_url_change(driver, pattern.as_deref()).await?
            }
            Action::IfExists { target, step, .. } => {
                let found = self.exists(driver, ctx, scope, target).await?;
                ctx.last_condition = Some(found.is_some());
                tracing::info!("Condition {} exists: {}", target, found.is_some());
                match found {
                    Some(element) => {
                        // A matching control doubles as the way forward.
                        if try_click(driver, vec![element]).await?.is_some() {
                            tracing::info!("Clicked detected {}", target);
                            driver.pause(self.config.timeouts.settle()).await;
                            self.capture_after(driver, ctx, scope, "click").await?;
                        }
                        Signal::BranchTo(*step)
                    }
                    None => Signal::ConditionFalse,
                }
            }
            Action::IfUrlContains { pattern, step } => {
                let url = driver.current_url().await?.to_lowercase();
                let found = url.contains(&pattern.to_lowercase());
                ctx.last_condition = Some(found);
                if found {
                    Signal::BranchTo(*step)
                } else {
                    Signal::ConditionFalse
                }
            }
            Action::IfVisible { target } => {
                let found = self.exists(driver, ctx, scope, target).await?.is_some();
                ctx.last_condition = Some(found);
                if found && mentions_login(target) {
                    self.login_if_needed(driver, ctx, scope).await?;
                }
                if found { Signal::Continue } else { Signal::SkipNext }
            }
            Action::Else { step } => match (ctx.last_condition.take(), step) {
                (Some(false), Some(target)) => Signal::BranchTo(*target),
                (Some(false), None) | (Some(true), _) => Signal::Continue,
                (None, _) => {
                    tracing::warn!("'else' without a preceding condition, ignoring");
                    Signal::Continue
                }
            },
            Action::Type { target, text } => {
                self.type_into(driver, ctx, target, text).await?;
                Signal::Continue
            }
            Action::Click { target } => {
                self.click(driver, ctx, scope, target).await?;
                Signal::Continue
            }
            Action::Press { key } => {
                self.press(driver, key).await?;
                Signal::Continue
            }
            Action::Assert { target } => {
                let timeout = self.config.timeouts.wait();
                if self.wait_for_target(driver, target, timeout).await?.is_none() {
                    return Err(ActionError::AssertionFailed(target.to_string()));
                }
                Signal::Continue
            }
            Action::Comment(_) => return Ok(Signal::Continue),
        };

        if signal == Signal::Continue && !action.is_conditional() && !matches!(action, Action::Else { .. }) {
            self.capture_after(driver, ctx, scope, action.kind()).await?;
        }
        Ok(signal)
    }

    async fn navigate<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
        url: &str,
    ) -> Result<Signal, ActionError> {
        tracing::info!("Navigating to: {}", url);
        match driver.navigate(url, self.config.timeouts.navigation()).await {
            Ok(()) => {}
            Err(DriverError::Timeout(what)) => {
                tracing::warn!("Navigation timed out ({}), continuing with partial load", what)
            }
            Err(e) => return Err(e.into()),
        }
        driver.pause(self.config.timeouts.post_navigation()).await;
        self.login_if_needed(driver, ctx, scope).await?;
        Ok(Signal::Continue)
    }

    /// Hand over to the person at the keyboard when a login page is showing.
    async fn login_if_needed<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
    ) -> Result<(), DriverError> {
        if ctx.login_completed() {
            return Ok(());
        }
        let login = self.login();
        if login.is_login_page(driver).await? {
            login.run(driver, ctx, scope.number, scope.goal).await?;
        }
        Ok(())
    }

    async fn wait_ready<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<Signal, ActionError> {
        match driver.wait_for_load(self.config.timeouts.wait()).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => tracing::warn!("Page did not settle: {}", e),
        }
        driver.pause(self.config.timeouts.settle()).await;
        Ok(Signal::Continue)
    }

    async fn wait_url_change<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        pattern: Option<&str>,
    ) -> Result<Signal, ActionError> {
        let start = driver.current_url().await?;
        let attempts = (self.config.timeouts.wait_ms / POLL_INTERVAL.as_millis() as u64).max(1);
        for _ in 0..attempts {
            driver.pause(POLL_INTERVAL).await;
            let url = driver.current_url().await?;
            let changed = match pattern {
                Some(p) => url.contains(p),
                None => url != start,
            };
            if changed {
                tracing::info!("URL changed to {}", url);
                return Ok(Signal::Continue);
            }
        }
        tracing::warn!("URL did not change from {}", start);
        Ok(Signal::Continue)
    }

    async fn wait_for_target<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        target: &Target,
        timeout: Duration,
    ) -> Result<Option<ElementInfo>, DriverError> {
        let probes = probes_for(target);
        Ok(wait_for_any(driver, &probes, timeout)
            .await?
            .map(|(_, element)| element))
    }

    /// Field waits retry inside dialogs and forms, then settle for any text field.
    /// Other misses just give the page a moment.
    async fn wait_fallback<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        target: &Target,
    ) -> Result<(), DriverError> {
        if let Target::Selector(selector) = target {
            if is_field_selector(selector) {
                let mut selectors: Vec<String> = SCOPES
                    .iter()
                    .filter(|s| !s.is_empty())
                    .map(|s| scoped_selector(s, selector))
                    .collect();
                selectors.push(FIELD_SELECTOR.to_string());
                let probes: Vec<Probe<'_>> = selectors.iter().map(|s| Probe::Css(s)).collect();
                let found = wait_for_any(driver, &probes, self.config.timeouts.click()).await?;
                match found {
                    Some((index, _)) => {
                        tracing::info!("{} appeared as {}", target, selectors[index])
                    }
                    None => tracing::warn!("No field for {} appeared", target),
                }
                return Ok(());
            }
        }
        tracing::warn!("{} did not appear, letting the page settle", target);
        driver.pause(self.config.timeouts.settle()).await;
        Ok(())
    }

    /// Presence check used by the conditional actions.
    async fn exists<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
        target: &Target,
    ) -> Result<Option<ElementInfo>, DriverError> {
        match target {
            Target::Text { phrase, .. } => {
                let found = self.text_resolver().find(driver, phrase).await?;
                ctx.last_failed_text = match found {
                    Some(_) => None,
                    None => Some(phrase.clone()),
                };
                Ok(found)
            }
            Target::Symbol(symbol) => {
                let context = self.symbol_context(driver, ctx, scope, symbol).await?;
                self.symbol_resolver().find(driver, symbol, &context).await
            }
            Target::Selector(selector) => find_visible(driver, Probe::Css(selector)).await,
            Target::AnyOf(alternatives) => {
                for alternative in alternatives {
                    if let Some(found) = Box::pin(self.exists(driver, ctx, scope, alternative)).await? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
        }
    }

    async fn symbol_context<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
        symbol: &str,
    ) -> Result<SymbolContext, DriverError> {
        let url = UrlState::from_url(&driver.current_url().await?);
        let failed = ctx.last_failed_text.take();
        SymbolContext::gather(driver, symbol, scope.goal, failed.as_deref(), &url).await
    }

    async fn click<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
        target: &Target,
    ) -> Result<(), ActionError> {
        let before = driver.current_url().await?;
        self.click_target(driver, ctx, scope, target).await?;
        driver.pause(self.config.timeouts.settle()).await;

        let label = normalize_text(&target.to_string());
        if COMMIT_VERBS.iter().any(|verb| contains_word(&label, verb)) {
            let after = driver.current_url().await?;
            if after != before {
                let state = UrlState::from_url(&after);
                tracing::info!("Click navigated to {} ({:?})", after, state.active_flags());
            } else {
                tracing::info!("URL unchanged after {}", target);
            }
        } else if find_visible(driver, Probe::Css(FORM_SURFACE)).await?.is_none() {
            // Menus and "New ..." buttons open their form asynchronously.
            let short = self.config.timeouts.settle();
            if wait_for_any(driver, &[Probe::Css(FORM_SURFACE)], short).await?.is_some() {
                tracing::debug!("Form or dialog appeared after {}", target);
            }
        }
        Ok(())
    }

    async fn click_target<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
        target: &Target,
    ) -> Result<(), ActionError> {
        match target {
            Target::Text { phrase, scope: container } => {
                match self
                    .text_resolver()
                    .click(driver, phrase, container.as_deref())
                    .await
                {
                    Ok(_) => {
                        ctx.last_failed_text = None;
                        Ok(())
                    }
                    Err(e) => {
                        ctx.last_failed_text = Some(phrase.clone());
                        Err(e.into())
                    }
                }
            }
            Target::Symbol(symbol) => {
                let context = self.symbol_context(driver, ctx, scope, symbol).await?;
                self.symbol_resolver()
                    .activate(driver, symbol, &context)
                    .await?;
                Ok(())
            }
            Target::Selector(selector) => self.click_selector(driver, selector).await,
            Target::AnyOf(alternatives) => {
                let mut last_error = None;
                for alternative in alternatives {
                    match Box::pin(self.click_target(driver, ctx, scope, alternative)).await {
                        Ok(()) => return Ok(()),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => last_error = Some(e),
                    }
                }
                Err(last_error.unwrap_or_else(|| {
                    ActionError::Resolution(ResolutionError::Exhausted {
                        target: target.to_string(),
                        attempted: Vec::new(),
                    })
                }))
            }
        }
    }

    async fn click_selector<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        selector: &str,
    ) -> Result<(), ActionError> {
        let timeout = self.config.timeouts.click();
        if let Some(element) = wait_for_any(driver, &[Probe::Css(selector)], timeout)
            .await?
            .map(|(_, e)| e)
        {
            if try_click(driver, vec![element]).await?.is_some() {
                return Ok(());
            }
        }

        let mut attempted = vec!["selector"];
        if let Some(caps) = SELECTOR_TEXT.captures(selector) {
            if let Some(label) = caps.get(1).or_else(|| caps.get(2)) {
                tracing::info!("Selector {} not clickable, trying text '{}'", selector, label.as_str());
                self.text_resolver().click(driver, label.as_str(), None).await?;
                return Ok(());
            }
        }

        let lowered = selector.to_lowercase();
        if is_field_selector(&lowered) {
            attempted.push("first-field");
            let fields: Vec<ElementInfo> = lenient(driver.locate(FIELD_SELECTOR).await)?
                .into_iter()
                .filter(|f| f.visible)
                .take(1)
                .collect();
            if try_click(driver, fields).await?.is_some() {
                tracing::info!("Selector {} fell back to the first text field", selector);
                return Ok(());
            }
        }

        if let Some(keyword) = SELECTOR_KEYWORDS.iter().find(|k| lowered.contains(*k)) {
            attempted.push("keyword-button");
            let resolver = self.text_resolver();
            let buttons: Vec<ElementInfo> = visible_buttons(driver)
                .await?
                .into_iter()
                .filter(|b| b.normalized_text().contains(keyword))
                .filter(|b| !resolver.is_excluded(b, keyword))
                .collect();
            if let Some(button) = try_click(driver, buttons).await? {
                tracing::info!("Selector {} fell back to '{}' button", selector, button.text.trim());
                return Ok(());
            }
        }

        if lowered.contains("button") || lowered.contains("submit") {
            attempted.push("first-button");
            let first: Vec<ElementInfo> = visible_buttons(driver).await?.into_iter().take(1).collect();
            if try_click(driver, first).await?.is_some() {
                tracing::info!("Selector {} fell back to the first button", selector);
                return Ok(());
            }
            attempted.push("enter");
            driver.press_key("Enter").await?;
            tracing::info!("Selector {} fell back to pressing Enter", selector);
            return Ok(());
        }

        Err(ResolutionError::Exhausted {
            target: selector.to_string(),
            attempted,
        }
        .into())
    }

    async fn type_into<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        target: &Target,
        value: &str,
    ) -> Result<(), ActionError> {
        tracing::info!("Typing into {}", target);

        if let Some(field) = self.direct_field(driver, ctx, target).await? {
            fill_field(driver, &field, value, &mut ctx.used_fields).await?;
            return Ok(());
        }

        let request = FieldRequest::new(&target.to_string(), value);
        match allocate(driver, &request, &ctx.used_fields).await? {
            Some(field) => {
                tracing::debug!("Allocated {} field for {}", field.tag, target);
                fill_field(driver, &field, value, &mut ctx.used_fields).await?;
                Ok(())
            }
            None => Err(ActionError::TypeFailed(target.to_string())),
        }
    }

    /// A field the target names directly, skipping ones already filled.
    async fn direct_field<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &ExecutionContext,
        target: &Target,
    ) -> Result<Option<ElementInfo>, DriverError> {
        match target {
            Target::Selector(selector) => Ok(lenient(driver.locate(selector).await)?
                .into_iter()
                .find(|f| f.visible && !ctx.used_fields.contains(f))),
            Target::Text { phrase, .. } => {
                let wanted = normalize_text(phrase);
                Ok(lenient(driver.locate(FIELD_SELECTOR).await)?
                    .into_iter()
                    .filter(|f| f.visible && !ctx.used_fields.contains(f))
                    .find(|f| f.field_labels().any(|l| normalize_text(l).contains(&wanted))))
            }
            Target::Symbol(_) => Ok(None),
            Target::AnyOf(alternatives) => {
                for alternative in alternatives {
                    if let Some(field) = Box::pin(self.direct_field(driver, ctx, alternative)).await? {
                        return Ok(Some(field));
                    }
                }
                Ok(None)
            }
        }
    }

    async fn press<D: PageDriver + ?Sized>(&self, driver: &mut D, key: &str) -> Result<(), ActionError> {
        if key.eq_ignore_ascii_case("enter") {
            if self.submit_by_button(driver).await? {
                return Ok(());
            }
            driver.press_key("Enter").await?;
            return Ok(());
        }

        let lowered = key.to_lowercase();
        if let Some((_, verbs)) = SHORTCUTS.iter().find(|(k, _)| *k == lowered) {
            let buttons: Vec<ElementInfo> = visible_buttons(driver)
                .await?
                .into_iter()
                .filter(|b| {
                    let label = b.combined_text();
                    verbs.iter().any(|verb| contains_word(&label, verb))
                })
                .collect();
            if let Some(button) = try_click(driver, buttons).await? {
                tracing::info!("Shortcut '{}' mapped to '{}' button", key, button.text.trim());
                return Ok(());
            }
            tracing::info!("Pressing shortcut '{}' ({})", key, verbs.join("/"));
        }
        driver.press_key(key).await?;
        Ok(())
    }

    /// Enter in a form usually means "press the primary button"; do that when one is visible.
    async fn submit_by_button<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<bool, DriverError> {
        let buttons = visible_buttons(driver).await?;
        for label in SUBMIT_LABELS {
            let wanted = label.to_lowercase();
            let matching: Vec<ElementInfo> = buttons
                .iter()
                .filter(|b| b.normalized_text() == wanted)
                .cloned()
                .collect();
            if let Some(button) = try_click(driver, matching).await? {
                tracing::info!("Enter mapped to '{}' button", button.text.trim());
                return Ok(true);
            }
        }

        if let Some(submit) = find_visible(driver, Probe::Css(r#"button[type="submit"]"#)).await? {
            if try_click(driver, vec![submit]).await?.is_some() {
                tracing::info!("Enter mapped to submit button");
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn capture_after<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        scope: StepScope<'_>,
        kind: &str,
    ) -> Result<(), DriverError> {
        if !ctx.artifacts.is_enabled() || is_login_goal(scope.goal) {
            return Ok(());
        }
        if !ctx.login_completed() && self.login().is_login_page(driver).await? {
            return Ok(());
        }
        driver.pause(Duration::from_millis(300)).await;
        let label = format!("after_{}_{}", kind, scope.action_index + 1);
        ctx.artifacts
            .capture(driver, scope.number, scope.goal, Some(label.as_str()))
            .await;
        Ok(())
    }
}

fn is_field_selector(selector: &str) -> bool {
    let lowered = selector.to_lowercase();
    lowered.contains("input") || lowered.contains("textarea")
}

fn mentions_login(target: &Target) -> bool {
    let label = target.to_string().to_lowercase();
    ["login", "log in", "signin", "sign in", "sign-in"]
        .iter()
        .any(|k| label.contains(k))
}

/// Wait probes for a target; symbols are looked up as text.
fn probes_for(target: &Target) -> Vec<Probe<'_>> {
    match target {
        Target::Text { phrase, .. } => vec![Probe::Text(phrase)],
        Target::Symbol(symbol) => vec![Probe::Text(symbol)],
        Target::Selector(selector) => vec![Probe::Css(selector)],
        Target::AnyOf(alternatives) => alternatives.iter().flat_map(probes_for).collect(),
    }
}
