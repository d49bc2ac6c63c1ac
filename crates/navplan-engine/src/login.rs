//! Manual login handshake.
//!
//! The engine never types credentials into a login form on its own. When a
//! login page shows up it captures a screenshot, then waits for a person to
//! sign in and for the app to leave the login page. Login actions in the plan
//! are skipped from then on.

use crate::config::LoginConfig;
use crate::context::{ExecutionContext, LoginState};
use crate::driver::{find_visible, PageDriver, Probe};
use crate::resolution::TextResolver;
use navplan_common::DriverError;

const LOGIN_AFFORDANCES: &[&str] = &["Log in", "Sign in", "Login"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Completed,
    /// Nobody signed in before the deadline; the run carries on regardless.
    TimedOut,
}

/// Goals that describe signing in.
pub fn is_login_goal(goal: &str) -> bool {
    let goal = goal.to_lowercase();
    ["login", "log in", "sign in"].iter().any(|k| goal.contains(k))
}

/// Whether a raw, unsubstituted action line is part of a login flow.
pub fn is_login_action(action: &str, goal: &str) -> bool {
    let action = action.to_lowercase().replace('\'', "\"");
    let login_step = is_login_goal(goal);

    if action.contains("<password>")
        || action.contains("type=\"password\"")
        || action.contains("[name*=\"password\"")
    {
        return true;
    }

    let has_placeholder = action.contains("<email>") || action.contains("<username>");
    let email_input = action.contains("type=\"email\"") || action.contains("<email>");
    if email_input {
        if login_step || has_placeholder {
            return true;
        }
        let bare = action.starts_with("type(")
            && !action.contains("form")
            && !action.contains("textarea");
        if bare {
            return true;
        }
    }

    if login_step && action.contains("button[type=\"submit\"]") {
        return true;
    }

    if login_step && action.starts_with("click(") {
        return ["text=log in", "text=sign in", "text=login", "sign in", "log in"]
            .iter()
            .any(|k| action.contains(k));
    }

    false
}

pub struct LoginHandshake<'a> {
    config: &'a LoginConfig,
}

impl<'a> LoginHandshake<'a> {
    pub fn new(config: &'a LoginConfig) -> Self {
        Self { config }
    }

    /// URL heuristics first; otherwise a visible email/username input next to a
    /// visible password input.
    pub async fn is_login_page<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> Result<bool, DriverError> {
        let url = driver.current_url().await?.to_lowercase();
        if self.config.login_paths.iter().any(|p| url.contains(p.as_str())) {
            return Ok(true);
        }
        if !self.any_visible(driver, &self.config.email_selectors).await? {
            return Ok(false);
        }
        self.any_visible(driver, &self.config.password_selectors).await
    }

    /// Poll until the user has signed in or the deadline passes.
    pub async fn wait_for_manual_login<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> Result<LoginOutcome, DriverError> {
        let start_url = driver.current_url().await?;
        let interval = self.config.poll_interval();
        let attempts = (self.config.max_wait_ms / self.config.poll_interval_ms.max(1)).max(1);

        tracing::info!(
            "Waiting up to {}s for manual login (polling every {}ms)",
            self.config.max_wait_ms / 1000,
            self.config.poll_interval_ms
        );

        for _ in 0..attempts {
            driver.pause(interval).await;

            let url = driver.current_url().await?;
            let lowered = url.to_lowercase();
            let left_login_url =
                url != start_url && !lowered.contains("login") && !lowered.contains("signin");
            if left_login_url && !self.is_login_page(driver).await? {
                tracing::info!("Login detected: navigated to {}", url);
                return self.settle(driver).await;
            }

            if self
                .any_visible(driver, &self.config.post_login_indicators)
                .await?
                && !self.is_login_page(driver).await?
            {
                tracing::info!("Login detected: application chrome is visible");
                return self.settle(driver).await;
            }
        }

        tracing::warn!(
            "No login detected within {}s, continuing anyway",
            self.config.max_wait_ms / 1000
        );
        Ok(LoginOutcome::TimedOut)
    }

    /// Full handshake: screenshot the login page, wait, mark login complete.
    pub async fn run<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        step: u32,
        goal: &str,
    ) -> Result<LoginOutcome, DriverError> {
        ctx.login = LoginState::Detected;
        tracing::info!("Login page detected during step {}", step);
        ctx.artifacts
            .capture(driver, step, goal, Some("login_page"))
            .await;

        ctx.login = LoginState::AwaitingManual;
        let outcome = self.wait_for_manual_login(driver).await?;

        ctx.login = LoginState::Completed;
        ctx.skip_remaining_login_actions = true;
        Ok(outcome)
    }

    /// Click a "Log in"/"Sign in" control to reach the login page.
    pub async fn approach<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        resolver: &TextResolver<'_>,
    ) -> Result<bool, DriverError> {
        for label in LOGIN_AFFORDANCES {
            let Some(element) = resolver.find(driver, label).await? else {
                continue;
            };
            match driver.click(element.handle).await {
                Ok(()) => {
                    tracing::info!("Clicked '{}' to reach the login page", label);
                    driver.pause(self.config.settle()).await;
                    return Ok(true);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!("Login affordance '{}' not clickable: {}", label, e),
            }
        }
        Ok(false)
    }

    async fn settle<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<LoginOutcome, DriverError> {
        driver.pause(self.config.settle()).await;
        Ok(LoginOutcome::Completed)
    }

    async fn any_visible<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        selectors: &[String],
    ) -> Result<bool, DriverError> {
        for selector in selectors {
            if find_visible(driver, Probe::Css(selector.as_str())).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
