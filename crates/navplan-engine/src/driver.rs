use async_trait::async_trait;
use navplan_common::{DriverError, ElementHandle, ElementInfo};
use std::time::Duration;

/// Poll interval used by the wait helpers below.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The page automation surface the engine drives.
///
/// Implementations wrap a real browser page (see `navplan-h`) or a scripted
/// mock in tests. Every query returns fresh snapshots; handles stay valid only
/// until the page re-renders the element.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Start the browser session.
    async fn launch(&mut self) -> Result<(), DriverError>;

    /// Tear the session down.
    async fn close(&mut self) -> Result<(), DriverError>;

    async fn is_ready(&self) -> bool;

    /// Navigate and wait for the load event, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    /// All elements matching a CSS selector, in document order.
    async fn locate(&mut self, selector: &str) -> Result<Vec<ElementInfo>, DriverError>;

    /// Innermost elements whose rendered text contains `text`, case-insensitively.
    async fn locate_text(&mut self, text: &str) -> Result<Vec<ElementInfo>, DriverError>;

    /// Closest visible ancestor of a (typically hidden) element.
    async fn visible_ancestor(
        &mut self,
        handle: ElementHandle,
    ) -> Result<Option<ElementInfo>, DriverError>;

    async fn click(&mut self, handle: ElementHandle) -> Result<(), DriverError>;

    /// Replace the value of an input or textarea.
    async fn fill(&mut self, handle: ElementHandle, text: &str) -> Result<(), DriverError>;

    /// Empty a contenteditable element.
    async fn clear_content(&mut self, handle: ElementHandle) -> Result<(), DriverError>;

    /// Type into whatever currently has focus.
    async fn type_text(&mut self, text: &str) -> Result<(), DriverError>;

    async fn press_key(&mut self, key: &str) -> Result<(), DriverError>;

    /// Wait for the document and network to go quiet.
    async fn wait_for_load(&mut self, timeout: Duration) -> Result<(), DriverError>;

    /// Visible text of the whole page.
    async fn page_text(&mut self) -> Result<String, DriverError>;

    async fn viewport_width(&mut self) -> Result<f32, DriverError>;

    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, DriverError>;

    /// Let the page settle. Mocks override this to return immediately.
    async fn pause(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Something the wait helpers can poll for.
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    Css(&'a str),
    Text(&'a str),
}

/// First visible element matching `probe`, or `None` when nothing matches.
///
/// Selector errors are treated as "no match" so that selectors the page
/// engine does not understand never abort an action. Fatal errors still propagate.
pub async fn find_visible<D: PageDriver + ?Sized>(
    driver: &mut D,
    probe: Probe<'_>,
) -> Result<Option<ElementInfo>, DriverError> {
    let found = match probe {
        Probe::Css(selector) => driver.locate(selector).await,
        Probe::Text(text) => driver.locate_text(text).await,
    };
    match found {
        Ok(elements) => Ok(elements.into_iter().find(|e| e.visible)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!("Probe {:?} failed: {}", probe, e);
            Ok(None)
        }
    }
}

/// Poll until one of `probes` yields a visible element or `timeout` elapses.
///
/// Returns the index of the probe that matched along with the element.
pub async fn wait_for_any<D: PageDriver + ?Sized>(
    driver: &mut D,
    probes: &[Probe<'_>],
    timeout: Duration,
) -> Result<Option<(usize, ElementInfo)>, DriverError> {
    let attempts = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1);
    for attempt in 0..attempts {
        for (index, probe) in probes.iter().enumerate() {
            if let Some(element) = find_visible(driver, *probe).await? {
                return Ok(Some((index, element)));
            }
        }
        if attempt + 1 < attempts {
            driver.pause(POLL_INTERVAL).await;
        }
    }
    Ok(None)
}

pub async fn wait_for_visible<D: PageDriver + ?Sized>(
    driver: &mut D,
    probe: Probe<'_>,
    timeout: Duration,
) -> Result<Option<ElementInfo>, DriverError> {
    Ok(wait_for_any(driver, &[probe], timeout)
        .await?
        .map(|(_, element)| element))
}
