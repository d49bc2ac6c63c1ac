use crate::cdp::{CdpClient, WindowSize};
use crate::inject::{call, helper_call, is_session_error};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use navplan_engine::driver::{POLL_INTERVAL, PageDriver};
use navplan_engine::{DriverError, ElementHandle, ElementInfo};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Chromium over CDP.
pub struct ChromeDriver {
    client: Option<CdpClient>,
    visible: bool,
    window: WindowSize,
}

impl ChromeDriver {
    pub fn new(visible: bool) -> Self {
        Self {
            client: None,
            visible,
            window: WindowSize::default(),
        }
    }

    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window = WindowSize { width, height };
        self
    }

    pub fn client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(DriverError::NotReady)
    }
}

impl Default for ChromeDriver {
    fn default() -> Self {
        Self::new(true)
    }
}

fn cdp_error(context: &str, err: impl std::fmt::Display) -> DriverError {
    let msg = format!("{}: {}", context, err);
    if is_session_error(&msg) {
        DriverError::Closed(msg)
    } else {
        DriverError::Other(msg)
    }
}

#[derive(Debug, Deserialize)]
struct ClickPoint {
    x: f64,
    y: f64,
}

/// CDP key description for a named key or a single character.
struct KeyDef {
    key: String,
    code: Option<&'static str>,
    text: Option<String>,
    key_code: Option<i64>,
}

fn key_def(key: &str) -> KeyDef {
    let named = |key: &str, code: &'static str, text: Option<&str>, key_code: i64| KeyDef {
        key: key.to_string(),
        code: Some(code),
        text: text.map(str::to_string),
        key_code: Some(key_code),
    };
    match key.to_lowercase().as_str() {
        "enter" | "return" => named("Enter", "Enter", Some("\r"), 13),
        "escape" | "esc" => named("Escape", "Escape", None, 27),
        "tab" => named("Tab", "Tab", None, 9),
        "backspace" => named("Backspace", "Backspace", None, 8),
        "delete" => named("Delete", "Delete", None, 46),
        "space" => named(" ", "Space", Some(" "), 32),
        "arrowdown" => named("ArrowDown", "ArrowDown", None, 40),
        "arrowup" => named("ArrowUp", "ArrowUp", None, 38),
        _ => KeyDef {
            key: key.to_string(),
            code: None,
            text: (key.chars().count() == 1).then(|| key.to_string()),
            key_code: None,
        },
    }
}

/// Splits `Control+Shift+k` into the CDP modifier bitmask and the key.
fn split_modifiers(combo: &str) -> (i64, &str) {
    if combo.len() <= 1 || !combo.contains('+') {
        return (0, combo);
    }
    let mut flags = 0;
    let mut parts: Vec<&str> = combo.split('+').collect();
    let key = match parts.pop() {
        Some("") => "+",
        Some(key) => key,
        None => combo,
    };
    for m in parts {
        match m.to_lowercase().as_str() {
            "alt" => flags |= 1,
            "ctrl" | "control" => flags |= 2,
            "meta" | "cmd" | "command" => flags |= 4,
            "shift" => flags |= 8,
            _ => {}
        }
    }
    (flags, key)
}

async fn dispatch_key(
    page: &Page,
    kind: DispatchKeyEventType,
    def: &KeyDef,
    modifiers: i64,
) -> Result<(), DriverError> {
    let mut builder = DispatchKeyEventParams::builder()
        .r#type(kind.clone())
        .key(def.key.clone())
        .modifiers(modifiers);
    if let Some(code) = def.code {
        builder = builder.code(code);
    }
    if let Some(key_code) = def.key_code {
        builder = builder
            .windows_virtual_key_code(key_code)
            .native_virtual_key_code(key_code);
    }
    // Text only accompanies the down event, and never with Ctrl/Meta held.
    if kind == DispatchKeyEventType::KeyDown && modifiers & 6 == 0 {
        if let Some(text) = &def.text {
            builder = builder.text(text.clone());
        }
    }
    let params = builder
        .build()
        .map_err(|e| DriverError::Other(format!("Failed to build key event: {:?}", e)))?;
    page.execute(params)
        .await
        .map_err(|e| cdp_error("press_key", e))?;
    Ok(())
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Launching Chromium...");
        let client = CdpClient::launch(self.visible, self.window)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let page = self.page()?;
        info!("Navigating to: {}", url);
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Err(_) => Err(DriverError::Timeout(format!("navigation to {}", url))),
            Ok(Err(e)) => {
                let msg = e.to_string();
                if is_session_error(&msg) {
                    Err(DriverError::Closed(msg))
                } else {
                    Err(DriverError::Navigation(msg))
                }
            }
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        let page = self.page()?;
        let url = page.url().await.map_err(|e| cdp_error("url", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn locate(&mut self, selector: &str) -> Result<Vec<ElementInfo>, DriverError> {
        let expr = helper_call("locate", &[json!(selector)])?;
        call(self.page()?, &expr).await
    }

    async fn locate_text(&mut self, text: &str) -> Result<Vec<ElementInfo>, DriverError> {
        let expr = helper_call("locateText", &[json!(text)])?;
        call(self.page()?, &expr).await
    }

    async fn visible_ancestor(
        &mut self,
        handle: ElementHandle,
    ) -> Result<Option<ElementInfo>, DriverError> {
        let expr = helper_call("ancestor", &[json!(handle.0)])?;
        call(self.page()?, &expr).await
    }

    async fn click(&mut self, handle: ElementHandle) -> Result<(), DriverError> {
        let page = self.page()?;
        let expr = helper_call("center", &[json!(handle.0)])?;
        let point: ClickPoint = call(page, &expr).await?;
        debug!("Clicking {} at ({:.0}, {:.0})", handle, point.x, point.y);
        page.click(Point::new(point.x, point.y))
            .await
            .map_err(|e| cdp_error("click", e))?;
        Ok(())
    }

    async fn fill(&mut self, handle: ElementHandle, text: &str) -> Result<(), DriverError> {
        let expr = helper_call("fill", &[json!(handle.0), json!(text)])?;
        let _: bool = call(self.page()?, &expr).await?;
        Ok(())
    }

    async fn clear_content(&mut self, handle: ElementHandle) -> Result<(), DriverError> {
        let expr = helper_call("clear", &[json!(handle.0)])?;
        let _: bool = call(self.page()?, &expr).await?;
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        page.execute(InsertTextParams::new(text))
            .await
            .map_err(|e| cdp_error("insert_text", e))?;
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        let (modifiers, key) = split_modifiers(key);
        let def = key_def(key);
        dispatch_key(page, DispatchKeyEventType::KeyDown, &def, modifiers).await?;
        dispatch_key(page, DispatchKeyEventType::KeyUp, &def, modifiers).await
    }

    async fn wait_for_load(&mut self, timeout: Duration) -> Result<(), DriverError> {
        let page = self.page()?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state: String = call(page, "document.readyState").await?;
            if state == "complete" {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!(
                    "page load (readyState {})",
                    state
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        let expr = helper_call("pageText", &[])?;
        call(self.page()?, &expr).await
    }

    async fn viewport_width(&mut self) -> Result<f32, DriverError> {
        let expr = helper_call("viewportWidth", &[])?;
        call(self.page()?, &expr).await
    }

    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        let page = self.page()?;
        page.screenshot(ScreenshotParams::builder().full_page(full_page).build())
            .await
            .map_err(|e| cdp_error("Screenshot failed", e))
    }
}
