#![allow(dead_code)]

use async_trait::async_trait;
use navplan_common::page::normalize_text;
use navplan_engine::driver::PageDriver;
use navplan_engine::{DriverError, ElementHandle, ElementInfo, Rect};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\*|[a-zA-Z][a-zA-Z0-9]*)").unwrap());
static PIECE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":not\(\[([^\]]+)\]\)|\[([^\]]+)\]|:nth-of-type\((\d+)\)").unwrap()
});
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([\w-]+)\s*(?:([*^$]?=)\s*"([^"]*)"\s*(i)?)?\s*$"#).unwrap()
});

/// One element of the scripted page.
#[derive(Debug, Clone)]
pub struct MockElement {
    pub info: ElementInfo,
    pub attrs: HashMap<String, String>,
    /// Selectors of the containers this element sits in, e.g. `form`.
    pub containers: Vec<String>,
    /// Handle of the element returned by `visible_ancestor`.
    pub parent: Option<u32>,
    pub navigates_to: Option<String>,
}

impl MockElement {
    pub fn new(tag: &str, text: &str) -> Self {
        Self {
            info: ElementInfo {
                handle: ElementHandle(0),
                tag: tag.to_string(),
                role: None,
                text: text.to_string(),
                aria_label: None,
                title: None,
                placeholder: None,
                name: None,
                input_type: None,
                rect: Rect {
                    x: 0.0,
                    y: 0.0,
                    width: 100.0,
                    height: 30.0,
                },
                visible: true,
                content_editable: false,
            },
            attrs: HashMap::new(),
            containers: Vec::new(),
            parent: None,
            navigates_to: None,
        }
    }

    pub fn button(text: &str) -> Self {
        Self::new("button", text)
    }

    pub fn link(text: &str) -> Self {
        Self::new("a", text)
    }

    pub fn input(input_type: &str) -> Self {
        let mut el = Self::new("input", "");
        el.info.input_type = Some(input_type.to_string());
        el
    }

    pub fn role(mut self, role: &str) -> Self {
        self.info.role = Some(role.to_string());
        self
    }

    pub fn aria(mut self, label: &str) -> Self {
        self.info.aria_label = Some(label.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.info.title = Some(title.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.info.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.info.name = Some(name.to_string());
        self
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.info.rect.x = x;
        self.info.rect.y = y;
        self
    }

    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.info.rect.width = width;
        self.info.rect.height = height;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.info.visible = false;
        self
    }

    pub fn editable(mut self) -> Self {
        self.info.content_editable = true;
        self
    }

    pub fn inside(mut self, container: &str) -> Self {
        self.containers.push(container.to_string());
        self
    }

    pub fn child_of(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn navigates(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.to_string());
        self
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "role" => self.info.role.clone(),
            "aria-label" => self.info.aria_label.clone(),
            "title" => self.info.title.clone(),
            "placeholder" => self.info.placeholder.clone(),
            "name" => self.info.name.clone(),
            "type" => self.info.input_type.clone(),
            "contenteditable" if self.info.content_editable => Some("true".to_string()),
            _ => self.attrs.get(name).cloned(),
        }
    }
}

/// A URL change (and optionally a new page) that happens after N pauses.
#[derive(Debug, Clone)]
pub struct Scheduled {
    pub after_pauses: usize,
    pub url: String,
    pub elements: Option<Vec<MockElement>>,
}

/// Scripted page that records every call made against it.
#[derive(Debug, Default)]
pub struct MockPage {
    pub url: String,
    pub elements: Vec<MockElement>,
    /// Pages loaded by `navigate` or by clicking a navigating element.
    pub pages: HashMap<String, Vec<MockElement>>,
    /// Elements appended when a key is pressed.
    pub on_key: HashMap<String, Vec<MockElement>>,
    pub scheduled: Vec<Scheduled>,
    pub calls: Vec<String>,
    pub fills: Vec<(u32, String)>,
    pub typed: Vec<String>,
    pub keys: Vec<String>,
    pub rejects_clicks: Vec<u32>,
    pub close_on_click: Option<u32>,
    pub navigation_times_out: bool,
    pub closed: bool,
    pub viewport: f32,
    pub pauses: usize,
    pub page_text: Option<String>,
    pub screenshots: usize,
}

impl MockPage {
    pub fn new(url: &str, elements: Vec<MockElement>) -> Self {
        let mut page = Self {
            url: url.to_string(),
            viewport: 1280.0,
            ..Default::default()
        };
        page.set_elements(elements);
        page
    }

    pub fn with_page(mut self, url: &str, elements: Vec<MockElement>) -> Self {
        self.pages.insert(url.to_string(), elements);
        self
    }

    pub fn schedule(&mut self, after_pauses: usize, url: &str, elements: Option<Vec<MockElement>>) {
        self.scheduled.push(Scheduled {
            after_pauses,
            url: url.to_string(),
            elements,
        });
    }

    /// Replace the page content; handles are 1-based positions.
    pub fn set_elements(&mut self, elements: Vec<MockElement>) {
        self.elements = elements;
        for (i, el) in self.elements.iter_mut().enumerate() {
            el.info.handle = ElementHandle(i as u32 + 1);
        }
    }

    pub fn append(&mut self, elements: Vec<MockElement>) {
        for mut el in elements {
            el.info.handle = ElementHandle(self.elements.len() as u32 + 1);
            self.elements.push(el);
        }
    }

    pub fn clicks(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|c| c.starts_with("click "))
            .map(String::as_str)
            .collect()
    }

    fn check_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed("target closed".into()));
        }
        Ok(())
    }

    fn element(&self, handle: ElementHandle) -> Result<&MockElement, DriverError> {
        self.elements
            .get((handle.0 as usize).wrapping_sub(1))
            .ok_or(DriverError::StaleHandle(handle.0))
    }

    fn load(&mut self, url: &str) {
        self.url = url.to_string();
        if let Some(elements) = self.pages.get(url).cloned() {
            self.set_elements(elements);
        }
    }

    fn matches(&self, index: usize, selector: &str) -> Result<bool, DriverError> {
        for part in split_outside_brackets(selector, ',') {
            let mut compounds = split_outside_brackets(part, ' ');
            let Some(last) = compounds.pop() else {
                continue;
            };
            let el = &self.elements[index];
            let scoped = compounds
                .iter()
                .all(|scope| el.containers.iter().any(|c| c == scope));
            if scoped && self.matches_compound(index, last)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_compound(&self, index: usize, compound: &str) -> Result<bool, DriverError> {
        let el = &self.elements[index];
        let mut rest = compound;
        if let Some(tag) = TAG.find(compound) {
            if tag.as_str() != "*" && !tag.as_str().eq_ignore_ascii_case(&el.info.tag) {
                return Ok(false);
            }
            rest = &compound[tag.end()..];
        }

        let mut consumed = 0;
        let mut matched = true;
        for caps in PIECE.captures_iter(rest) {
            let whole = caps.get(0).map(|m| m.len()).unwrap_or(0);
            consumed += whole;
            if let Some(nth) = caps.get(3) {
                let n: usize = nth.as_str().parse().unwrap_or(0);
                let position = self.elements[..=index]
                    .iter()
                    .filter(|e| e.info.tag == el.info.tag)
                    .count();
                matched &= position == n;
            } else if let Some(body) = caps.get(1) {
                matched &= !attr_matches(el, body.as_str())?;
            } else if let Some(body) = caps.get(2) {
                matched &= attr_matches(el, body.as_str())?;
            }
        }
        if consumed != rest.len() {
            return Err(DriverError::Script(format!(
                "'{}' is not a valid selector",
                compound
            )));
        }
        Ok(matched)
    }
}

fn attr_matches(el: &MockElement, body: &str) -> Result<bool, DriverError> {
    let caps = ATTR
        .captures(body)
        .ok_or_else(|| DriverError::Script(format!("bad attribute selector [{}]", body)))?;
    let Some(value) = el.attribute(&caps[1]) else {
        return Ok(false);
    };
    let Some(op) = caps.get(2) else {
        return Ok(true);
    };
    let insensitive = caps.get(4).is_some();
    let (value, expected) = if insensitive {
        (value.to_lowercase(), caps[3].to_lowercase())
    } else {
        (value, caps[3].to_string())
    };
    Ok(match op.as_str() {
        "=" => value == expected,
        "*=" => value.contains(&expected),
        "^=" => value.starts_with(&expected),
        "$=" => value.ends_with(&expected),
        _ => false,
    })
}

fn split_outside_brackets(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '[' | '(' if !quoted => depth += 1,
            ']' | ')' if !quoted => depth -= 1,
            _ if c == separator && depth == 0 && !quoted => {
                let part = input[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    let part = input[start..].trim();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

#[async_trait]
impl PageDriver for MockPage {
    async fn launch(&mut self) -> Result<(), DriverError> {
        self.calls.push("launch".into());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.calls.push("close".into());
        self.closed = true;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        !self.closed
    }

    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.calls.push(format!("navigate {}", url));
        self.check_open()?;
        self.load(url);
        if self.navigation_times_out {
            return Err(DriverError::Timeout(format!("load of {}", url)));
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.check_open()?;
        Ok(self.url.clone())
    }

    async fn locate(&mut self, selector: &str) -> Result<Vec<ElementInfo>, DriverError> {
        self.check_open()?;
        let mut found = Vec::new();
        for index in 0..self.elements.len() {
            if self.matches(index, selector)? {
                found.push(self.elements[index].info.clone());
            }
        }
        Ok(found)
    }

    async fn locate_text(&mut self, text: &str) -> Result<Vec<ElementInfo>, DriverError> {
        self.check_open()?;
        let wanted = normalize_text(text);
        Ok(self
            .elements
            .iter()
            .filter(|e| !wanted.is_empty() && normalize_text(&e.info.text).contains(&wanted))
            .map(|e| e.info.clone())
            .collect())
    }

    async fn visible_ancestor(
        &mut self,
        handle: ElementHandle,
    ) -> Result<Option<ElementInfo>, DriverError> {
        self.check_open()?;
        let Some(parent) = self.element(handle)?.parent else {
            return Ok(None);
        };
        let parent = self.element(ElementHandle(parent))?;
        Ok(parent.info.visible.then(|| parent.info.clone()))
    }

    async fn click(&mut self, handle: ElementHandle) -> Result<(), DriverError> {
        self.calls.push(format!("click {}", handle));
        self.check_open()?;
        if self.close_on_click == Some(handle.0) {
            self.closed = true;
            return Err(DriverError::Closed("target closed".into()));
        }
        if self.rejects_clicks.contains(&handle.0) {
            return Err(DriverError::Other("element is not interactable".into()));
        }
        let el = self.element(handle)?;
        if !el.info.visible {
            return Err(DriverError::Other("element is not visible".into()));
        }
        if let Some(url) = el.navigates_to.clone() {
            self.load(&url);
        }
        Ok(())
    }

    async fn fill(&mut self, handle: ElementHandle, text: &str) -> Result<(), DriverError> {
        self.calls.push(format!("fill {}", handle));
        self.check_open()?;
        self.element(handle)?;
        self.fills.push((handle.0, text.to_string()));
        Ok(())
    }

    async fn clear_content(&mut self, handle: ElementHandle) -> Result<(), DriverError> {
        self.calls.push(format!("clear {}", handle));
        self.check_open()
    }

    async fn type_text(&mut self, text: &str) -> Result<(), DriverError> {
        self.calls.push("type".into());
        self.check_open()?;
        self.typed.push(text.to_string());
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), DriverError> {
        self.calls.push(format!("press {}", key));
        self.check_open()?;
        self.keys.push(key.to_string());
        if let Some(revealed) = self.on_key.remove(key) {
            self.append(revealed);
        }
        Ok(())
    }

    async fn wait_for_load(&mut self, _timeout: Duration) -> Result<(), DriverError> {
        self.check_open()
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        self.check_open()?;
        if let Some(text) = &self.page_text {
            return Ok(text.clone());
        }
        Ok(self
            .elements
            .iter()
            .filter(|e| e.info.visible)
            .map(|e| e.info.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn viewport_width(&mut self) -> Result<f32, DriverError> {
        self.check_open()?;
        Ok(self.viewport)
    }

    async fn screenshot(&mut self, _full_page: bool) -> Result<Vec<u8>, DriverError> {
        self.check_open()?;
        self.screenshots += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn pause(&mut self, _duration: Duration) {
        self.pauses += 1;
        let pauses = self.pauses;
        let (due, later): (Vec<Scheduled>, Vec<Scheduled>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|s| s.after_pauses <= pauses);
        self.scheduled = later;
        for event in due {
            self.url = event.url;
            if let Some(elements) = event.elements {
                self.set_elements(elements);
            }
        }
    }
}
