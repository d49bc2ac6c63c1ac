//! Picks which input a `type(...)` action writes into.
//!
//! Plans frequently address fields with brittle selectors (`input:nth-of-type(2)`)
//! or generic ones (`input`) that match several elements. The allocator tracks
//! which fields were already filled in the current step, identified by their
//! on-screen position, and hands out the next sensible candidate.

use crate::driver::PageDriver;
use navplan_common::{DriverError, ElementInfo, Rect};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Inputs that can take typed text.
pub const FIELD_SELECTOR: &str = concat!(
    r#"input:not([type="button"]):not([type="submit"]):not([type="hidden"])"#,
    r#":not([type="checkbox"]):not([type="radio"]), textarea, [contenteditable="true"]"#,
);

/// Containers tried in order; the empty scope is the whole page.
pub(crate) const SCOPES: &[&str] = &[r#"[role="dialog"]"#, r#"[role="modal"]"#, "form", ""];

static NTH_OF_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":nth-of-type\((\d+)\)").unwrap());

/// Identity of a field by its top-left corner, in hundredths of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSignature {
    top: i64,
    left: i64,
}

impl FieldSignature {
    pub fn of(rect: &Rect) -> Self {
        Self {
            top: (rect.y * 100.0).round() as i64,
            left: (rect.x * 100.0).round() as i64,
        }
    }
}

impl fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.top as f64 / 100.0,
            self.left as f64 / 100.0
        )
    }
}

/// Fields already written in the current step.
#[derive(Debug, Default, Clone)]
pub struct UsedFields(HashSet<FieldSignature>);

impl UsedFields {
    pub fn contains(&self, element: &ElementInfo) -> bool {
        self.0.contains(&FieldSignature::of(&element.rect))
    }

    pub fn mark(&mut self, element: &ElementInfo) {
        self.0.insert(FieldSignature::of(&element.rect));
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the plan asked to type, reduced to what the allocator needs.
#[derive(Debug, Clone)]
pub struct FieldRequest {
    /// 1-based position from an `:nth-of-type(N)` selector.
    pub position: Option<usize>,
    /// Long-form fields sit lower and are larger than title fields.
    pub wants_description: bool,
}

impl FieldRequest {
    pub fn new(hint: &str, value: &str) -> Self {
        let hint_lower = hint.to_lowercase();
        let position = NTH_OF_TYPE
            .captures(hint)
            .and_then(|caps| caps[1].parse().ok())
            .filter(|n: &usize| *n > 0);
        let wants_description = hint_lower.contains("description")
            || hint_lower.contains("textarea")
            || value.to_lowercase().contains("description");
        Self {
            position,
            wants_description,
        }
    }
}

/// Choose a field for `request`, trying dialogs, then forms, then the page.
pub async fn allocate<D: PageDriver + ?Sized>(
    driver: &mut D,
    request: &FieldRequest,
    used: &UsedFields,
) -> Result<Option<ElementInfo>, DriverError> {
    for scope in SCOPES {
        let selector = scoped_selector(scope, FIELD_SELECTOR);
        let fields = match driver.locate(&selector).await {
            Ok(found) => found.into_iter().filter(|f| f.visible).collect::<Vec<_>>(),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::debug!("Field lookup in scope '{}' failed: {}", scope, e);
                continue;
            }
        };
        if fields.is_empty() {
            continue;
        }

        if let Some(n) = request.position {
            if let Some(field) = fields.get(n - 1) {
                if !used.contains(field) {
                    return Ok(Some(field.clone()));
                }
            }
        }

        let mut free: Vec<ElementInfo> = fields.into_iter().filter(|f| !used.contains(f)).collect();
        if free.is_empty() {
            continue;
        }
        rank_fields(&mut free, request.wants_description);
        return Ok(free.into_iter().next());
    }
    Ok(None)
}

/// Description requests prefer the lowest then largest field; everything else the topmost.
pub fn rank_fields(fields: &mut [ElementInfo], wants_description: bool) {
    if wants_description {
        fields.sort_by(|a, b| {
            b.rect
                .y
                .total_cmp(&a.rect.y)
                .then(b.rect.area().total_cmp(&a.rect.area()))
        });
    } else {
        fields.sort_by(|a, b| a.rect.y.total_cmp(&b.rect.y).then(a.rect.x.total_cmp(&b.rect.x)));
    }
}

/// Write `value` into `field` and record it as used.
pub async fn fill_field<D: PageDriver + ?Sized>(
    driver: &mut D,
    field: &ElementInfo,
    value: &str,
    used: &mut UsedFields,
) -> Result<(), DriverError> {
    driver.click(field.handle).await?;
    driver.pause(Duration::from_millis(200)).await;

    if field.content_editable {
        driver.clear_content(field.handle).await?;
        driver.type_text(value).await?;
    } else {
        driver.fill(field.handle, value).await?;
    }

    used.mark(field);
    tracing::debug!(
        "Filled {} field at {}",
        field.tag,
        FieldSignature::of(&field.rect)
    );
    Ok(())
}

/// Prefix every comma-separated part of `selector` with `scope`.
pub fn scoped_selector(scope: &str, selector: &str) -> String {
    if scope.is_empty() {
        return selector.to_string();
    }
    selector
        .split(", ")
        .map(|part| format!("{} {}", scope, part.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
