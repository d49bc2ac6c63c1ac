use super::text::significant_words;
use crate::driver::PageDriver;
use crate::url_state::UrlState;
use navplan_common::DriverError;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "should", "could", "may", "might", "must", "can", "this",
    "that", "these", "those", "open", "click", "press", "select", "choose", "new",
];

/// Object nouns looked for in page text when nothing else gives context.
const COMMON_OBJECTS: &[&str] = &[
    "issue",
    "project",
    "task",
    "view",
    "team",
    "workspace",
    "member",
    "label",
    "milestone",
];

/// What the plan was trying to do when it pointed at a bare symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolContext {
    /// Label the plan expected, recovered from a failed text lookup.
    pub intended: Option<String>,
    pub keywords: Vec<String>,
}

impl SymbolContext {
    /// Build context from, in priority order: the last failed text lookup,
    /// the step goal, the URL, and finally the page text.
    pub async fn gather<D: PageDriver + ?Sized>(
        driver: &mut D,
        symbol: &str,
        goal: &str,
        last_failed_text: Option<&str>,
        url: &UrlState,
    ) -> Result<Self, DriverError> {
        let mut context = Self::from_hints(symbol, goal, last_failed_text, url);
        if context.keywords.is_empty() {
            match driver.page_text().await {
                Ok(text) => context.add_page_objects(&text),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!("Page text unavailable for symbol context: {}", e),
            }
        }
        Ok(context)
    }

    /// Context from everything except the page itself.
    pub fn from_hints(
        symbol: &str,
        goal: &str,
        last_failed_text: Option<&str>,
        url: &UrlState,
    ) -> Self {
        let mut context = SymbolContext::default();

        if let Some(failed) = last_failed_text {
            let stripped = failed.replace(symbol, " ");
            let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
            if !stripped.is_empty() {
                context.keywords = significant_words(&stripped);
                context.intended = Some(stripped.to_lowercase());
            }
        }

        if context.keywords.is_empty() {
            context.keywords = significant_words(goal)
                .into_iter()
                .filter(|w| !STOP_WORDS.contains(&w.as_str()))
                .collect();
        }

        for keyword in url.context_keywords() {
            context.push(keyword);
        }
        context
    }

    pub fn add_page_objects(&mut self, page_text: &str) {
        let text = page_text.to_lowercase();
        for object in COMMON_OBJECTS {
            if text.contains(object) {
                self.push(object);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.intended.is_none()
    }

    fn push(&mut self, keyword: &str) {
        if !self.keywords.iter().any(|k| k == keyword) {
            self.keywords.push(keyword.to_string());
        }
    }
}
