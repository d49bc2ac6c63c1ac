mod common;

use common::{MockElement, MockPage};
use navplan_engine::config::EngineConfig;
use navplan_engine::resolution::{ResolutionError, TextResolver, TEXT_STRATEGIES};
use navplan_engine::ElementHandle;

const URL: &str = "https://app.example.com/acme/projects";

#[tokio::test]
async fn test_exact_match_beats_partial() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![
            MockElement::button("Create project settings"),
            MockElement::button("Create  project"),
        ],
    );

    let resolved = resolver.click(&mut page, "Create project", None).await.unwrap();

    assert_eq!(resolved.strategy, "exact");
    assert_eq!(resolved.element.handle, ElementHandle(2));
    assert_eq!(page.clicks(), vec!["click #2"]);
}

#[tokio::test]
async fn test_synonym_when_label_differs() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![MockElement::button("Cancel"), MockElement::button("Save")],
    );

    let resolved = resolver.click(&mut page, "Create project", None).await.unwrap();

    assert_eq!(resolved.strategy, "synonym");
    assert_eq!(resolved.element.text, "Save");
}

#[tokio::test]
async fn test_fallbacks_avoid_destructive_controls() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![
            MockElement::button("Delete project"),
            MockElement::button("Project settings"),
        ],
    );

    let resolved = resolver.click(&mut page, "Project", None).await.unwrap();

    assert_eq!(resolved.strategy, "partial");
    assert_eq!(resolved.element.handle, ElementHandle(2));
    assert!(!page.clicks().contains(&"click #1"));
}

#[tokio::test]
async fn test_destructive_word_allowed_when_asked_for() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(URL, vec![MockElement::button("Delete project forever")]);

    let resolved = resolver.click(&mut page, "Delete project", None).await.unwrap();

    assert_eq!(resolved.strategy, "partial");
    assert_eq!(page.clicks(), vec!["click #1"]);
}

#[tokio::test]
async fn test_hidden_label_clicks_visible_ancestor() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![
            MockElement::new("span", "New view").hidden().child_of(2),
            MockElement::new("div", "+").role("button"),
        ],
    );

    let resolved = resolver.click(&mut page, "New view", None).await.unwrap();

    assert_eq!(resolved.strategy, "visible-ancestor");
    assert_eq!(resolved.element.handle, ElementHandle(2));
}

#[tokio::test]
async fn test_accessible_name_is_last_resort() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(URL, vec![MockElement::button("").aria("Create issue")]);

    let resolved = resolver.click(&mut page, "create issue", None).await.unwrap();

    assert_eq!(resolved.strategy, "role-name");
}

#[tokio::test]
async fn test_dialog_scope_skips_drafts_and_outside_buttons() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let dialog = r#"[role="dialog"]"#;
    let mut page = MockPage::new(
        URL,
        vec![
            MockElement::button("Create"),
            MockElement::button("Create draft").inside(dialog),
            MockElement::button("Create").inside(dialog),
        ],
    );

    let resolved = resolver.click(&mut page, "Create", Some(dialog)).await.unwrap();

    assert_eq!(resolved.strategy, "scoped");
    assert_eq!(page.clicks(), vec!["click #3"]);
}

#[tokio::test]
async fn test_rejected_click_moves_to_next_candidate() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![MockElement::button("Continue"), MockElement::link("Continue")],
    );
    page.rejects_clicks.push(1);

    let resolved = resolver.click(&mut page, "Continue", None).await.unwrap();

    assert_eq!(resolved.element.handle, ElementHandle(2));
    assert_eq!(page.clicks(), vec!["click #1", "click #2"]);
}

#[tokio::test]
async fn test_exhausted_lists_every_strategy() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(URL, vec![MockElement::button("Inbox")]);

    let err = resolver.click(&mut page, "Archive", None).await.unwrap_err();

    match err {
        ResolutionError::Exhausted { target, attempted } => {
            assert_eq!(target, "text=Archive");
            let expected: Vec<&str> = TEXT_STRATEGIES.iter().map(|s| s.name()).collect();
            assert_eq!(attempted, expected);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(page.clicks().is_empty());
}

#[tokio::test]
async fn test_closed_page_is_fatal() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(URL, vec![MockElement::button("Save")]);
    page.closed = true;

    let err = resolver.click(&mut page, "Save", None).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_find_prefers_exact_visible_match() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![
            MockElement::new("span", "Log in").hidden(),
            MockElement::link("Log in with SSO"),
            MockElement::link("Log in"),
        ],
    );

    let found = resolver.find(&mut page, "Log in").await.unwrap().unwrap();
    assert_eq!(found.handle, ElementHandle(3));
    assert!(page.clicks().is_empty());
}

#[test]
fn test_synonyms_follow_the_verb() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);

    assert_eq!(resolver.synonyms_for("Save")[0], "create");
    assert!(resolver.synonyms_for("Add label").contains(&"insert".to_string()));
    assert!(resolver.synonyms_for("Inbox").is_empty());
}

#[tokio::test]
async fn test_short_label_not_shadowed_by_longer_one() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![MockElement::link("My Issues"), MockElement::link("Issues")],
    );

    let resolved = resolver.click(&mut page, "Issues", None).await.unwrap();

    assert_eq!(resolved.strategy, "exact");
    assert_eq!(resolved.element.text, "Issues");
    assert_eq!(page.clicks(), vec!["click #2"]);
}

#[tokio::test]
async fn test_unknown_word_without_synonyms_fails() {
    let config = EngineConfig::default();
    let resolver = TextResolver::new(&config.resolver, &config.timeouts);
    let mut page = MockPage::new(
        URL,
        vec![MockElement::button("Save"), MockElement::button("Create")],
    );

    assert!(resolver.synonyms_for("Banana").is_empty());
    let err = resolver.click(&mut page, "Banana", None).await.unwrap_err();

    assert!(matches!(err, ResolutionError::Exhausted { ref target, .. } if target == "text=Banana"));
    assert!(!err.is_fatal());
    assert!(page.clicks().is_empty());
}
