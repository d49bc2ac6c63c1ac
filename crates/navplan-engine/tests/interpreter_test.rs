mod common;

use common::{MockElement, MockPage};
use navplan_engine::artifacts::ArtifactStore;
use navplan_engine::config::EngineConfig;
use navplan_engine::context::ExecutionContext;
use navplan_engine::error::ActionError;
use navplan_engine::interpreter::{ActionInterpreter, Signal, StepScope};
use std::collections::HashMap;

const ISSUES: &str = "https://app.example.com/acme/team/issues";

fn context() -> ExecutionContext {
    ExecutionContext::new(HashMap::new(), ArtifactStore::disabled())
}

fn scope(goal: &str) -> StepScope<'_> {
    StepScope {
        number: 3,
        goal,
        action_index: 0,
    }
}

async fn run(
    interpreter: &ActionInterpreter<'_>,
    page: &mut MockPage,
    ctx: &mut ExecutionContext,
    goal: &str,
    raw: &str,
) -> Result<Signal, ActionError> {
    let action = interpreter.prepare(raw, ctx).unwrap();
    interpreter.execute(page, ctx, scope(goal), &action).await
}

#[tokio::test]
async fn test_open_page_loads_url() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new("about:blank", vec![])
        .with_page(ISSUES, vec![MockElement::button("New issue")]);
    let mut ctx = context();

    let signal = run(&interpreter, &mut page, &mut ctx, "Open", &format!("open_page('{}')", ISSUES))
        .await
        .unwrap();

    assert_eq!(signal, Signal::Continue);
    assert_eq!(page.calls, vec![format!("navigate {}", ISSUES)]);
    assert_eq!(page.url, ISSUES);
}

#[tokio::test]
async fn test_navigation_timeout_is_tolerated() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new("about:blank", vec![]);
    page.navigation_times_out = true;
    let mut ctx = context();

    let signal = run(&interpreter, &mut page, &mut ctx, "Open", "open_page('https://slow.example.com')")
        .await
        .unwrap();
    assert_eq!(signal, Signal::Continue);
}

#[tokio::test]
async fn test_condition_and_else_branching() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![MockElement::link("My issues")]);
    let mut ctx = context();

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "if_element_exists('text=My issues', 5)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::BranchTo(5));
    assert_eq!(ctx.last_condition, Some(true));
    // Detected controls are clicked on the way out.
    assert_eq!(page.clicks(), vec!["click #1"]);

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "if_element_exists('text=Log in', 3)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::ConditionFalse);
    assert_eq!(ctx.last_failed_text.as_deref(), Some("Log in"));

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "else proceed_to_step(4)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::BranchTo(4));
    assert_eq!(ctx.last_condition, None);
    assert_eq!(page.clicks().len(), 1);
}

#[tokio::test]
async fn test_else_without_condition_continues() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![]);
    let mut ctx = context();

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "else skip_to_step(9)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::Continue);
}

#[tokio::test]
async fn test_url_condition() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![]);
    let mut ctx = context();

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "if_url_contains('/issues', proceed_to_step=6)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::BranchTo(6));

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "if_url_contains('/login', 2)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::ConditionFalse);
}

#[tokio::test]
async fn test_url_condition_ignores_case() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new("https://app.example.com/Team/NEW", vec![]);
    let mut ctx = context();

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "if_url_contains('/new', proceed_to_step=3)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::BranchTo(3));

    let signal = run(&interpreter, &mut page, &mut ctx, "Check", "if_url_contains('/TEAM/', 4)")
        .await
        .unwrap();
    assert_eq!(signal, Signal::BranchTo(4));
}

#[tokio::test]
async fn test_if_visible_guards_next_action() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![]);
    let mut ctx = context();

    let signal = run(&interpreter, &mut page, &mut ctx, "Dismiss", "if_visible('text=Welcome')")
        .await
        .unwrap();
    assert_eq!(signal, Signal::SkipNext);
}

#[tokio::test]
async fn test_type_into_labelled_field() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(
        ISSUES,
        vec![
            MockElement::input("text").placeholder("Search").at(0.0, 10.0),
            MockElement::input("text").placeholder("Project name").at(0.0, 200.0),
        ],
    );
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Name it", "type('text=Project name', 'Q1 Launch')")
        .await
        .unwrap();

    assert_eq!(page.fills, vec![(2, "Q1 Launch".to_string())]);
    assert_eq!(ctx.used_fields.len(), 1);
}

#[tokio::test]
async fn test_type_with_brittle_selector_uses_allocator() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let dialog = r#"[role="dialog"]"#;
    let mut page = MockPage::new(
        ISSUES,
        vec![
            MockElement::input("text").inside(dialog).at(400.0, 200.0),
            MockElement::new("textarea", "").inside(dialog).at(400.0, 260.0).sized(500.0, 200.0),
        ],
    );
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Fill", "type('#title-input', 'Q1 Launch')")
        .await
        .unwrap();
    run(&interpreter, &mut page, &mut ctx, "Fill", "type('.description-field', 'Kickoff')")
        .await
        .unwrap();

    assert_eq!(
        page.fills,
        vec![(1, "Q1 Launch".to_string()), (2, "Kickoff".to_string())]
    );
}

#[tokio::test]
async fn test_type_without_fields_fails() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![MockElement::button("Save")]);
    let mut ctx = context();

    let err = run(&interpreter, &mut page, &mut ctx, "Fill", "type('input', 'x')")
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::TypeFailed(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_enter_clicks_primary_button() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(
        ISSUES,
        vec![MockElement::button("Cancel"), MockElement::button("Create")],
    );
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Submit", "press('Enter')")
        .await
        .unwrap();

    assert_eq!(page.clicks(), vec!["click #2"]);
    assert!(page.keys.is_empty());
}

#[tokio::test]
async fn test_other_keys_are_pressed() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![]);
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Shortcut", "press_key('c')")
        .await
        .unwrap();
    run(&interpreter, &mut page, &mut ctx, "Submit", "press('Enter')")
        .await
        .unwrap();

    assert_eq!(page.keys, vec!["c", "Enter"]);
}

#[tokio::test]
async fn test_unsupported_selector_falls_back_to_its_text() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![MockElement::button("Save")]);
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Save", r#"click('button:has-text("Save")')"#)
        .await
        .unwrap();

    assert_eq!(page.clicks(), vec!["click #1"]);
}

#[tokio::test]
async fn test_brittle_selector_falls_back_to_keyword_button() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(
        ISSUES,
        vec![
            MockElement::button("Cancel"),
            MockElement::button("Delete draft"),
            MockElement::button("Create issue"),
        ],
    );
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Submit", "click('#create-issue-btn')")
        .await
        .unwrap();

    assert_eq!(page.clicks(), vec!["click #3"]);
}

#[tokio::test]
async fn test_button_selector_falls_back_to_enter() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![MockElement::input("text").name("title")]);
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Submit", "click('button.primary-action')")
        .await
        .unwrap();

    assert!(page.clicks().is_empty());
    assert_eq!(page.keys, vec!["Enter"]);
}

#[tokio::test]
async fn test_shortcut_prefers_matching_button() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(
        ISSUES,
        vec![MockElement::button("Filter"), MockElement::button("New issue")],
    );
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Create", "press_key('c')")
        .await
        .unwrap();

    assert_eq!(page.clicks(), vec!["click #2"]);
    assert!(page.keys.is_empty());
}

#[tokio::test]
async fn test_wait_for_either_hands_login_to_user() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(
        "https://app.example.com/login",
        vec![
            MockElement::new("h1", "Sign in"),
            MockElement::input("email").name("email"),
            MockElement::input("password").name("password"),
        ],
    );
    page.schedule(1, ISSUES, Some(vec![MockElement::link("Issues")]));
    let mut ctx = context();

    let signal = run(
        &interpreter,
        &mut page,
        &mut ctx,
        "Open the app",
        "wait_for_either('text=Sign in', 'form.login-form')",
    )
    .await
    .unwrap();

    assert_eq!(signal, Signal::Continue);
    assert!(ctx.login_completed());
    assert_eq!(page.url, ISSUES);
    assert!(page.fills.is_empty());
}

#[tokio::test]
async fn test_failed_text_steers_symbol_click() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(
        ISSUES,
        vec![
            MockElement::button("+").title("New issue").at(300.0, 40.0),
            MockElement::button("+").title("New view").at(300.0, 80.0),
        ],
    );
    let mut ctx = context();

    let err = run(&interpreter, &mut page, &mut ctx, "Create a view", "click('text=New view')")
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(ctx.last_failed_text.as_deref(), Some("New view"));

    run(&interpreter, &mut page, &mut ctx, "Create a view", "click('+')")
        .await
        .unwrap();

    assert_eq!(page.clicks(), vec!["click #2"]);
    assert_eq!(ctx.last_failed_text, None);
}

#[tokio::test]
async fn test_missing_assertion_fails() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![MockElement::new("h1", "Issues")]);
    let mut ctx = context();

    run(&interpreter, &mut page, &mut ctx, "Verify", "assert('text=Issues')")
        .await
        .unwrap();
    let err = run(&interpreter, &mut page, &mut ctx, "Verify", "assert('text=Q1 Launch')")
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::AssertionFailed(_)));
}

#[tokio::test]
async fn test_closed_page_is_fatal() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![MockElement::button("Save")]);
    page.close_on_click = Some(1);
    let mut ctx = context();

    let err = run(&interpreter, &mut page, &mut ctx, "Save", "click('text=Save')")
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_credentials_are_substituted_before_typing() {
    let config = EngineConfig::default();
    let interpreter = ActionInterpreter::new(&config);
    let mut page = MockPage::new(ISSUES, vec![MockElement::input("text").name("workspace")]);
    let mut creds = HashMap::new();
    creds.insert("workspace".to_string(), "acme".to_string());
    let mut ctx = ExecutionContext::new(creds, ArtifactStore::disabled());

    run(&interpreter, &mut page, &mut ctx, "Pick", r#"type('input[name="workspace"]', '<WORKSPACE>')"#)
        .await
        .unwrap();

    assert_eq!(page.fills, vec![(1, "acme".to_string())]);
}
