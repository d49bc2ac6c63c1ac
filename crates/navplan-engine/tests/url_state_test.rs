use navplan_engine::url_state::UrlState;

#[test]
fn test_issue_creation_url() {
    let state =
        UrlState::from_url("https://linear.app/acme/team/ENG/issues/new?template=bug&label=a&label=b");

    assert!(state.is_issue);
    assert!(state.is_create);
    assert!(!state.is_project);
    assert!(!state.is_login);
    assert_eq!(
        state.path_parts,
        vec!["acme", "team", "eng", "issues", "new"]
    );
    assert_eq!(state.query_params["label"], vec!["a", "b"]);
    assert_eq!(state.query_params["template"], vec!["bug"]);
    assert_eq!(state.active_flags(), vec!["create", "issue"]);
    assert_eq!(state.context_keywords(), vec!["issue"]);
}

#[test]
fn test_login_url_with_encoded_redirect() {
    let state = UrlState::from_url("https://app.example.com/auth/sign-in?next=%2Fprojects");

    assert!(state.is_login);
    assert!(!state.is_project);
    assert_eq!(state.query_params["next"], vec!["/projects"]);
    assert!(state.context_keywords().is_empty());
}

#[test]
fn test_views_and_settings() {
    let state = UrlState::from_url("https://app.example.com/acme/views/all");
    assert!(state.is_view);
    assert_eq!(state.context_keywords(), vec!["view"]);

    let state = UrlState::from_url("https://app.example.com/settings/preferences");
    assert!(state.is_settings);
    assert!(!state.is_create);
}

#[test]
fn test_unparseable_input_keeps_keyword_flags() {
    let state = UrlState::from_url("  not a url /projects/new ");
    assert!(state.is_project);
    assert!(state.is_create);
    assert!(state.path_parts.is_empty());
    assert!(state.query_params.is_empty());
    assert_eq!(state.url, "not a url /projects/new");
}
