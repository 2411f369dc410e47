//! Typed profile and registration reads.

use project_tests::{MockBackend, RefreshMode, Reply, client_with, session};
use serde_json::json;

#[tokio::test]
async fn profile_is_fetched_for_the_handle() {
    let backend = MockBackend::start().await;
    backend.set_profile(
        "octocat",
        json!({
            "message": "ok",
            "github_username": "octocat",
            "first_name": "Mona",
            "last_name": "Lisa",
            "bounty": 40,
            "pull_request_count": 6,
            "rank": 3,
            "badges": ["first-pr"]
        }),
    );
    let (client, _) = client_with(backend.client_config(), Some(session("a1", true)));

    let profile = client.fetch_profile("octocat").await.into_data().unwrap();

    assert_eq!(profile.full_name(), "Mona Lisa");
    assert_eq!(profile.rank, Some(3));
    assert_eq!(profile.bounty, 40);
    assert_eq!(profile.test_count, 0);
    assert_eq!(profile.badges, vec!["first-pr".to_string()]);
}

#[tokio::test]
async fn unknown_profile_surfaces_the_detail() {
    let backend = MockBackend::start().await;
    let (client, _) = client_with(backend.client_config(), Some(session("a1", true)));

    let response = client.fetch_profile("ghost").await;

    assert!(!response.success);
    assert_eq!(response.status, Some(404));
    assert_eq!(response.error.as_deref(), Some("User not found"));
}

#[tokio::test]
async fn profile_read_refreshes_an_expired_token() {
    let backend = MockBackend::start().await;
    backend.accept_token("stale-for-everyone");
    backend.set_refresh(RefreshMode::Issue("a2".into()));
    backend.set_profile("octocat", json!({"github_username": "octocat"}));
    let (client, _) = client_with(backend.client_config(), Some(session("a1", true)));

    assert!(client.fetch_profile("octocat").await.success);
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.hits("profile"), 2);
}

#[tokio::test]
async fn registrations_are_unwrapped() {
    let backend = MockBackend::start().await;
    backend.set_registrations(Reply::Json(json!({
        "profiles": [
            {"github_username": "octocat", "full_name": "Mona Lisa", "bounty": 40, "solutions": 2},
            {"github_username": "hubot"}
        ]
    })));
    let (client, _) = client_with(backend.client_config(), None);

    let registrations = client.fetch_registrations().await.into_data().unwrap();

    assert_eq!(registrations.len(), 2);
    assert_eq!(registrations[0].solutions, 2);
    assert_eq!(registrations[1].bounty, 0);
}

#[tokio::test]
async fn issue_repo_id_is_sent_as_one_segment() {
    let backend = MockBackend::start().await;
    backend.set_issues(
        "example/board",
        json!([{"issue_id": 7, "title": "Slash in id", "issue_url": "https://github.com/example/board/issues/7"}]),
    );
    let (client, _) = client_with(backend.client_config(), None);

    let issues = client.fetch_issues("example/board").await.into_data().unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_id, "7");
    assert_eq!(backend.hits("issues"), 1);
}
