//! Leaderboard reads and the polling loop.

use std::sync::Arc;
use std::time::Duration;

use board_common::ingestors::LeaderboardPoller;
use project_tests::{MockBackend, Reply, client_with};
use serde_json::json;
use tokio::sync::broadcast;

fn boards(top: &str) -> Reply {
    Reply::Json(json!({
        "message": "ok",
        "leaderboards": {
            "fullstack": [
                {"github_username": top, "full_name": "Top Dog", "points": 120, "pr_count": 7, "issues_solved": 3, "rank": 1},
                {"github_username": "monalisa", "points": 90, "pr_count": 4, "rank": 2}
            ],
            "aiml": [
                {"github_username": "Copilot", "points": 75, "rank": 1}
            ]
        }
    }))
}

#[tokio::test]
async fn fetch_leaderboards_unwraps_both_tracks() {
    let backend = MockBackend::start().await;
    backend.set_leaderboard(boards("octocat"));
    let (client, _) = client_with(backend.client_config(), None);

    let boards = client.fetch_leaderboards().await.into_data().unwrap();

    assert_eq!(boards.fullstack.len(), 2);
    assert_eq!(boards.fullstack[1].issues_solved, 0);
    assert_eq!(boards.rank_of("copilot"), Some(1));
    assert_eq!(boards.rank_of("MonaLisa"), Some(2));
    assert_eq!(boards.rank_of("nobody"), None);
}

#[tokio::test]
async fn failed_poll_keeps_the_last_good_boards() {
    let backend = MockBackend::start().await;
    backend.set_leaderboard(boards("octocat"));
    let (client, _) = client_with(backend.client_config(), None);
    let poller = LeaderboardPoller::with_interval(client, Duration::from_secs(60));

    assert!(poller.poll_once().await);
    let good = poller.snapshot();
    assert!(good.updated_at.is_some());
    assert!(good.last_error.is_none());

    backend.set_leaderboard(Reply::Fail(502, json!({"message": "upstream unavailable"})));
    assert!(!poller.poll_once().await);

    let after = poller.snapshot();
    assert_eq!(after.boards, good.boards);
    assert_eq!(after.updated_at, good.updated_at);
    assert_eq!(after.last_error.as_deref(), Some("upstream unavailable"));
    assert_eq!(after.rank_of("octocat"), Some(1));
}

#[tokio::test]
async fn poller_runs_on_its_interval_until_shutdown() {
    let backend = MockBackend::start().await;
    backend.set_leaderboard(boards("octocat"));
    let (client, _) = client_with(backend.client_config(), None);
    let poller = Arc::new(LeaderboardPoller::with_interval(client, Duration::from_millis(50)));
    let mut rx = poller.subscribe();

    let (shutdown, _) = broadcast::channel(1);
    let task = {
        let poller = Arc::clone(&poller);
        let stop = shutdown.subscribe();
        tokio::spawn(async move { poller.run(stop).await })
    };

    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.boards.is_some()))
        .await
        .unwrap()
        .unwrap();

    backend.set_leaderboard(boards("hubot"));
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.rank_of("hubot") == Some(1)))
        .await
        .unwrap()
        .unwrap();

    shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(backend.hits("leaderboard") >= 2);
}
