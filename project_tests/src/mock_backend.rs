//! # Mock Backend Runner
//!
//! Serves the mock leaderboard backend with a little sample data so the
//! `board-*` commands can be tried without the real service. Listens on
//! `MOCK_BACKEND_ADDR` (default `127.0.0.1:8000`) until Ctrl-C.
//!
//! Sign in with `board-login --token a1 --username octocat --refresh-token r1`.

use std::time::Duration;

use project_tests::{MockBackend, Reply};
use serde_json::json;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::var("MOCK_BACKEND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    let backend = MockBackend::serve(TcpListener::bind(&addr).await?);

    backend.add_user(
        project_tests::INITIAL_ACCESS_TOKEN,
        json!({"github_username": "octocat", "full_name": "Mona Lisa", "category": "fullstack", "points": 120}),
    );
    backend.set_leaderboard(Reply::Json(json!({
        "leaderboards": {
            "fullstack": [
                {"github_username": "octocat", "points": 120, "pr_count": 7, "rank": 1},
                {"github_username": "hubot", "points": 90, "pr_count": 4, "rank": 2}
            ],
            "aiml": [
                {"github_username": "copilot", "points": 75, "pr_count": 3, "rank": 1}
            ]
        }
    })));
    backend.set_projects(Reply::Json(json!({
        "projects": [{"id": "1", "name": "board", "url": "https://github.com/example/board"}]
    })));
    backend.set_issues("1", json!([{"issue_id": "11", "title": "Fix flaky test", "issue_url": "https://github.com/example/board/issues/11"}]));
    backend.set_recent(Reply::Json(json!({
        "updates": [
            {"time": "2024-03-01T10:00:00Z", "github_username": "octocat", "message": "merged #12", "event_type": "bounty"}
        ]
    })));

    println!("Mock backend listening on {}", backend.url());

    let mut tick = tokio::time::interval(Duration::from_secs(5));
    let mut n: i64 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => {
                n += 1;
                let now = now_millis() + n;
                backend.send_live_message(&format!(r#""octocat","heartbeat {n}","issue","{now}""#));
            }
        }
    }
    Ok(())
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
