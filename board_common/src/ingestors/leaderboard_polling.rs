//! # Leaderboard Polling Ingestor
//!
//! A self-scheduling poller for `GET /leaderboard`. The backend has no push
//! channel for rankings, so the poller fetches both track leaderboards on a
//! fixed interval and publishes them through a `watch` channel.
//!
//! ## Key Design Principles:
//! - **Last good snapshot wins**: a failed poll is logged and recorded in
//!   `last_error`, but the previously published boards stay visible.
//! - **Session aware**: polls go through the [`ApiClient`], so an expired
//!   access token is refreshed like for any other call.
//! - **Cooperative shutdown**: the loop exits on the shared broadcast
//!   shutdown signal, including while a poll is in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

use crate::models::Leaderboards;
use crate::retrieve::ApiClient;

/// Latest leaderboard state as seen by consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaderboardSnapshot {
    pub boards: Option<Leaderboards>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl LeaderboardSnapshot {
    #[must_use]
    pub fn rank_of(&self, handle: &str) -> Option<u32> {
        self.boards.as_ref().and_then(|b| b.rank_of(handle))
    }
}

pub struct LeaderboardPoller {
    client: Arc<ApiClient>,
    interval: Duration,
    state: watch::Sender<LeaderboardSnapshot>,
}

impl LeaderboardPoller {
    /// Poller using the client's configured interval.
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        let interval = client.config().leaderboard_interval();
        Self::with_interval(client, interval)
    }

    #[must_use]
    pub fn with_interval(client: Arc<ApiClient>, interval: Duration) -> Self {
        let (state, _) = watch::channel(LeaderboardSnapshot::default());
        Self {
            client,
            interval,
            state,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LeaderboardSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> LeaderboardSnapshot {
        self.state.borrow().clone()
    }

    /// Fetch once and publish. Returns whether the poll succeeded.
    pub async fn poll_once(&self) -> bool {
        let response = self.client.fetch_leaderboards().await;
        match response.data {
            Some(boards) if response.success => {
                tracing::debug!(
                    fullstack = boards.fullstack.len(),
                    aiml = boards.aiml.len(),
                    "Leaderboards refreshed"
                );
                self.state.send_modify(|s| {
                    s.boards = Some(boards);
                    s.updated_at = Some(Utc::now());
                    s.last_error = None;
                });
                true
            }
            _ => {
                let error = response
                    .error
                    .unwrap_or_else(|| "Failed to fetch leaderboard".to_string());
                tracing::warn!(%error, "Leaderboard poll failed, keeping previous snapshot");
                self.state.send_modify(|s| s.last_error = Some(error));
                false
            }
        }
    }

    /// Poll immediately, then every interval, until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Leaderboard poller started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = self.poll_once() => {}
                    }
                }
            }
        }
        tracing::info!("Leaderboard poller stopped");
    }
}
