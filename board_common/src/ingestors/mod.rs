//! # Data Ingestors Module
//!
//! Long-running clients that keep local state in step with the backend.
//!
//! ## Purpose:
//! Each submodule owns one background loop: it talks to the backend through
//! the shared [`ApiClient`](crate::retrieve::ApiClient), publishes its state
//! through a `tokio::sync::watch` channel, and stops on a `broadcast`
//! shutdown signal.
//!
//! ## Contained Modules:
//! - **`live_feed`**: the activity feed, seeded by a bulk fetch and grown by
//!   the server-sent-event stream.
//! - **`leaderboard_polling`**: a fixed-interval poller for both track
//!   leaderboards.

/// Bulk fetch plus live stream for the activity feed.
pub mod live_feed;
/// Self-scheduling leaderboard poller.
pub mod leaderboard_polling;

// --- Public API Re-exports ---
pub use leaderboard_polling::{LeaderboardPoller, LeaderboardSnapshot};
pub use live_feed::{LiveFeed, LiveFeedIngester};
