//! # Live Activity Feed Ingestor
//!
//! Combines the one-time bulk fetch of `/updates/latest` with the
//! `/updates/live` server-sent-event stream into one bounded, newest-first
//! [`FeedLog`](crate::feed::FeedLog).
//!
//! ## Key Design Principles:
//! - **Independent failures**: the bulk fetch and the stream report through
//!   separate states ([`LoadState`] and [`StreamState`]). Neither failure
//!   touches data the other one produced.
//! - **Per-message isolation**: a payload that fails to decode is logged and
//!   dropped; the stream keeps going.
//! - **Published state**: every change is published through a
//!   `tokio::sync::watch` channel, so consumers always read a consistent
//!   snapshot.
//! - **Reconnect policy**: without a [`ReconnectPolicy`] the feed goes silent
//!   after the first disconnect. With one, reconnects back off exponentially
//!   and the delay resets after every successful connect.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::configs::ReconnectPolicy;
use crate::feed::{
    decode_live_entry, CategoryFilter, FeedEntry, FeedSnapshot, LoadState, SseDecoder, SseEvent,
    StreamState, UpdatesPayload, DISCONNECTED_MESSAGE, FETCH_FAILED_MESSAGE,
    NETWORK_ERROR_MESSAGE,
};
use crate::retrieve::endpoints::{LIVE_UPDATES_PATH, RECENT_UPDATES_PATH};
use crate::retrieve::{ApiClient, ApiRequest};

/// Drives the feed state. Usually owned by a [`LiveFeed`] handle.
pub struct LiveFeedIngester {
    client: Arc<ApiClient>,
    recent_limit: usize,
    reconnect: Option<ReconnectPolicy>,
    state: watch::Sender<FeedSnapshot>,
}

impl LiveFeedIngester {
    /// Build an ingester with the limits from the client's configuration.
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        let config = client.config();
        let recent_limit = config.recent_limit;
        let reconnect = config.reconnect;
        let (state, _) = watch::channel(FeedSnapshot::new(config.feed_capacity));
        Self {
            client,
            recent_limit,
            reconnect,
            state,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    /// Fetch the most recent updates once and replace the log with them.
    /// Failures are reported in the returned state and not retried.
    pub async fn load_recent(&self) -> LoadState {
        let response = self
            .client
            .call::<UpdatesPayload>(&ApiRequest::get(RECENT_UPDATES_PATH))
            .await;

        let load = match (response.success, response.data) {
            (true, Some(payload)) => {
                let entries = payload.into_entries(self.recent_limit);
                tracing::info!(count = entries.len(), "Loaded recent updates");
                self.state.send_modify(|s| {
                    s.log.seed(entries);
                    s.load = LoadState::Ready;
                });
                return LoadState::Ready;
            }
            _ if response.status.is_some_and(|code| code >= 400) => {
                LoadState::FetchFailed(FETCH_FAILED_MESSAGE.to_string())
            }
            _ => LoadState::FetchFailed(NETWORK_ERROR_MESSAGE.to_string()),
        };

        tracing::warn!(error = ?response.error, "Recent updates unavailable");
        let published = load.clone();
        self.state.send_modify(|s| s.load = published);
        load
    }

    /// Keep the live stream open until `shutdown` fires, or until the first
    /// disconnect when no reconnect policy is configured.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut backoff = ReconnectBackoff::default();

        loop {
            self.set_stream(StreamState::Connecting);
            let connect = tokio::select! {
                _ = shutdown.recv() => break,
                res = self.client.open_event_stream(LIVE_UPDATES_PATH) => res,
            };

            match connect {
                Ok(response) => {
                    self.set_stream(StreamState::Connected);
                    tracing::info!("Connected to live updates");

                    let mut decoder = SseDecoder::new();
                    let mut body = response.bytes_stream();
                    let reason = loop {
                        tokio::select! {
                            _ = shutdown.recv() => {
                                self.set_stream(StreamState::Closed);
                                return;
                            }
                            chunk = body.next() => match chunk {
                                Some(Ok(bytes)) => {
                                    backoff.reset();
                                    for event in decoder.feed(&bytes) {
                                        self.handle_event(event);
                                    }
                                }
                                Some(Err(e)) => break e.to_string(),
                                None => break "stream closed by server".to_string(),
                            }
                        }
                    };
                    tracing::warn!(%reason, "Live updates disconnected");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not open live updates stream");
                }
            }

            self.set_stream(StreamState::Errored(DISCONNECTED_MESSAGE.to_string()));

            let Some(policy) = self.reconnect else {
                tracing::info!("Reconnect disabled, live feed is silent until reopened");
                return;
            };
            let delay = backoff.next_delay(&policy);
            tracing::info!(attempt = backoff.attempts(), delay_ms = delay.as_millis() as u64, "Reconnecting to live updates");
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_stream(StreamState::Closed);
    }

    /// Apply one dispatched SSE event. Returns whether the log changed.
    pub fn handle_event(&self, event: SseEvent) -> bool {
        if event.event != "message" {
            tracing::debug!(event = %event.event, "Ignoring non-message event");
            return false;
        }
        match decode_live_entry(&event.data) {
            Ok(entry) => self.push(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed live update");
                false
            }
        }
    }

    fn push(&self, entry: FeedEntry) -> bool {
        let actor = entry.actor.clone();
        let inserted = self.state.send_if_modified(|s| s.log.push(entry));
        if inserted {
            tracing::debug!(%actor, "Live update added");
        } else {
            tracing::debug!(%actor, "Duplicate live update ignored");
        }
        inserted
    }

    fn set_stream(&self, stream: StreamState) {
        self.state.send_if_modified(|s| {
            if s.stream == stream {
                return false;
            }
            s.stream = stream;
            true
        });
    }
}

/// An open feed: the bulk fetch and the stream run as background tasks until
/// [`LiveFeed::close`] or drop.
pub struct LiveFeed {
    ingester: Arc<LiveFeedIngester>,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveFeed {
    /// Start the bulk fetch and open the stream. Must be called inside a
    /// tokio runtime.
    #[must_use]
    pub fn open(client: Arc<ApiClient>) -> Self {
        let ingester = Arc::new(LiveFeedIngester::new(client));
        let (shutdown, _) = broadcast::channel(1);

        let loader = {
            let ingester = Arc::clone(&ingester);
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = stop.recv() => tracing::debug!("Feed closed before recent updates arrived"),
                    _ = ingester.load_recent() => {}
                }
            })
        };
        let streamer = {
            let ingester = Arc::clone(&ingester);
            let stop = shutdown.subscribe();
            tokio::spawn(async move { ingester.run(stop).await })
        };

        Self {
            ingester,
            shutdown,
            tasks: vec![loader, streamer],
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.ingester.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.ingester.snapshot()
    }

    /// Entries for display under `filter`, newest first.
    #[must_use]
    pub fn visible(&self, filter: CategoryFilter) -> Vec<FeedEntry> {
        self.ingester.state.borrow().visible(filter)
    }

    /// Stop both tasks and wait for them. A bulk result that has not arrived
    /// yet is discarded.
    pub async fn close(mut self) {
        let _ = self.shutdown.send(());
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Live feed task failed");
                }
            }
        }
        self.ingester.set_stream(StreamState::Closed);
        tracing::info!("Live feed closed");
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Consecutive failed connections. Only data from the server counts as
/// recovery; a connection that closes before sending anything keeps growing
/// the delay.
#[derive(Debug, Default)]
struct ReconnectBackoff {
    failures: u32,
}

impl ReconnectBackoff {
    fn reset(&mut self) {
        self.failures = 0;
    }

    fn next_delay(&mut self, policy: &ReconnectPolicy) -> Duration {
        self.failures = self.failures.saturating_add(1);
        policy.delay_for(self.failures)
    }

    fn attempts(&self) -> u32 {
        self.failures
    }
}
