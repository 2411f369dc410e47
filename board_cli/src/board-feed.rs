//! # `board-feed`: follow the live activity feed
//!
//! Loads the most recent updates, then prints each new entry as the stream
//! delivers it. Runs until Ctrl-C or SIGTERM.

use anyhow::Result;
use board_cli::{CommonArgs, bootstrap, new_entries, shutdown_signal};
use board_common::feed::{CategoryFilter, FeedEntry, LoadState, StreamState};
use board_common::ingestors::LiveFeed;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(about = "Follow the leaderboard activity feed.", version)]
struct Cli {
    #[arg(long, default_value = "all", help = "all, top3, bounty or issue.")]
    filter: CategoryFilter,

    #[arg(long, help = "Print entries as JSON lines.")]
    json: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn print_entry(entry: &FeedEntry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(entry)?);
    } else {
        println!(
            "{} [{}] {}: {}",
            entry.occurred_at,
            entry.category.label(),
            entry.actor,
            entry.message
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = bootstrap(&cli.common, "board_feed")?;

    let feed = LiveFeed::open(app.client.clone());
    let mut updates = feed.subscribe();
    let mut previous: Vec<FeedEntry> = Vec::new();
    let mut last_load = LoadState::Loading;
    let mut last_stream = StreamState::Connecting;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();

                if snapshot.load != last_load {
                    if let LoadState::FetchFailed(reason) = &snapshot.load {
                        eprintln!("{reason}");
                    }
                    last_load = snapshot.load.clone();
                }
                if snapshot.stream != last_stream {
                    if let StreamState::Errored(reason) = &snapshot.stream {
                        eprintln!("{reason}");
                    }
                    last_stream = snapshot.stream.clone();
                }

                let current = snapshot.log.to_vec();
                // Oldest first so the terminal reads top to bottom.
                for entry in new_entries(&previous, &current)
                    .iter()
                    .rev()
                    .filter(|e| cli.filter.matches(e))
                {
                    print_entry(entry, cli.json)?;
                }
                previous = current;
            }
        }
    }

    feed.close().await;
    Ok(())
}
