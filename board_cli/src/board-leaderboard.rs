//! # `board-leaderboard`: print or watch the leaderboards
//!
//! With `--once`, fetches both tracks a single time. Otherwise polls on the
//! configured interval and reprints after every successful poll until
//! Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use board_cli::{CommonArgs, bootstrap, shutdown_signal};
use board_common::ingestors::{LeaderboardPoller, LeaderboardSnapshot};
use clap::Parser;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(about = "Show the fullstack and AI/ML leaderboards.", version)]
struct Cli {
    #[arg(long, help = "Fetch once and exit.")]
    once: bool,

    #[arg(long, value_name = "HANDLE", help = "Only print the rank of this GitHub user.")]
    rank: Option<String>,

    #[arg(long, help = "Poll interval in seconds. Defaults to the configured value.")]
    interval: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

fn render(snapshot: &LeaderboardSnapshot, rank_of: Option<&str>) {
    let Some(boards) = &snapshot.boards else {
        return;
    };
    if let Some(handle) = rank_of {
        match snapshot.rank_of(handle) {
            Some(rank) => println!("{handle}: #{rank}"),
            None => println!("{handle}: not ranked"),
        }
        return;
    }
    for (title, entries) in [("Fullstack", &boards.fullstack), ("AI/ML", &boards.aiml)] {
        println!("== {title} ==");
        for entry in entries {
            println!(
                "{:>4}  {:<24} {:>6} pts  {:>3} PRs",
                entry.rank, entry.github_username, entry.points, entry.pr_count
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = bootstrap(&cli.common, "board_leaderboard")?;

    let interval = cli
        .interval
        .map_or_else(|| app.config.leaderboard_interval(), Duration::from_secs);
    let poller = Arc::new(LeaderboardPoller::with_interval(app.client.clone(), interval));

    if cli.once {
        if !poller.poll_once().await {
            bail!(
                "{}",
                poller
                    .snapshot()
                    .last_error
                    .unwrap_or_else(|| "Failed to fetch leaderboards".to_string())
            );
        }
        render(&poller.snapshot(), cli.rank.as_deref());
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let task = {
        let poller = Arc::clone(&poller);
        let stop = shutdown_tx.subscribe();
        tokio::spawn(async move { poller.run(stop).await })
    };

    let mut updates = poller.subscribe();
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
                if let Some(error) = &snapshot.last_error {
                    tracing::warn!(%error, "Leaderboard poll failed, showing last good data");
                    continue;
                }
                render(&snapshot, cli.rank.as_deref());
            }
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = task.await {
        tracing::error!(error = %e, "Leaderboard poller task failed");
    }
    Ok(())
}
