//! # `board-login`: complete a sign-in
//!
//! Takes the token and username handed back by the OAuth callback, verifies
//! the token with the backend, and stores the resulting session.
//!
//! ```text
//! board-login --token <TOKEN> --username <HANDLE> [--refresh-token <TOKEN>]
//! ```

use anyhow::{Result, bail};
use board_cli::{CommonArgs, bootstrap};
use board_common::session::complete_sign_in;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(about = "Verify an OAuth callback token and store the session.", version)]
struct Cli {
    #[arg(long, env = "BOARD_TOKEN", help = "Access token from the sign-in callback.")]
    token: String,

    #[arg(long, help = "GitHub username from the sign-in callback.")]
    username: String,

    #[arg(long, env = "BOARD_REFRESH_TOKEN", help = "Refresh token, when the backend issued one.")]
    refresh_token: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = bootstrap(&cli.common, "board_login")?;

    let response = complete_sign_in(
        &app.client,
        &cli.token,
        &cli.username,
        cli.refresh_token.as_deref(),
    )
    .await;

    match response.data {
        Some(identity) if response.success => {
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(())
        }
        _ => bail!(
            "Sign-in failed: {}",
            response.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}
