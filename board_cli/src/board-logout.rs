//! # `board-logout`: drop the stored session

use anyhow::Result;
use board_cli::{CommonArgs, bootstrap};
use board_common::session::sign_out;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(about = "Sign out and remove the persisted session.", version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = bootstrap(&cli.common, "board_logout")?;

    if !app.client.session().is_signed_in() {
        println!("Not signed in.");
        return Ok(());
    }
    sign_out(&app.client)?;
    println!("Signed out.");
    Ok(())
}
