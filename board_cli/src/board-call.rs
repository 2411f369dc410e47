//! # `board-call`: one authenticated request
//!
//! Sends a request through the session-aware client (so an expired access
//! token is refreshed once) and prints the `{success, data, error, status}`
//! envelope as JSON. Exits non-zero when `success` is false.
//!
//! ```text
//! board-call [--method GET] [-H 'Name: value']... [-q key=value]... [--data JSON] <URL>
//! ```

use anyhow::{Context, Result, anyhow};
use board_cli::{CommonArgs, bootstrap};
use board_common::{ApiRequest, HttpMethod};
use clap::Parser;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(about = "Call the leaderboard backend with the stored session.", version)]
struct Cli {
    #[arg(help = "Absolute URL, or a path relative to the backend URL.")]
    url: String,

    #[arg(short = 'X', long, default_value = "GET", help = "GET, POST, PUT, PATCH or DELETE.")]
    method: HttpMethod,

    #[arg(short = 'H', long = "header", value_parser = parse_header, help = "Extra header as 'Name: value'. Repeatable.")]
    headers: Vec<(String, String)>,

    #[arg(short = 'q', long = "query", value_parser = parse_param, help = "Query parameter as key=value. Repeatable.")]
    params: Vec<(String, String)>,

    #[arg(short, long, help = "JSON body, sent for POST, PUT and PATCH only.")]
    data: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("expected 'Name: value', got '{raw}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_param(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{raw}'"))?;
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = bootstrap(&cli.common, "board_call")?;

    let mut request = ApiRequest::new(cli.method, cli.url);
    request.headers = cli.headers;
    request.params = cli.params;
    if let Some(raw) = cli.data {
        let body: Value = serde_json::from_str(&raw).context("--data is not valid JSON")?;
        request = request.json(body);
    }

    let response = app.client.call::<Value>(&request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
