use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::PathBuf;

use beat_lanes::config;
use beat_lanes::history::{self, api::ANALYSES_PATH, ApiResponse, JsonHistoryStore};

#[derive(Parser)]
#[command(name = "beat-lanes-history")]
#[command(about = "Inspect and edit the analysis history")]
struct Args {
    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding history.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every stored analysis
    List,
    /// Append an analysis
    Add {
        #[arg(long)]
        file_name: String,
        #[arg(long)]
        bpm: String,
    },
    /// Send a raw request to the analyses endpoint
    Request {
        method: String,
        path: String,
        body: Option<String>,
    },
}

fn print_response(response: &ApiResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if response.status >= 400 {
        bail!("Request failed with status {}", response.status);
    }
    Ok(())
}

fn main() -> Result<()> {
    beat_lanes::init_logging();
    let args = Args::parse();

    let mut config = config::resolve(args.config.as_deref())?;
    config.apply_overrides(None, None, args.data_dir);
    let mut store = JsonHistoryStore::open(config.history_path());
    info!("History file: {}", store.path().display());

    let response = match args.command {
        Command::List => history::handle(&mut store, "GET", ANALYSES_PATH, None),
        Command::Add { file_name, bpm } => {
            let body = json!({ "fileName": file_name, "bpm": bpm }).to_string();
            history::handle(&mut store, "POST", ANALYSES_PATH, Some(&body))
        }
        Command::Request { method, path, body } => {
            history::handle(&mut store, &method, &path, body.as_deref())
        }
    };

    info!("{} response", response.status);
    print_response(&response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add() {
        let args = Args::parse_from([
            "beat-lanes-history",
            "add",
            "--file-name",
            "track.mp3",
            "--bpm",
            "128",
        ]);
        match args.command {
            Command::Add { file_name, bpm } => {
                assert_eq!(file_name, "track.mp3");
                assert_eq!(bpm, "128");
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn parses_raw_request() {
        let args = Args::parse_from(["beat-lanes-history", "request", "GET", "/api/analyses"]);
        assert!(matches!(args.command, Command::Request { body: None, .. }));
    }
}
