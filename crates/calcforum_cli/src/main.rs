//! Command-line driver for the forum boundary.
//!
//! # Responsibility
//! - Probe core linkage (`ping`).
//! - Send one request through `ForumApi` and print status plus JSON body.
//!
//! Database and logging settings come from `CALCFORUM_*` variables.

use calcforum_api::{ApiConfig, ApiRequest, ForumApi};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "calcforum")]
#[command(about = "Calculation forum command-line driver")]
struct Cli {
    /// Database file; overrides CALCFORUM_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core ping and version
    Ping,
    /// Register a user
    Register {
        name: String,
        username: String,
        email: String,
    },
    /// Send one request, e.g. `request GET posts/1`
    Request {
        method: String,
        path: String,
        /// Acting user id
        #[arg(long)]
        actor: Option<i64>,
        /// JSON body
        #[arg(long)]
        body: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = ApiConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Err(err) = config.init_logging() {
        eprintln!("logging disabled: {err}");
    }
    let api = ForumApi::new(config);

    let request = match cli.command {
        Commands::Ping => {
            println!("calcforum_core ping={}", calcforum_api::ping());
            println!("calcforum_core version={}", calcforum_api::core_version());
            return ExitCode::SUCCESS;
        }
        Commands::Register {
            name,
            username,
            email,
        } => ApiRequest::new("POST", "users").with_body(
            json!({"name": name, "username": username, "email": email}).to_string(),
        ),
        Commands::Request {
            method,
            path,
            actor,
            body,
        } => ApiRequest {
            method,
            path,
            body,
            actor,
        },
    };

    let response = api.handle(&request);
    println!("{}", response.status);
    let body = response.body_text();
    if !body.is_empty() {
        println!("{body}");
    }
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
