//! Batchtx CLI - Command-line interface for the Batchtx daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9640";

/// Server codes for a save whose transaction was opened and rolled back
const CAPACITY_EXCEEDED: i32 = 4003;
const BATCH_ROLLED_BACK: i32 = 4009;

#[derive(Parser)]
#[command(name = "batchtx")]
#[command(about = "Batchtx CLI: transactional batch user saves", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "BATCHTX_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved users
    Find {
        /// Show at most this many users
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Replace the user set with the contents of a JSON file, in one transaction
    Save {
        /// Coordination strategy
        #[arg(short, long, value_enum, default_value_t = StrategyArg::WaitAll)]
        strategy: StrategyArg,

        /// JSON file: an array of {name, email, age} or {"users": [...]}
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show worker pool status
    Pool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// Submit all chunks, wait for all, then decide
    WaitAll,
    /// Submit all chunks without waiting, collect in order
    Submit,
    /// One chunk at a time
    Chain,
}

impl StrategyArg {
    fn method(self) -> &'static str {
        match self {
            StrategyArg::WaitAll => "user.save.wait_all.v1",
            StrategyArg::Submit => "user.save.submit.v1",
            StrategyArg::Chain => "user.save.chain.v1",
        }
    }
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    data: Option<serde_json::Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error ({}): {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " {}", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonRpcError {}

fn save_failure_label(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<JsonRpcError>() {
        Some(e) if e.code == CAPACITY_EXCEEDED || e.code == BATCH_ROLLED_BACK => {
            "✗ Batch rolled back:"
        }
        _ => "✗ Save failed:",
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct UserInput {
    name: String,
    email: String,
    #[serde(default)]
    age: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UsersFile {
    List(Vec<UserInput>),
    Wrapped { users: Vec<UserInput> },
}

#[derive(Deserialize, Tabled)]
struct SaveResult {
    batch_id: String,
    strategy: String,
    chunks: usize,
    rows_inserted: i64,
    rows_cleared: u64,
    state: String,
}

#[derive(Deserialize, Tabled)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    age: i32,
}

#[derive(Deserialize)]
struct FindResult {
    total: i64,
    users: Vec<UserRow>,
}

fn parse_users(content: &str) -> Result<Vec<UserInput>> {
    let parsed: UsersFile = serde_json::from_str(content).context("Invalid users JSON")?;
    Ok(match parsed {
        UsersFile::List(users) | UsersFile::Wrapped { users } => users,
    })
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        return Err(error.into());
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Find { limit } => {
            let result = call_rpc(&cli.rpc_url, "user.find.v1", json!({ "limit": limit })).await?;
            let found: FindResult = serde_json::from_value(result)?;

            println!(
                "{}",
                format!("{} users ({} shown)", found.total, found.users.len())
                    .cyan()
                    .bold()
            );
            if !found.users.is_empty() {
                println!();
                println!("{}", Table::new(found.users));
            }
        }

        Commands::Save { strategy, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let users = parse_users(&content)?;

            println!(
                "{}",
                format!("Saving {} users ({:?})...", users.len(), strategy).cyan()
            );

            match call_rpc(&cli.rpc_url, strategy.method(), json!({ "users": users })).await {
                Ok(result) => {
                    let save_result: SaveResult = serde_json::from_value(result)?;
                    println!("{}", "✓ Batch committed".green().bold());
                    println!();
                    println!("{}", Table::new(vec![save_result]));
                }
                Err(e) => {
                    println!("{} {}", save_failure_label(&e).red().bold(), e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Pool => {
            println!("{}", "Worker Pool".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.pool.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Workers:".bold(), stats["workers"]);
                    println!("  {} {}", "Backlog:".bold(), stats["backlog"]);
                    println!("  {} {}", "Capacity:".bold(), stats["capacity"]);
                    println!("  {} {}", "In flight:".bold(), stats["in_flight"]);
                    println!("  {} {}", "Running:".bold(), stats["running"]);
                    println!("  {} {}", "Peak running:".bold(), stats["peak_running"]);
                    println!("  {} {}", "Started:".bold(), stats["started"]);
                    println!("  {} {}", "Rejected:".bold(), stats["rejected"]);
                    println!("  {} {}", "Chunk size:".bold(), stats["chunk_size"]);
                    if stats["shutdown"].as_bool().unwrap_or(false) {
                        println!("  {} {}", "Admission:".bold(), "CLOSED".red());
                    }
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
