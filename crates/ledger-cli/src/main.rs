use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:5000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending pool
    Submit {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        recipient: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Mine the pending pool into a new block
    Mine,
    /// Print the node's full chain
    Chain,
    /// Register peer nodes (e.g. http://10.0.0.2:5000)
    Register {
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Ask the node to adopt the longest valid chain among its peers
    Sync,
    /// Print synchronization counters
    Stats,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: f64,
}

#[derive(Serialize)]
struct Nodes {
    nodes: Vec<String>,
}

fn endpoint(node: &str, path: &str) -> String {
    format!("{}/{}", node.trim_end_matches('/'), path.trim_start_matches('/'))
}

async fn print_response(res: Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = Client::new();
    let node = cli.node.as_str();
    let res = match cli.cmd {
        Command::Submit {
            sender,
            recipient,
            amount,
        } => {
            let tx = Tx {
                sender,
                recipient,
                amount,
            };
            client
                .post(endpoint(node, "/transactions/new"))
                .json(&tx)
                .send()
                .await?
        }
        Command::Mine => client.get(endpoint(node, "/mine")).send().await?,
        Command::Chain => client.get(endpoint(node, "/blockchain")).send().await?,
        Command::Register { nodes } => {
            client
                .post(endpoint(node, "/nodes/add_nodes"))
                .json(&Nodes { nodes })
                .send()
                .await?
        }
        Command::Sync => client.get(endpoint(node, "/nodes/sync")).send().await?,
        Command::Stats => client.get(endpoint(node, "/nodes/sync/stats")).send().await?,
    };
    debug!(url = %res.url(), "request complete");
    print_response(res).await
}
