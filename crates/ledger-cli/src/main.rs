use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for a proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the node is up
    Health,
    /// List the nodes the node knows about
    Nodes,
    /// Register a node
    AddNode {
        #[arg(long)]
        url: String,
        #[arg(long)]
        uuid: String,
    },
    /// Forget a node
    DeleteNode {
        #[arg(long)]
        url: String,
    },
    /// Print the full chain
    Chain,
    /// Mine a block
    Mine,
    /// Submit a transaction
    Submit {
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        receiver: String,
        /// Amount
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
    },
    /// Adopt the longest valid chain among the node's peers
    Resolve,
}

enum Request {
    Get(&'static str),
    Post(&'static str, Value),
}

impl Command {
    fn request(self) -> Request {
        match self {
            Command::Health => Request::Get("/health"),
            Command::Nodes => Request::Get("/nodes"),
            Command::AddNode { url, uuid } => {
                Request::Post("/nodes/add", json!({ "url": url, "uuid": uuid }))
            }
            Command::DeleteNode { url } => Request::Post("/nodes/delete", json!({ "url": url })),
            Command::Chain => Request::Get("/chain"),
            Command::Mine => Request::Post("/mine", Value::Null),
            Command::Submit {
                sender,
                receiver,
                amount,
            } => Request::Post(
                "/transactions",
                json!({ "sender": sender, "receiver": receiver, "amount": amount }),
            ),
            Command::Resolve => Request::Post("/resolve", Value::Null),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    let res = match cli.cmd.request() {
        Request::Get(path) => {
            debug!(%node, path, "GET");
            client.get(format!("{node}{path}")).send().await?
        }
        Request::Post(path, body) => {
            debug!(%node, path, "POST");
            client.post(format!("{node}{path}")).json(&body).send().await?
        }
    };
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
