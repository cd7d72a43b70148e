use clap::Parser;
use ledger_core::constants::PEER_TIMEOUT_SECS;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node", about = "Proof-of-work ledger node")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    /// URL peers use to reach this node. Defaults to http://<listen>
    #[arg(long)]
    pub node_url: Option<String>,

    /// Identifier credited with mining rewards
    #[arg(long)]
    pub node_uuid: Option<String>,

    /// Existing node to join through on first start
    #[arg(long)]
    pub neighbour: Option<String>,

    /// Timeout for every request to a peer
    #[arg(long, default_value_t = PEER_TIMEOUT_SECS)]
    pub peer_timeout_secs: u64,
}

impl Args {
    pub fn node_url(&self) -> String {
        self.node_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["ledger-node"]);
        assert_eq!(args.listen, "127.0.0.1:8080");
        assert_eq!(args.data_dir, "./data");
        assert_eq!(args.peer_timeout_secs, 10);
        assert_eq!(args.node_url(), "http://127.0.0.1:8080");
        assert!(args.neighbour.is_none());
    }

    #[test]
    fn explicit_node_url_wins() {
        let args = Args::parse_from([
            "ledger-node",
            "--listen",
            "0.0.0.0:9000",
            "--node-url",
            "http://ledger.example:9000/",
            "--neighbour",
            "http://peer:8080/",
        ]);
        assert_eq!(args.node_url(), "http://ledger.example:9000/");
        assert_eq!(args.neighbour.as_deref(), Some("http://peer:8080/"));
    }
}
