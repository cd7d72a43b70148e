//! Fixtures shared by the unit tests: freshly mined chains and a transport
//! that records every call instead of touching the network.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::chain::Ledger;
use crate::config::NodeIdentity;
use crate::memory::MemStore;
use crate::mine::Miner;
use crate::transport::{PeerNode, Transport, TransportError};
use crate::Block;

/// A valid chain of `len` blocks, genesis included.
pub fn mined_chain(len: usize) -> Vec<Block> {
    let ledger = Ledger::new(Arc::new(MemStore::new()));
    ledger.ensure_genesis().unwrap();
    let miner = Miner::new(ledger.clone(), NodeIdentity::new("http://miner", "miner-uuid"));
    for _ in 1..len {
        miner.mine().unwrap();
    }
    ledger.full_chain().unwrap()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    GetNodes(String),
    GetBlockchain(String),
    AddNode { peer: String, url: String, uuid: String },
    DeleteNode { peer: String, url: String },
}

#[derive(Default)]
pub struct MockTransport {
    pub chains: HashMap<String, Vec<Block>>,
    pub node_lists: HashMap<String, Vec<PeerNode>>,
    pub unreachable: HashSet<String>,
    /// Peers that answer add-node without reporting success.
    pub rejecting: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, peer: &str, chain: Vec<Block>) -> Self {
        self.chains.insert(peer.to_string(), chain);
        self
    }

    pub fn with_nodes(mut self, peer: &str, nodes: &[(&str, &str)]) -> Self {
        let nodes = nodes
            .iter()
            .map(|(url, uuid)| PeerNode {
                url: url.to_string(),
                uuid: uuid.to_string(),
            })
            .collect();
        self.node_lists.insert(peer.to_string(), nodes);
        self
    }

    pub fn down(mut self, peer: &str) -> Self {
        self.unreachable.insert(peer.to_string());
        self
    }

    pub fn rejects(mut self, peer: &str) -> Self {
        self.rejecting.insert(peer.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn reach(&self, peer: &str) -> Result<(), TransportError> {
        if self.unreachable.contains(peer) {
            return Err(TransportError::Unreachable {
                peer: peer.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    async fn get_nodes(&self, peer: &str) -> Result<Vec<PeerNode>, TransportError> {
        self.record(Call::GetNodes(peer.to_string()));
        self.reach(peer)?;
        Ok(self.node_lists.get(peer).cloned().unwrap_or_default())
    }

    async fn get_blockchain(&self, peer: &str) -> Result<Vec<Block>, TransportError> {
        self.record(Call::GetBlockchain(peer.to_string()));
        self.reach(peer)?;
        self.chains
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                peer: peer.to_string(),
                status: 404,
            })
    }

    async fn add_node(&self, peer: &str, url: &str, uuid: &str) -> Result<(), TransportError> {
        self.record(Call::AddNode {
            peer: peer.to_string(),
            url: url.to_string(),
            uuid: uuid.to_string(),
        });
        self.reach(peer)?;
        if self.rejecting.contains(peer) {
            return Err(TransportError::Rejected {
                peer: peer.to_string(),
                reason: "node already exists".to_string(),
            });
        }
        Ok(())
    }

    async fn delete_node(&self, peer: &str, url: &str) -> Result<(), TransportError> {
        self.record(Call::DeleteNode {
            peer: peer.to_string(),
            url: url.to_string(),
        });
        self.reach(peer)
    }
}
