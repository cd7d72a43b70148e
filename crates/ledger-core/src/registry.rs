//! Peer membership and gossip.
//!
//! The registry owns the node records. Gossip walks the known peers one at a
//! time; a peer that does not acknowledge an announcement is dropped locally
//! and its removal is passed on to the remaining peers, once, with no further
//! cascade.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chain::LedgerStore;
use crate::config::NodeIdentity;
use crate::consensus::{ConsensusResolver, Resolution};
use crate::transport::{PeerNode, Transport, TransportError};
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub url: String,
    pub uuid: String,
    pub timestamp: u64,
}

impl From<Node> for PeerNode {
    fn from(node: Node) -> Self {
        PeerNode {
            url: node.url,
            uuid: node.uuid,
        }
    }
}

/// Storage for node records. Iteration order is insertion order.
pub trait NodeStore: Send + Sync {
    /// Fails with [`Error::Conflict`] if `url` is already present.
    fn insert_node(&self, url: &str, uuid: &str) -> Result<Node>;

    /// Fails with [`Error::NotFound`] if `url` is absent.
    fn remove_node(&self, url: &str) -> Result<()>;

    fn find_node(&self, url: &str) -> Result<Option<Node>>;

    fn nodes(&self) -> Result<Vec<Node>>;
}

/// Delivery result for one peer during a gossip round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerOutcome {
    pub peer: String,
    pub delivered: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GossipReport {
    /// Peers that acknowledged our announcement.
    pub announced: Vec<String>,
    /// Peers dropped because they did not.
    pub evicted: Vec<String>,
    /// Delete notices sent about the evicted peers.
    pub deletions: Vec<PeerOutcome>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Self was already registered, so nothing was done.
    pub already_initialised: bool,
    pub imported: Vec<String>,
    pub gossip: Option<GossipReport>,
    pub resolution: Option<Resolution>,
    /// Why the neighbour's node list could not be fetched.
    pub neighbour_error: Option<TransportError>,
}

pub struct NodeRegistry<N: NodeStore, T: Transport> {
    store: Arc<N>,
    transport: Arc<T>,
    identity: NodeIdentity,
}

impl<N: NodeStore, T: Transport> Clone for NodeRegistry<N, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            identity: self.identity.clone(),
        }
    }
}

impl<N: NodeStore, T: Transport> NodeRegistry<N, T> {
    pub fn new(store: Arc<N>, transport: Arc<T>, identity: NodeIdentity) -> Self {
        Self {
            store,
            transport,
            identity,
        }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn register(&self, url: &str, uuid: &str) -> Result<Node> {
        if url.is_empty() {
            return Err(Error::Validation("please specify the url".into()));
        }
        if uuid.is_empty() {
            return Err(Error::Validation("please specify the uuid".into()));
        }
        let node = self.store.insert_node(url, uuid)?;
        info!(url, uuid, "node registered");
        Ok(node)
    }

    pub fn deregister(&self, url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(Error::Validation("please specify the url".into()));
        }
        self.store.remove_node(url)?;
        info!(url, "node deregistered");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Node>> {
        self.store
            .nodes()
            .map_err(|e| Error::Registry(format!("node list unavailable: {e}")))
    }

    /// Every registered node except this one, in registration order.
    pub fn peers(&self) -> Result<Vec<Node>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|n| n.url != self.identity.url)
            .collect())
    }

    /// Joins the network through `neighbour`.
    ///
    /// Registers this node, copies the neighbour's node list, announces
    /// itself to everyone and finally adopts the longest valid chain around.
    /// A node whose own entry already exists has joined before and is left
    /// alone. An unreachable neighbour leaves the node running on its own.
    pub async fn bootstrap<L: LedgerStore>(
        &self,
        neighbour: Option<&str>,
        resolver: &ConsensusResolver<L, N, T>,
    ) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();
        if self.store.find_node(&self.identity.url)?.is_some() {
            info!(url = %self.identity.url, "node already initialised");
            report.already_initialised = true;
            return Ok(report);
        }
        self.register(&self.identity.url, &self.identity.uuid)?;

        let Some(neighbour) = neighbour else {
            return Ok(report);
        };
        let nodes = match self.fetch_nodes(neighbour).await {
            Ok(nodes) => nodes,
            Err(Error::Transport(err)) => {
                warn!(neighbour, error = %err, "could not fetch nodes from neighbour");
                report.neighbour_error = Some(err);
                return Ok(report);
            }
            Err(err) => return Err(err),
        };
        if nodes.is_empty() {
            warn!(neighbour, "neighbour returned no nodes");
            return Ok(report);
        }

        for node in nodes {
            match self.register(&node.url, &node.uuid) {
                Ok(_) => report.imported.push(node.url),
                Err(err) => debug!(url = %node.url, error = %err, "skipped node"),
            }
        }

        report.gossip = Some(self.gossip_register().await?);
        report.resolution = Some(resolver.resolve_conflicts().await?);
        Ok(report)
    }

    /// The node list `peer` holds.
    pub async fn fetch_nodes(&self, peer: &str) -> Result<Vec<PeerNode>> {
        Ok(self.transport.get_nodes(peer).await?)
    }

    /// Announces this node to every peer. Peers that do not acknowledge are
    /// removed here and their removal is announced to the others.
    pub async fn gossip_register(&self) -> Result<GossipReport> {
        let mut report = GossipReport::default();
        for peer in self.peers()? {
            let sent = self
                .transport
                .add_node(&peer.url, &self.identity.url, &self.identity.uuid)
                .await;
            match sent {
                Ok(()) => {
                    debug!(peer = %peer.url, "announced self");
                    report.announced.push(peer.url);
                }
                Err(err) => {
                    warn!(peer = %peer.url, error = %err, "peer unreachable, removing it");
                    match self.deregister(&peer.url) {
                        Ok(()) | Err(Error::NotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                    let deletions = self.gossip_delete(&peer.url).await?;
                    report.deletions.extend(deletions);
                    report.evicted.push(peer.url);
                }
            }
        }
        Ok(report)
    }

    /// Tells every remaining peer except `removed` to forget `removed`.
    /// Best effort: failures are logged and reported, nothing more.
    pub async fn gossip_delete(&self, removed: &str) -> Result<Vec<PeerOutcome>> {
        let mut outcomes = Vec::new();
        for peer in self.peers()? {
            if peer.url == removed {
                continue;
            }
            let delivered = match self.transport.delete_node(&peer.url, removed).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(peer = %peer.url, removed, error = %err, "delete notice not delivered");
                    false
                }
            };
            outcomes.push(PeerOutcome {
                peer: peer.url,
                delivered,
            });
        }
        Ok(outcomes)
    }
}
