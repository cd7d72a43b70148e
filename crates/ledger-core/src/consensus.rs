use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chain::{Ledger, LedgerStore};
use crate::constants::{NO_CONFLICTS, SUCCESS};
use crate::registry::{NodeRegistry, NodeStore};
use crate::transport::Transport;
use crate::validation::is_valid_chain;
use crate::{Block, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub replaced: bool,
    /// Length of the chain held after resolving.
    pub length: u64,
    /// Peer the adopted chain came from.
    pub source: Option<String>,
}

impl Resolution {
    pub fn status(&self) -> &'static str {
        if self.replaced {
            SUCCESS
        } else {
            NO_CONFLICTS
        }
    }
}

/// A peer chain that beat the local one when it was fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub source: String,
    pub chain: Vec<Block>,
}

/// Longest-valid-chain rule against the registered peers.
pub struct ConsensusResolver<L: LedgerStore, N: NodeStore, T: Transport> {
    ledger: Ledger<L>,
    registry: NodeRegistry<N, T>,
}

impl<L: LedgerStore, N: NodeStore, T: Transport> ConsensusResolver<L, N, T> {
    pub fn new(ledger: Ledger<L>, registry: NodeRegistry<N, T>) -> Self {
        Self { ledger, registry }
    }

    /// Asks every peer for its chain and adopts the longest valid one if it
    /// is strictly longer than ours.
    pub async fn resolve_conflicts(&self) -> Result<Resolution> {
        let candidate = self.longest_valid_chain().await?;
        self.adopt(candidate)
    }

    /// Visits peers one after the other, in registration order. The bar
    /// rises as soon as a candidate is accepted, so a later peer must beat
    /// the current winner, not just the local chain. Unreachable peers are
    /// skipped.
    pub async fn longest_valid_chain(&self) -> Result<Option<Candidate>> {
        let peers = self.registry.peers()?;
        let mut max_length = self.ledger.len()?;
        let mut winner = None;

        for peer in peers {
            let chain = match self.registry.transport().get_blockchain(&peer.url).await {
                Ok(chain) => chain,
                Err(err) => {
                    warn!(peer = %peer.url, error = %err, "skipping peer");
                    continue;
                }
            };
            let length = chain.len() as u64;
            if length > max_length && is_valid_chain(&chain) {
                debug!(peer = %peer.url, length, "longer valid chain found");
                max_length = length;
                winner = Some(Candidate {
                    source: peer.url,
                    chain,
                });
            } else {
                debug!(peer = %peer.url, length, "peer chain not adopted");
            }
        }
        Ok(winner)
    }

    /// Installs `candidate` under the ledger write lock. The local chain may
    /// have grown since the candidate was picked, so the length comparison
    /// is repeated there and a candidate that no longer wins is dropped.
    ///
    /// Blocks while a mine holds the lock.
    pub fn adopt(&self, candidate: Option<Candidate>) -> Result<Resolution> {
        if let Some(Candidate { source, chain }) = candidate {
            if self.ledger.replace_chain_if_longer(&chain)? {
                info!(peer = %source, length = chain.len(), "adopted peer chain");
                return Ok(Resolution {
                    replaced: true,
                    length: chain.len() as u64,
                    source: Some(source),
                });
            }
        }
        Ok(Resolution {
            replaced: false,
            length: self.ledger.len()?,
            source: None,
        })
    }
}
