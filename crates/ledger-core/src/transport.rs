//! Peer transport.
//!
//! Every node exposes the same surface, so the calls one node makes on
//! another are a fixed set: fetch its node list, fetch its chain, and ask it
//! to add or delete a registry entry. Implementations decide how those calls
//! travel; callers decide whether a failure is fatal or absorbed.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Block;

/// The `{url, uuid}` view of a registry entry exchanged between peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerNode {
    pub url: String,
    pub uuid: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer could not be reached, or the request timed out.
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    /// The peer answered with a non-success HTTP status.
    #[error("peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },

    /// The peer answered with a body we could not decode.
    #[error("malformed response from {peer}: {reason}")]
    Malformed { peer: String, reason: String },

    /// The peer answered but did not report success.
    #[error("peer {peer} rejected the request: {reason}")]
    Rejected { peer: String, reason: String },
}

/// Calls a node makes on its peers. No implementation retries.
pub trait Transport: Send + Sync {
    fn get_nodes(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<Vec<PeerNode>, TransportError>> + Send;

    fn get_blockchain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<Vec<Block>, TransportError>> + Send;

    /// Resolves to `Ok` only if the peer reported success.
    fn add_node(
        &self,
        peer: &str,
        url: &str,
        uuid: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Resolves to `Ok` only if the peer reported success.
    fn delete_node(
        &self,
        peer: &str,
        url: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
