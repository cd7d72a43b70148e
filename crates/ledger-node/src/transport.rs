//! HTTP implementation of the peer transport.
//!
//! Talks to the same routes this crate serves (see [`crate::api::routes`]).
//! Every request carries the configured timeout and is attempted once.

use std::time::Duration;

use ledger_core::constants::SUCCESS;
use ledger_core::transport::{PeerNode, Transport, TransportError};
use ledger_core::Block;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::api::routes;

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn endpoint(peer: &str, path: &str) -> String {
    // Avoid accidental double slashes.
    format!(
        "{}/{}",
        peer.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn unreachable(peer: &str, err: reqwest::Error) -> TransportError {
    TransportError::Unreachable {
        peer: peer.to_string(),
        reason: err.to_string(),
    }
}

async fn decode<T: DeserializeOwned>(peer: &str, response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            peer: peer.to_string(),
            status: status.as_u16(),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| TransportError::Malformed {
            peer: peer.to_string(),
            reason: e.to_string(),
        })
}

/// A peer acknowledges a membership change by answering with an object that
/// holds the value `"Success"`; anything else counts as a refusal.
async fn acknowledged(peer: &str, response: Response) -> Result<(), TransportError> {
    let status = response.status();
    let body: Value = response.json().await.map_err(|e| TransportError::Malformed {
        peer: peer.to_string(),
        reason: e.to_string(),
    })?;
    let success = body
        .as_object()
        .is_some_and(|map| map.values().any(|v| v == SUCCESS));
    if success {
        return Ok(());
    }
    let reason = body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("status {status}"));
    Err(TransportError::Rejected {
        peer: peer.to_string(),
        reason,
    })
}

impl Transport for HttpTransport {
    async fn get_nodes(&self, peer: &str) -> Result<Vec<PeerNode>, TransportError> {
        let response = self
            .client
            .get(endpoint(peer, routes::NODES))
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        decode(peer, response).await
    }

    async fn get_blockchain(&self, peer: &str) -> Result<Vec<Block>, TransportError> {
        let response = self
            .client
            .get(endpoint(peer, routes::CHAIN))
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        decode(peer, response).await
    }

    async fn add_node(&self, peer: &str, url: &str, uuid: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(endpoint(peer, routes::ADD_NODE))
            .json(&json!({ "url": url, "uuid": uuid }))
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        acknowledged(peer, response).await
    }

    async fn delete_node(&self, peer: &str, url: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(endpoint(peer, routes::DELETE_NODE))
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        acknowledged(peer, response).await
    }
}
