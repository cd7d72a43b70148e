//! In-memory store.
//!
//! Implements both [`LedgerStore`] and [`NodeStore`] behind one mutex. Used by
//! tests and by anything that wants a throwaway node without a data
//! directory.

use std::sync::{Mutex, MutexGuard};

use crate::chain::{check_importable, next_ids_after, LedgerStore};
use crate::registry::{Node, NodeStore};
use crate::{now_secs, Block, Error, NewTransaction, Result, Transaction};

struct MemState {
    blocks: Vec<Block>,
    nodes: Vec<Node>,
    next_block_id: u64,
    next_tx_id: u64,
}

impl Default for MemState {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            nodes: Vec::new(),
            next_block_id: 1,
            next_tx_id: 1,
        }
    }
}

#[derive(Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemState>> {
        self.state
            .lock()
            .map_err(|_| Error::Persistence("memory store lock poisoned".into()))
    }
}

impl LedgerStore for MemStore {
    fn append_block(&self, previous_hash: &str, proof: u64) -> Result<Block> {
        let mut state = self.state()?;
        let block = Block::new(state.next_block_id, previous_hash, proof);
        state.next_block_id += 1;
        state.blocks.push(block.clone());
        Ok(block)
    }

    fn append_transaction(&self, block_id: u64, tx: &NewTransaction) -> Result<Transaction> {
        let mut state = self.state()?;
        let committed = tx.into_transaction(state.next_tx_id, block_id)?;
        let block = state
            .blocks
            .iter_mut()
            .find(|b| b.id == block_id)
            .ok_or_else(|| Error::NotFound(format!("block {block_id}")))?;
        block.transactions.push(committed.clone());
        state.next_tx_id += 1;
        Ok(committed)
    }

    fn append_mined_block(
        &self,
        previous_hash: &str,
        proof: u64,
        reward: &NewTransaction,
    ) -> Result<Block> {
        let mut state = self.state()?;
        let mut block = Block::new(state.next_block_id, previous_hash, proof);
        let tx = reward.into_transaction(state.next_tx_id, block.id)?;
        block.transactions.push(tx);
        state.next_block_id += 1;
        state.next_tx_id += 1;
        state.blocks.push(block.clone());
        Ok(block)
    }

    fn latest_block(&self) -> Result<Block> {
        self.state()?
            .blocks
            .last()
            .cloned()
            .ok_or_else(|| Error::NotFound("the ledger holds no block".into()))
    }

    fn full_chain(&self) -> Result<Vec<Block>> {
        Ok(self.state()?.blocks.clone())
    }

    fn block_count(&self) -> Result<u64> {
        Ok(self.state()?.blocks.len() as u64)
    }

    fn replace_chain(&self, chain: &[Block]) -> Result<()> {
        check_importable(chain)?;
        let (next_block_id, next_tx_id) = next_ids_after(chain);
        let mut state = self.state()?;
        state.blocks = chain.to_vec();
        state.next_block_id = next_block_id;
        state.next_tx_id = next_tx_id;
        Ok(())
    }
}

impl NodeStore for MemStore {
    fn insert_node(&self, url: &str, uuid: &str) -> Result<Node> {
        let mut state = self.state()?;
        if state.nodes.iter().any(|n| n.url == url) {
            return Err(Error::Conflict(format!("node {url} already exists")));
        }
        let node = Node {
            url: url.to_string(),
            uuid: uuid.to_string(),
            timestamp: now_secs(),
        };
        state.nodes.push(node.clone());
        Ok(node)
    }

    fn remove_node(&self, url: &str) -> Result<()> {
        let mut state = self.state()?;
        let pos = state
            .nodes
            .iter()
            .position(|n| n.url == url)
            .ok_or_else(|| Error::NotFound(format!("node {url}")))?;
        state.nodes.remove(pos);
        Ok(())
    }

    fn find_node(&self, url: &str) -> Result<Option<Node>> {
        Ok(self.state()?.nodes.iter().find(|n| n.url == url).cloned())
    }

    fn nodes(&self) -> Result<Vec<Node>> {
        Ok(self.state()?.nodes.clone())
    }
}
