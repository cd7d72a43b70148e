use tracing::info;

use crate::chain::{Ledger, LedgerStore};
use crate::config::NodeIdentity;
use crate::pow::proof_of_work;
use crate::{Block, NewTransaction, Result};

/// Mines blocks on top of a [`Ledger`], paying the reward to this node.
pub struct Miner<S: LedgerStore> {
    ledger: Ledger<S>,
    identity: NodeIdentity,
}

impl<S: LedgerStore> Miner<S> {
    pub fn new(ledger: Ledger<S>, identity: NodeIdentity) -> Self {
        Self { ledger, identity }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Solves the proof of work against the latest block and commits the new
    /// block together with its reward transaction.
    ///
    /// Blocks the calling thread for the whole search. On error the ledger is
    /// left as it was.
    pub fn mine(&self) -> Result<Block> {
        let _guard = self.ledger.lock_writes()?;
        let store = self.ledger.store();

        let last = store.latest_block()?;
        let previous_hash = last.hash();
        let proof = proof_of_work(last.proof);

        let reward = NewTransaction::reward(self.identity.uuid.as_str());
        let mined = store.append_mined_block(&previous_hash, proof, &reward)?;
        info!(
            id = mined.id,
            proof,
            previous_hash = %previous_hash,
            "mined block"
        );

        store.latest_block()
    }
}
