use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use crate::{Block, Error, NewTransaction, Result, Transaction};

/// Trait the storage backends implement for the ledger to operate.
/// This lives in `ledger-core` so the core never depends on a backend.
///
/// Every mutating method is all-or-nothing: on error nothing it touched is
/// left behind.
pub trait LedgerStore: Send + Sync {
    /// Persists a new block with the next block id.
    fn append_block(&self, previous_hash: &str, proof: u64) -> Result<Block>;

    /// Validates `tx` and attaches it to `block_id` with the next transaction id.
    fn append_transaction(&self, block_id: u64, tx: &NewTransaction) -> Result<Transaction>;

    /// Appends a block and attaches `reward` to it as one unit.
    fn append_mined_block(
        &self,
        previous_hash: &str,
        proof: u64,
        reward: &NewTransaction,
    ) -> Result<Block>;

    fn latest_block(&self) -> Result<Block>;

    /// All blocks with their transactions, oldest first.
    fn full_chain(&self) -> Result<Vec<Block>>;

    fn block_count(&self) -> Result<u64>;

    /// Swaps the stored chain for `chain`, keeping its ids and timestamps and
    /// moving both id generators past the largest imported id.
    fn replace_chain(&self, chain: &[Block]) -> Result<()>;
}

/// Rejects candidates that cannot be imported verbatim.
pub fn check_importable(chain: &[Block]) -> Result<()> {
    if chain.is_empty() {
        return Err(Error::Validation("cannot import an empty chain".into()));
    }
    if chain.windows(2).any(|pair| pair[0].id >= pair[1].id) {
        return Err(Error::Validation(
            "imported block ids must be strictly increasing".into(),
        ));
    }
    let mut seen = HashSet::new();
    for tx in chain.iter().flat_map(|b| b.transactions.iter()) {
        if !seen.insert(tx.id) {
            return Err(Error::Validation(format!(
                "duplicate transaction id {} in imported chain",
                tx.id
            )));
        }
    }
    Ok(())
}

/// Next block id and next transaction id after importing `chain`.
///
/// Computed from the imported records themselves; a collection with no
/// records restarts its generator at 1.
pub fn next_ids_after(chain: &[Block]) -> (u64, u64) {
    let max_block = chain.iter().map(|b| b.id).max().unwrap_or(0);
    let max_tx = chain
        .iter()
        .flat_map(|b| b.transactions.iter().map(|t| t.id))
        .max()
        .unwrap_or(0);
    (max_block + 1, max_tx + 1)
}

/// Ledger façade over a [`LedgerStore`].
///
/// Writes that depend on the current tip (adding a transaction, mining,
/// importing a chain) are serialized through one write lock.
pub struct Ledger<S: LedgerStore> {
    store: Arc<S>,
    writer: Arc<Mutex<()>>,
}

impl<S: LedgerStore> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| Error::Persistence("ledger write lock poisoned".into()))
    }

    /// Ensure a genesis block exists. Idempotent.
    pub fn ensure_genesis(&self) -> Result<()> {
        let _guard = self.lock_writes()?;
        if self.store.block_count()? == 0 {
            let genesis = self
                .store
                .append_block(GENESIS_PREVIOUS_HASH, GENESIS_PROOF)?;
            info!(id = genesis.id, "created genesis block");
        }
        Ok(())
    }

    pub fn append_block(&self, previous_hash: &str, proof: u64) -> Result<Block> {
        self.store.append_block(previous_hash, proof)
    }

    pub fn append_transaction(&self, block_id: u64, tx: &NewTransaction) -> Result<Transaction> {
        self.store.append_transaction(block_id, tx)
    }

    /// Attaches `tx` to whatever block is currently the latest.
    pub fn add_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        tx.validate()?;
        let _guard = self.lock_writes()?;
        let latest = self.store.latest_block()?;
        let committed = self.store.append_transaction(latest.id, tx)?;
        info!(
            id = committed.id,
            block_id = committed.block_id,
            "transaction added"
        );
        Ok(committed)
    }

    pub fn latest_block(&self) -> Result<Block> {
        self.store.latest_block()
    }

    pub fn full_chain(&self) -> Result<Vec<Block>> {
        self.store.full_chain()
    }

    pub fn len(&self) -> Result<u64> {
        self.store.block_count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn replace_chain(&self, chain: &[Block]) -> Result<()> {
        let _guard = self.lock_writes()?;
        self.store.replace_chain(chain)?;
        info!(length = chain.len(), "local chain replaced");
        Ok(())
    }

    /// Replaces the local chain only if `chain` is still strictly longer
    /// once the write lock is held. Returns whether it was replaced.
    pub fn replace_chain_if_longer(&self, chain: &[Block]) -> Result<bool> {
        let _guard = self.lock_writes()?;
        let local = self.store.block_count()?;
        if local >= chain.len() as u64 {
            info!(local, candidate = chain.len(), "candidate no longer longer than local chain");
            return Ok(false);
        }
        self.store.replace_chain(chain)?;
        info!(length = chain.len(), "local chain replaced");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GENESIS_BLOCK_ID;
    use crate::memory::MemStore;
    use crate::Transaction;

    fn ledger() -> Ledger<MemStore> {
        let ledger = Ledger::new(Arc::new(MemStore::new()));
        ledger.ensure_genesis().unwrap();
        ledger
    }

    fn block(id: u64, txs: &[u64]) -> Block {
        Block {
            id,
            previous_hash: format!("hash-{id}"),
            proof: id * 10,
            transactions: txs
                .iter()
                .map(|tx_id| Transaction {
                    id: *tx_id,
                    block_id: id,
                    sender: "a".into(),
                    receiver: "b".into(),
                    amount: 5,
                    timestamp: 1_600_000_000 + tx_id,
                })
                .collect(),
            timestamp: 1_600_000_000 + id,
        }
    }

    #[test]
    fn genesis_is_created_once() {
        let ledger = ledger();
        ledger.ensure_genesis().unwrap();
        let chain = ledger.full_chain().unwrap();
        assert_eq!(chain.len(), 1);
        let genesis = &chain[0];
        assert_eq!(genesis.id, GENESIS_BLOCK_ID);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn latest_block_on_empty_ledger_is_not_found() {
        let ledger = Ledger::new(Arc::new(MemStore::new()));
        assert!(matches!(ledger.latest_block(), Err(Error::NotFound(_))));
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn transactions_attach_to_latest_block() {
        let ledger = ledger();
        let tx = ledger
            .add_transaction(&NewTransaction::new("alice", "bob", 3))
            .unwrap();
        assert_eq!(tx.block_id, 1);

        ledger.append_block("prev", 7).unwrap();
        let tx = ledger
            .add_transaction(&NewTransaction::new("bob", "carol", 2))
            .unwrap();
        assert_eq!(tx.block_id, 2);

        let chain = ledger.full_chain().unwrap();
        assert_eq!(chain[0].transactions.len(), 1);
        assert_eq!(chain[1].transactions.len(), 1);
        assert_eq!(chain[1].transactions[0].receiver, "carol");
    }

    #[test]
    fn invalid_transaction_is_not_stored() {
        let ledger = ledger();
        let missing = NewTransaction {
            sender: Some("alice".into()),
            receiver: None,
            amount: Some(1),
        };
        assert!(matches!(
            ledger.add_transaction(&missing),
            Err(Error::Validation(_))
        ));
        assert!(ledger.latest_block().unwrap().transactions.is_empty());
    }

    #[test]
    fn transaction_on_unknown_block_is_not_found() {
        let ledger = ledger();
        let err = ledger
            .append_transaction(42, &NewTransaction::new("a", "b", 1))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn replace_chain_keeps_ids_and_resets_generators() {
        let ledger = ledger();
        let candidate = vec![block(1, &[]), block(2, &[4, 5]), block(3, &[9])];
        ledger.replace_chain(&candidate).unwrap();
        assert_eq!(ledger.full_chain().unwrap(), candidate);

        let next = ledger.append_block("x", 1).unwrap();
        assert_eq!(next.id, 4);
        let tx = ledger
            .add_transaction(&NewTransaction::new("a", "b", 1))
            .unwrap();
        assert_eq!(tx.id, 10);
        assert_eq!(tx.block_id, 4);
    }

    #[test]
    fn replace_chain_without_transactions_restarts_tx_ids() {
        let ledger = ledger();
        ledger
            .add_transaction(&NewTransaction::new("a", "b", 1))
            .unwrap();
        ledger.replace_chain(&[block(1, &[]), block(2, &[])]).unwrap();
        let tx = ledger
            .add_transaction(&NewTransaction::new("a", "b", 1))
            .unwrap();
        assert_eq!(tx.id, 1);
    }

    #[test]
    fn rejected_import_leaves_chain_untouched() {
        let ledger = ledger();
        let before = ledger.full_chain().unwrap();
        assert!(matches!(ledger.replace_chain(&[]), Err(Error::Validation(_))));
        assert!(matches!(
            ledger.replace_chain(&[block(2, &[]), block(2, &[])]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ledger.replace_chain(&[block(1, &[3]), block(2, &[3])]),
            Err(Error::Validation(_))
        ));
        assert_eq!(ledger.full_chain().unwrap(), before);
    }

    #[test]
    fn replace_if_longer_rechecks_local_length() {
        let ledger = ledger();
        ledger.append_block("a", 1).unwrap();
        ledger.append_block("b", 2).unwrap();
        let local = ledger.full_chain().unwrap();

        let shorter = vec![block(1, &[]), block(2, &[1])];
        assert!(!ledger.replace_chain_if_longer(&shorter).unwrap());
        let equal = vec![block(1, &[]), block(2, &[]), block(3, &[])];
        assert!(!ledger.replace_chain_if_longer(&equal).unwrap());
        assert_eq!(ledger.full_chain().unwrap(), local);

        let longer = vec![block(1, &[]), block(2, &[]), block(3, &[]), block(4, &[7])];
        assert!(ledger.replace_chain_if_longer(&longer).unwrap());
        assert_eq!(ledger.full_chain().unwrap(), longer);
    }

    #[test]
    fn next_ids_after_uses_imported_maximum() {
        assert_eq!(next_ids_after(&[]), (1, 1));
        assert_eq!(next_ids_after(&[block(1, &[]), block(5, &[2, 8])]), (6, 9));
    }
}
