use std::fs;
use std::sync::Arc;

use ledger_core::chain::Ledger;
use ledger_core::config::NodeIdentity;
use ledger_core::mine::Miner;
use ledger_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

/// A ledger with its genesis block and a miner paying `uuid`.
pub fn ledger_with_miner(store: SledStore, uuid: &str) -> (Ledger<SledStore>, Miner<SledStore>) {
    let ledger = Ledger::new(Arc::new(store));
    ledger.ensure_genesis().expect("Failed to create genesis");
    let miner = Miner::new(ledger.clone(), NodeIdentity::new("http://127.0.0.1:8080", uuid));
    (ledger, miner)
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    // Verify the directory is removed
    assert!(!db_path.exists(), "Database directory should be removed");
}
