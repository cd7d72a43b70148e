use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use ledger_core::chain::{check_importable, next_ids_after, LedgerStore};
use ledger_core::registry::{Node, NodeStore};
use ledger_core::{now_secs, Block, Error, NewTransaction, Result, Transaction};
use serde::{Deserialize, Serialize};
use sled::transaction::{
  abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
  TransactionResult, TransactionalTree,
};
use sled::{Db, IVec, Transactional, Tree};
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const TREE_TRANSACTIONS: &str = "transactions";
const TREE_NODES: &str = "nodes";
const TREE_NODE_URLS: &str = "node_urls";
const TREE_META: &str = "meta";

const KEY_NEXT_BLOCK_ID: &[u8] = b"next_block_id";
const KEY_NEXT_TX_ID: &[u8] = b"next_tx_id";
const KEY_NEXT_NODE_SEQ: &[u8] = b"next_node_seq";

/// Block header as stored; transactions live in their own tree.
#[derive(Serialize, Deserialize)]
struct BlockRecord {
  id: u64,
  previous_hash: String,
  proof: u64,
  timestamp: u64,
}

impl BlockRecord {
  fn of(block: &Block) -> Self {
    Self {
      id: block.id,
      previous_hash: block.previous_hash.clone(),
      proof: block.proof,
      timestamp: block.timestamp,
    }
  }

  fn with_transactions(self, transactions: Vec<Transaction>) -> Block {
    Block {
      id: self.id,
      previous_hash: self.previous_hash,
      proof: self.proof,
      transactions,
      timestamp: self.timestamp,
    }
  }
}

fn id_key(id: u64) -> Vec<u8> {
  id.to_be_bytes().to_vec()
}

/// Transactions are keyed by block id then transaction id, so a prefix scan
/// yields one block's transactions in insertion order.
fn tx_key(block_id: u64, tx_id: u64) -> Vec<u8> {
  let mut key = Vec::with_capacity(16);
  key.extend_from_slice(&block_id.to_be_bytes());
  key.extend_from_slice(&tx_id.to_be_bytes());
  key
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
  <[u8; 8]>::try_from(bytes)
    .map(u64::from_be_bytes)
    .map_err(|_| Error::Persistence(format!("corrupt id of {} bytes", bytes.len())))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
  bincode::serialize(value).map_err(Error::persistence)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
  bincode::deserialize(bytes).map_err(Error::persistence)
}

fn aborting<T>(result: Result<T>) -> ConflictableTransactionResult<T, Error> {
  result.map_err(ConflictableTransactionError::Abort)
}

fn settle<T>(result: TransactionResult<T, Error>) -> Result<T> {
  result.map_err(|e| match e {
    TransactionError::Abort(e) => e,
    TransactionError::Storage(e) => Error::persistence(e),
  })
}

/// Hands out the next value of the counter at `key`, starting at 1.
fn take_id(meta: &TransactionalTree, key: &[u8]) -> ConflictableTransactionResult<u64, Error> {
  let next = match meta.get(key)? {
    Some(bytes) => aborting(decode_id(&bytes))?,
    None => 1,
  };
  meta.insert(key, id_key(next + 1))?;
  Ok(next)
}

fn put_block(blocks: &TransactionalTree, block: &Block) -> ConflictableTransactionResult<(), Error> {
  let bytes = aborting(encode(&BlockRecord::of(block)))?;
  blocks.insert(id_key(block.id), bytes)?;
  Ok(())
}

fn put_transaction(txs: &TransactionalTree, tx: &Transaction) -> ConflictableTransactionResult<(), Error> {
  let bytes = aborting(encode(tx))?;
  txs.insert(tx_key(tx.block_id, tx.id), bytes)?;
  Ok(())
}

/// sled-backed store for the ledger and the node registry.
///
/// Each mutation runs as one sled transaction over the trees it touches and
/// is flushed before returning.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
  transactions: Tree,
  nodes: Tree,
  node_urls: Tree,
  meta: Tree,
  writer: Arc<Mutex<()>>,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path).map_err(Error::persistence)?;
    info!("sled store opened");
    Self::with_db(db)
  }

  /// A store that lives in a temporary directory and is removed on drop.
  pub fn temporary() -> Result<Self> {
    let db = sled::Config::new()
      .temporary(true)
      .open()
      .map_err(Error::persistence)?;
    Self::with_db(db)
  }

  fn with_db(db: Db) -> Result<Self> {
    let tree = |name: &str| db.open_tree(name).map_err(Error::persistence);
    Ok(Self {
      blocks: tree(TREE_BLOCKS)?,
      transactions: tree(TREE_TRANSACTIONS)?,
      nodes: tree(TREE_NODES)?,
      node_urls: tree(TREE_NODE_URLS)?,
      meta: tree(TREE_META)?,
      writer: Arc::new(Mutex::new(())),
      db,
    })
  }

  pub fn flush(&self) -> Result<()> {
    self.db.flush().map_err(Error::persistence)?;
    Ok(())
  }

  /// Drops every record and counter. Used by tests.
  pub fn clear(&self) -> Result<()> {
    let _guard = self.write()?;
    for tree in [&self.blocks, &self.transactions, &self.nodes, &self.node_urls, &self.meta] {
      tree.clear().map_err(Error::persistence)?;
    }
    self.flush()
  }

  fn write(&self) -> Result<MutexGuard<'_, ()>> {
    self
      .writer
      .lock()
      .map_err(|_| Error::Persistence("sled store lock poisoned".into()))
  }

  fn transactions_of(&self, block_id: u64) -> Result<Vec<Transaction>> {
    self
      .transactions
      .scan_prefix(id_key(block_id))
      .values()
      .map(|v| decode(&v.map_err(Error::persistence)?))
      .collect()
  }

  fn load_block(&self, record: &IVec) -> Result<Block> {
    let record: BlockRecord = decode(record)?;
    let transactions = self.transactions_of(record.id)?;
    Ok(record.with_transactions(transactions))
  }

  fn keys(tree: &Tree) -> Result<Vec<IVec>> {
    tree
      .iter()
      .keys()
      .collect::<sled::Result<Vec<_>>>()
      .map_err(Error::persistence)
  }
}

impl LedgerStore for SledStore {
  fn append_block(&self, previous_hash: &str, proof: u64) -> Result<Block> {
    let _guard = self.write()?;
    let block = settle((&self.blocks, &self.meta).transaction(|(blocks, meta)| {
      let id = take_id(meta, KEY_NEXT_BLOCK_ID)?;
      let block = Block::new(id, previous_hash, proof);
      put_block(blocks, &block)?;
      Ok(block)
    }))?;
    self.flush()?;
    debug!(id = block.id, "block appended");
    Ok(block)
  }

  fn append_transaction(&self, block_id: u64, tx: &NewTransaction) -> Result<Transaction> {
    tx.validate()?;
    let _guard = self.write()?;
    let committed = settle(
      (&self.blocks, &self.transactions, &self.meta).transaction(|(blocks, txs, meta)| {
        if blocks.get(id_key(block_id))?.is_none() {
          return abort(Error::NotFound(format!("block {block_id}")));
        }
        let id = take_id(meta, KEY_NEXT_TX_ID)?;
        let committed = aborting(tx.into_transaction(id, block_id))?;
        put_transaction(txs, &committed)?;
        Ok(committed)
      }),
    )?;
    self.flush()?;
    Ok(committed)
  }

  fn append_mined_block(
    &self,
    previous_hash: &str,
    proof: u64,
    reward: &NewTransaction,
  ) -> Result<Block> {
    let _guard = self.write()?;
    let block = settle(
      (&self.blocks, &self.transactions, &self.meta).transaction(|(blocks, txs, meta)| {
        let block_id = take_id(meta, KEY_NEXT_BLOCK_ID)?;
        let mut block = Block::new(block_id, previous_hash, proof);
        put_block(blocks, &block)?;

        // A rejected reward aborts the whole unit, block included.
        let tx_id = take_id(meta, KEY_NEXT_TX_ID)?;
        let tx = aborting(reward.into_transaction(tx_id, block_id))?;
        put_transaction(txs, &tx)?;
        block.transactions.push(tx);
        Ok(block)
      }),
    )?;
    self.flush()?;
    Ok(block)
  }

  fn latest_block(&self) -> Result<Block> {
    let _guard = self.write()?;
    match self.blocks.last().map_err(Error::persistence)? {
      Some((_, record)) => self.load_block(&record),
      None => Err(Error::NotFound("the ledger holds no block".into())),
    }
  }

  fn full_chain(&self) -> Result<Vec<Block>> {
    let _guard = self.write()?;
    self
      .blocks
      .iter()
      .values()
      .map(|record| self.load_block(&record.map_err(Error::persistence)?))
      .collect()
  }

  fn block_count(&self) -> Result<u64> {
    Ok(self.blocks.len() as u64)
  }

  fn replace_chain(&self, chain: &[Block]) -> Result<()> {
    check_importable(chain)?;
    let (next_block_id, next_tx_id) = next_ids_after(chain);

    let mut block_records = Vec::with_capacity(chain.len());
    let mut tx_records = Vec::new();
    for block in chain {
      block_records.push((id_key(block.id), encode(&BlockRecord::of(block))?));
      for tx in &block.transactions {
        tx_records.push((tx_key(tx.block_id, tx.id), encode(tx)?));
      }
    }

    let _guard = self.write()?;
    let stale_blocks = Self::keys(&self.blocks)?;
    let stale_txs = Self::keys(&self.transactions)?;

    settle(
      (&self.blocks, &self.transactions, &self.meta).transaction(|(blocks, txs, meta)| {
        for key in &stale_blocks {
          blocks.remove(key.clone())?;
        }
        for key in &stale_txs {
          txs.remove(key.clone())?;
        }
        for (key, value) in &block_records {
          blocks.insert(key.as_slice(), value.as_slice())?;
        }
        for (key, value) in &tx_records {
          txs.insert(key.as_slice(), value.as_slice())?;
        }
        meta.insert(KEY_NEXT_BLOCK_ID, id_key(next_block_id))?;
        meta.insert(KEY_NEXT_TX_ID, id_key(next_tx_id))?;
        Ok(())
      }),
    )?;
    self.flush()?;
    info!(
      blocks = chain.len(),
      next_block_id, next_tx_id, "chain imported"
    );
    Ok(())
  }
}

impl NodeStore for SledStore {
  fn insert_node(&self, url: &str, uuid: &str) -> Result<Node> {
    let _guard = self.write()?;
    let node = settle(
      (&self.nodes, &self.node_urls, &self.meta).transaction(|(nodes, urls, meta)| {
        if urls.get(url.as_bytes())?.is_some() {
          return abort(Error::Conflict(format!("node {url} already exists")));
        }
        let seq = take_id(meta, KEY_NEXT_NODE_SEQ)?;
        let node = Node {
          url: url.to_string(),
          uuid: uuid.to_string(),
          timestamp: now_secs(),
        };
        nodes.insert(id_key(seq), aborting(encode(&node))?)?;
        urls.insert(url.as_bytes(), id_key(seq))?;
        Ok(node)
      }),
    )?;
    self.flush()?;
    Ok(node)
  }

  fn remove_node(&self, url: &str) -> Result<()> {
    let _guard = self.write()?;
    settle((&self.nodes, &self.node_urls).transaction(|(nodes, urls)| {
      let Some(seq) = urls.remove(url.as_bytes())? else {
        return abort(Error::NotFound(format!("node {url}")));
      };
      nodes.remove(seq)?;
      Ok(())
    }))?;
    self.flush()
  }

  fn find_node(&self, url: &str) -> Result<Option<Node>> {
    let Some(seq) = self.node_urls.get(url.as_bytes()).map_err(Error::persistence)? else {
      return Ok(None);
    };
    self
      .nodes
      .get(seq)
      .map_err(Error::persistence)?
      .map(|bytes| decode(&bytes))
      .transpose()
  }

  fn nodes(&self) -> Result<Vec<Node>> {
    self
      .nodes
      .iter()
      .values()
      .map(|v| decode(&v.map_err(Error::persistence)?))
      .collect()
  }
}
