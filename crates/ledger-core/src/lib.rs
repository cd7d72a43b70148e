use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod config;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod memory;
pub mod mine;
pub mod registry;
pub mod transport;
pub mod validation;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

pub type Hash = [u8; 32];

/// Seconds since the unix epoch. A clock set before 1970 reads as zero.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: u64,
    pub block_id: u64,
    pub sender: String,
    pub receiver: String,
    pub amount: i64,
    pub timestamp: u64,
}

/// A transaction as submitted, before it has been validated and given an id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub amount: Option<i64>,
}

impl NewTransaction {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: i64) -> Self {
        Self {
            sender: Some(sender.into()),
            receiver: Some(receiver.into()),
            amount: Some(amount),
        }
    }

    /// The reward paid to `receiver` for mining a block.
    pub fn reward(receiver: impl Into<String>) -> Self {
        Self::new(
            constants::REWARD_SENDER,
            receiver,
            constants::REWARD_AMOUNT,
        )
    }

    /// Checks the required fields in order and returns them, or the first
    /// one that is missing or empty.
    pub fn validate(&self) -> Result<(&str, &str, i64)> {
        let sender = match self.sender.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => return Err(Error::Validation("please specify the sender".into())),
        };
        let receiver = match self.receiver.as_deref() {
            Some(r) if !r.is_empty() => r,
            _ => return Err(Error::Validation("please specify the receiver".into())),
        };
        let amount = self
            .amount
            .ok_or_else(|| Error::Validation("please specify the amount".into()))?;
        Ok((sender, receiver, amount))
    }

    /// Materialises the transaction once storage has assigned its ids.
    pub fn into_transaction(&self, id: u64, block_id: u64) -> Result<Transaction> {
        let (sender, receiver, amount) = self.validate()?;
        Ok(Transaction {
            id,
            block_id,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp: now_secs(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: u64,
    pub previous_hash: String,
    pub proof: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: u64,
}

impl Block {
    pub fn new(id: u64, previous_hash: impl Into<String>, proof: u64) -> Self {
        Self {
            id,
            previous_hash: previous_hash.into(),
            proof,
            transactions: Vec::new(),
            timestamp: now_secs(),
        }
    }

    pub fn hash(&self) -> String {
        hash_block(self)
    }
}

fn put_str(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u64).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

/// Stable byte layout of a block and its transactions, used only for hashing.
///
/// Integers are little-endian, strings are length-prefixed, and fields appear
/// in declaration order so two nodes holding the same logical block produce
/// the same bytes.
pub fn canonical_encoding(block: &Block) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(64 + block.transactions.len() * 64);
    bytes.extend_from_slice(&block.id.to_le_bytes());
    put_str(&mut bytes, &block.previous_hash);
    bytes.extend_from_slice(&block.proof.to_le_bytes());
    bytes.extend_from_slice(&(block.transactions.len() as u64).to_le_bytes());
    for tx in &block.transactions {
        bytes.extend_from_slice(&tx.id.to_le_bytes());
        bytes.extend_from_slice(&tx.block_id.to_le_bytes());
        put_str(&mut bytes, &tx.sender);
        put_str(&mut bytes, &tx.receiver);
        bytes.extend_from_slice(&tx.amount.to_le_bytes());
        bytes.extend_from_slice(&tx.timestamp.to_le_bytes());
    }
    bytes.extend_from_slice(&block.timestamp.to_le_bytes());
    bytes
}

pub fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Lowercase hex SHA-256 of the block's canonical encoding.
pub fn hash_block(block: &Block) -> String {
    hex::encode(sha256(&canonical_encoding(block)))
}

pub mod pow {
    use super::{sha256, Hash};
    use crate::constants::POW_DIFFICULTY;

    /// True when the hex digest of `"{last_proof}{proof}"` ends in
    /// `POW_DIFFICULTY` zero characters.
    pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
        let hash = sha256(format!("{last_proof}{proof}").as_bytes());
        count_trailing_zero_nibbles(&hash) >= POW_DIFFICULTY
    }

    /// Smallest non-negative proof accepted by [`valid_proof`] for `last_proof`.
    pub fn proof_of_work(last_proof: u64) -> u64 {
        let mut proof = 0u64;
        while !valid_proof(last_proof, proof) {
            proof += 1;
        }
        proof
    }

    /// Number of trailing `'0'` characters in the hex rendering of `hash`.
    pub fn count_trailing_zero_nibbles(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash.iter().rev() {
            if *b == 0 {
                total += 2;
            } else {
                if b & 0x0F == 0 {
                    total += 1;
                }
                break;
            }
        }
        total
    }
}
