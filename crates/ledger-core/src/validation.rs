use tracing::debug;

use crate::pow::valid_proof;
use crate::Block;

/// Checks a chain received from anywhere, without touching local state.
///
/// A chain needs at least two blocks to be considered; each block's hash must
/// equal its successor's `previous_hash` and each successor's proof must
/// satisfy the proof of work against its predecessor's proof.
pub fn is_valid_chain(chain: &[Block]) -> bool {
    if chain.len() < 2 {
        return false;
    }
    chain.windows(2).rev().all(|pair| {
        let (block, next) = (&pair[0], &pair[1]);
        if block.hash() != next.previous_hash {
            debug!(
                block = block.id,
                next = next.id,
                "previous hash does not match"
            );
            return false;
        }
        if !valid_proof(block.proof, next.proof) {
            debug!(block = block.id, next = next.id, "invalid proof");
            return false;
        }
        true
    })
}
