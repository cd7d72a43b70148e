pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Trailing hex zeros a proof hash must carry.
pub const POW_DIFFICULTY: u32 = 4;

pub const GENESIS_BLOCK_ID: u64 = 1;
pub const GENESIS_PREVIOUS_HASH: &str = "0000";
pub const GENESIS_PROOF: u64 = 1;

pub const REWARD_SENDER: &str = "0";
pub const REWARD_AMOUNT: i64 = 1;

/// Default request timeout for peer calls, in seconds.
pub const PEER_TIMEOUT_SECS: u64 = 10;

pub const SUCCESS: &str = "Success";
pub const NO_CONFLICTS: &str = "No conflicts";
