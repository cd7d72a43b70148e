//! Persistent backends for the ledger and node registry.
//!
//! The traits live in `ledger-core`; this crate only provides [`SledStore`].
pub mod sled_store;

pub use sled_store::SledStore;
