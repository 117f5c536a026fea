//! Core ledger primitives for herdledger.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - SHA-256 hashing and merkle trees
//! - Blocks with proof-of-work mining
//! - Transactions with typed payloads
//! - Cattle asset records and breeding contracts

pub mod asset;
pub mod block;
pub mod cancel;
pub mod contract;
pub mod hash;
pub mod merkle;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use asset::{AssetRecord, HealthEvent, HealthEventKind, NewAsset, OwnershipEntry, MAX_PARENTS};
pub use block::{Block, BlockPayload, GenesisRecord, MiningError, MAX_DIFFICULTY};
pub use cancel::CancelToken;
pub use contract::{BreedingContract, ContractEvent, ContractStatus};
pub use hash::{hash, hash_concat, hash_serialized, Hash, H256};
pub use merkle::{merkle_root, verify_proof, MerkleProof, MerkleTree};
pub use transaction::{
    HealthUpdate, OwnershipTransfer, Transaction, TransactionKind, TxPayload, SYSTEM_ACCOUNT,
};
