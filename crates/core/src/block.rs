//! Blocks and proof-of-work mining.

use crate::cancel::CancelToken;
use crate::hash::{hash_concat, hash_serialized, Hash};
use crate::merkle::{merkle_root, MerkleProof, MerkleTree};
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message stored in every genesis block.
pub const GENESIS_MESSAGE: &str = "Herd ledger genesis block";

/// Highest difficulty a 256-bit hash can satisfy (64 hex digits).
pub const MAX_DIFFICULTY: usize = 64;

/// How many nonces are tried between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Errors that can occur while mining.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("nonce space exhausted")]
    NonceExhausted,

    #[error("difficulty {0} is unreachable (maximum {MAX_DIFFICULTY})")]
    UnreachableDifficulty(usize),
}

/// Fixed record carried by the genesis block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisRecord {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// What a block carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockPayload {
    Genesis(GenesisRecord),
    Transactions(Vec<Transaction>),
}

impl BlockPayload {
    /// Merkle leaves: one per transaction, or the genesis record hash.
    pub fn leaves(&self) -> Vec<Hash> {
        match self {
            BlockPayload::Genesis(record) => vec![hash_serialized(record)],
            BlockPayload::Transactions(txs) => txs.iter().map(|tx| tx.hash()).collect(),
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        match self {
            BlockPayload::Genesis(_) => &[],
            BlockPayload::Transactions(txs) => txs,
        }
    }
}

/// A mined (or about to be mined) block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 for genesis).
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous block, `Hash::ZERO` for genesis.
    pub previous_hash: Hash,
    pub payload: BlockPayload,
    /// Proof-of-work nonce.
    pub nonce: u64,
    pub merkle_root: Hash,
    pub hash: Hash,
}

/// Every hashed field except the nonce.
#[derive(Serialize)]
struct BlockPreimage<'a> {
    index: u64,
    timestamp: &'a DateTime<Utc>,
    payload: &'a BlockPayload,
    previous_hash: &'a Hash,
    merkle_root: &'a Hash,
}

impl Block {
    /// Create an unmined block with nonce 0.
    pub fn new(index: u64, previous_hash: Hash, payload: BlockPayload) -> Self {
        let merkle_root = merkle_root(&payload.leaves());
        let mut block = Self {
            index,
            timestamp: Utc::now(),
            previous_hash,
            payload,
            nonce: 0,
            merkle_root,
            hash: Hash::ZERO,
        };
        block.hash = block.recompute_hash();
        block
    }

    /// Create an unmined genesis block.
    pub fn genesis() -> Self {
        Self::new(
            0,
            Hash::ZERO,
            BlockPayload::Genesis(GenesisRecord {
                message: GENESIS_MESSAGE.to_string(),
                created_at: Utc::now(),
            }),
        )
    }

    fn preimage(&self) -> Vec<u8> {
        let preimage = BlockPreimage {
            index: self.index,
            timestamp: &self.timestamp,
            payload: &self.payload,
            previous_hash: &self.previous_hash,
            merkle_root: &self.merkle_root,
        };
        bincode::serialize(&preimage).expect("serialization should not fail")
    }

    fn hash_with_nonce(preimage: &[u8], nonce: u64) -> Hash {
        hash_concat(&[preimage, &nonce.to_le_bytes()])
    }

    /// Hash the stored fields without touching the block.
    pub fn recompute_hash(&self) -> Hash {
        Self::hash_with_nonce(&self.preimage(), self.nonce)
    }

    /// Search for a nonce whose hash has `difficulty` leading zero hex digits.
    ///
    /// Returns the number of nonces tried. On cancellation the block keeps
    /// its previous nonce and hash.
    pub fn mine(&mut self, difficulty: usize, cancel: &CancelToken) -> Result<u64, MiningError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(MiningError::UnreachableDifficulty(difficulty));
        }

        let preimage = self.preimage();
        let mut nonce = self.nonce;
        let mut hash = Self::hash_with_nonce(&preimage, nonce);
        let mut attempts = 0u64;

        while !hash.meets_difficulty(difficulty) {
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(MiningError::Cancelled { attempts });
            }
            nonce = nonce.checked_add(1).ok_or(MiningError::NonceExhausted)?;
            hash = Self::hash_with_nonce(&preimage, nonce);
            attempts += 1;
        }

        self.nonce = nonce;
        self.hash = hash;
        Ok(attempts)
    }

    /// Check the stored hash against the stored fields.
    pub fn verify_hash(&self) -> bool {
        self.recompute_hash() == self.hash
    }

    /// Verify the merkle root matches the payload.
    pub fn verify_merkle_root(&self) -> bool {
        merkle_root(&self.payload.leaves()) == self.merkle_root
    }

    /// Inclusion proof for the transaction at `position`.
    pub fn merkle_proof(&self, position: usize) -> Option<MerkleProof> {
        MerkleTree::new(&self.payload.leaves()).proof(position)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == Hash::ZERO
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.payload.transactions()
    }

    pub fn tx_count(&self) -> usize {
        self.transactions().len()
    }
}
