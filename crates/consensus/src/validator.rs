//! Block and chain integrity rules.
//!
//! Validation only detects and reports; nothing here repairs a chain.

use herdledger_core::{Block, Hash};
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block {index}: stored hash does not match recomputed hash")]
    HashMismatch { index: u64 },

    #[error("block {index}: merkle root does not match payload")]
    InvalidMerkleRoot { index: u64 },

    #[error("block {index}: previous_hash does not match its parent")]
    BrokenLink { index: u64 },

    #[error("block index mismatch (expected {expected}, got {got})")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("genesis block must have index 0 and a zero previous_hash")]
    InvalidGenesis,

    #[error("duplicate transaction in block {index}")]
    DuplicateTransaction { index: u64 },

    #[error("transaction id does not match its fields in block {index}")]
    TransactionIdMismatch { index: u64 },

    #[error("chain is empty")]
    EmptyChain,
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// Validate the block's own contents: hash, merkle root, transactions.
    pub fn validate_block_structure(block: &Block) -> Result<()> {
        let index = block.index;

        if !block.verify_hash() {
            return Err(ValidationError::HashMismatch { index });
        }

        if !block.verify_merkle_root() {
            return Err(ValidationError::InvalidMerkleRoot { index });
        }

        let mut seen = std::collections::HashSet::new();
        for tx in block.transactions() {
            if tx.id != tx.compute_id() {
                return Err(ValidationError::TransactionIdMismatch { index });
            }
            if !seen.insert(tx.id) {
                return Err(ValidationError::DuplicateTransaction { index });
            }
        }

        Ok(())
    }

    /// Validate that the block extends the parent.
    pub fn validate_block_extends_parent(
        block: &Block,
        parent_hash: Hash,
        parent_index: u64,
    ) -> Result<()> {
        if block.index != parent_index + 1 {
            return Err(ValidationError::InvalidIndex {
                expected: parent_index + 1,
                got: block.index,
            });
        }

        if block.previous_hash != parent_hash {
            return Err(ValidationError::BrokenLink { index: block.index });
        }

        Ok(())
    }

    /// Full block validation (structure + parent link).
    pub fn validate_full(block: &Block, parent: &Block) -> Result<()> {
        Self::validate_block_structure(block)?;
        Self::validate_block_extends_parent(block, parent.hash, parent.index)?;
        Ok(())
    }
}

/// Whole-chain validator.
pub struct ChainValidator;

impl ChainValidator {
    /// Walk the chain from genesis, reporting the first violation found.
    pub fn validate_chain(blocks: &[Block]) -> Result<()> {
        let genesis = blocks.first().ok_or(ValidationError::EmptyChain)?;
        if !genesis.is_genesis() {
            return Err(ValidationError::InvalidGenesis);
        }
        BlockValidator::validate_block_structure(genesis)?;

        for pair in blocks.windows(2) {
            BlockValidator::validate_full(&pair[1], &pair[0])?;
        }

        Ok(())
    }

    /// Boolean form of `validate_chain`.
    pub fn is_valid(blocks: &[Block]) -> bool {
        Self::validate_chain(blocks).is_ok()
    }
}
