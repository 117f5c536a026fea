//! The in-memory block log.
//!
//! `Chain` owns the ordered blocks and the proof-of-work rule. A block is
//! pushed only after its sink has durably accepted it, so a failed write
//! leaves both memory and storage at the previous tip.

use crate::error::{LedgerError, Result};
use herdledger_consensus::{ChainValidator, ProofOfWork};
use herdledger_core::{Block, BlockPayload, CancelToken, Transaction};
use herdledger_storage::{BatchOp, BlockSink};
use tracing::{info, warn};

/// Ordered, hash-linked blocks starting at genesis.
pub struct Chain {
    blocks: Vec<Block>,
    pow: ProofOfWork,
}

impl Chain {
    /// An empty chain; call [`Chain::init`] before appending.
    pub fn new(pow: ProofOfWork) -> Self {
        Self {
            blocks: Vec::new(),
            pow,
        }
    }

    /// Rebuild from blocks loaded out of storage. No validation is done.
    pub fn restore(blocks: Vec<Block>, pow: ProofOfWork) -> Self {
        Self { blocks, pow }
    }

    pub fn pow(&self) -> ProofOfWork {
        self.pow
    }

    /// Mine and persist the genesis block.
    pub fn init(&mut self, sink: &impl BlockSink, cancel: &CancelToken) -> Result<&Block> {
        if !self.blocks.is_empty() {
            return Err(LedgerError::AlreadyInitialized);
        }

        let mut genesis = Block::genesis();
        self.pow.seal(&mut genesis, cancel)?;
        sink.commit_block(&genesis, Vec::new())?;

        info!(hash = %genesis.hash, "genesis block created");
        self.blocks.push(genesis);
        Ok(&self.blocks[0])
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// The current tip.
    pub fn latest(&self) -> Result<&Block> {
        self.blocks.last().ok_or(LedgerError::EmptyChain)
    }

    /// Seal `pending` plus `reward` into the next block and commit it.
    ///
    /// `registry_ops` are the registry writes produced by `pending`; they go
    /// to the sink in the same batch as the block. On any error the chain is
    /// unchanged.
    pub fn append_pending(
        &mut self,
        sink: &impl BlockSink,
        pending: Vec<Transaction>,
        reward: Transaction,
        registry_ops: Vec<BatchOp>,
        cancel: &CancelToken,
    ) -> Result<&Block> {
        let parent = self.latest()?;
        let mut transactions = pending;
        transactions.push(reward);

        let mut block = Block::new(
            parent.index + 1,
            parent.hash,
            BlockPayload::Transactions(transactions),
        );
        let outcome = self.pow.seal(&mut block, cancel)?;

        if let Err(err) = sink.commit_block(&block, registry_ops) {
            warn!(index = block.index, error = %err, "block rejected by storage");
            return Err(err.into());
        }

        info!(
            index = block.index,
            hash = %block.hash,
            transactions = block.tx_count(),
            attempts = outcome.attempts,
            "block appended"
        );
        self.blocks.push(block);
        self.latest()
    }

    /// Walk the whole chain, reporting the first violation.
    pub fn validate(&self) -> Result<()> {
        ChainValidator::validate_chain(&self.blocks)?;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        ChainValidator::is_valid(&self.blocks)
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}
