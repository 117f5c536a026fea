//! Block storage and chain head tracking.

use crate::db::{BatchOp, Result, Storage, StorageError};
use herdledger_core::{Block, Hash};

/// Keys for chain metadata.
const CHAIN_HEAD_KEY: &[u8] = b"chain:head";
const CHAIN_HEIGHT_KEY: &[u8] = b"chain:height";

/// Durable destination for mined blocks.
///
/// `extra` carries the registry writes produced by the block's transactions;
/// an implementation must commit the block and `extra` as one unit or not at
/// all.
pub trait BlockSink {
    fn commit_block(&self, block: &Block, extra: Vec<BatchOp>) -> Result<()>;
}

/// Manages block storage and chain state.
pub struct ChainStore<'a> {
    storage: &'a Storage,
}

impl<'a> ChainStore<'a> {
    /// Create a new ChainStore wrapping the given storage.
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    // =========================================================================
    // Block Storage
    // =========================================================================

    /// Batch operations that store a block and make it the chain head.
    ///
    /// - Primary: `block:hash:{hash}` → full block data
    /// - Secondary: `block:height:{index}` → hash
    pub fn block_ops(block: &Block) -> Result<Vec<BatchOp>> {
        Ok(vec![
            BatchOp::put(Storage::block_hash_key(&block.hash), block)?,
            BatchOp::put(Storage::block_height_key(block.index), &block.hash)?,
            BatchOp::put(CHAIN_HEAD_KEY.to_vec(), &block.hash)?,
            BatchOp::put(CHAIN_HEIGHT_KEY.to_vec(), &block.index)?,
        ])
    }

    /// Get a block by its hash.
    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        self.storage.get(Storage::block_hash_key(hash))
    }

    /// Get a block by its index (height → hash → block).
    pub fn get_block_by_height(&self, index: u64) -> Result<Option<Block>> {
        let hash: Option<Hash> = self.storage.get(Storage::block_height_key(index))?;

        match hash {
            Some(h) => self.get_block_by_hash(&h),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Chain Head Tracking
    // =========================================================================

    /// Get the current chain head hash.
    pub fn get_head(&self) -> Result<Option<Hash>> {
        self.storage.get(CHAIN_HEAD_KEY)
    }

    /// Get the current chain height.
    /// Returns 0 if the chain is not initialized.
    pub fn get_height(&self) -> Result<u64> {
        Ok(self.storage.get::<_, u64>(CHAIN_HEIGHT_KEY)?.unwrap_or(0))
    }

    /// Check if the chain is initialized (has a genesis block).
    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.get_head()?.is_some())
    }

    // =========================================================================
    // Chain Operations
    // =========================================================================

    /// Append a block together with `extra` in one atomic batch.
    ///
    /// The block must be genesis on an empty store, or extend the current
    /// head by exactly one index. Hash validity is not checked here.
    pub fn append_block(&self, block: &Block, extra: Vec<BatchOp>) -> Result<()> {
        match self.get_head()? {
            None => {
                if block.index != 0 {
                    return Err(StorageError::InvalidChainState(
                        "Genesis block must have index 0".into(),
                    ));
                }
            }
            Some(head_hash) => {
                if block.index == 0 {
                    return Err(StorageError::InvalidChainState(
                        "Chain already initialized".into(),
                    ));
                }
                let current_height = self.get_height()?;
                if block.index != current_height + 1 {
                    return Err(StorageError::InvalidChainState(format!(
                        "Expected block index {}, got {}",
                        current_height + 1,
                        block.index
                    )));
                }
                if block.previous_hash != head_hash {
                    return Err(StorageError::InvalidChainState(format!(
                        "Block previous_hash {} doesn't match chain head {}",
                        block.previous_hash, head_hash
                    )));
                }
            }
        }

        let mut ops = Self::block_ops(block)?;
        ops.extend(extra);
        self.storage.batch(ops)
    }

    /// Get blocks in a range [from, to].
    pub fn get_blocks_range(&self, from: u64, to: u64) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for index in from..=to {
            if let Some(block) = self.get_block_by_height(index)? {
                blocks.push(block);
            } else {
                break; // Stop at first missing block
            }
        }
        Ok(blocks)
    }

    /// Load the full chain, genesis first. Empty if uninitialized.
    pub fn load_chain(&self) -> Result<Vec<Block>> {
        if !self.is_initialized()? {
            return Ok(Vec::new());
        }
        let height = self.get_height()?;
        let blocks = self.get_blocks_range(0, height)?;
        if blocks.len() as u64 != height + 1 {
            return Err(StorageError::InvalidChainState(format!(
                "Missing block at index {}",
                blocks.len()
            )));
        }
        Ok(blocks)
    }
}

impl BlockSink for ChainStore<'_> {
    fn commit_block(&self, block: &Block, extra: Vec<BatchOp>) -> Result<()> {
        self.append_block(block, extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdledger_core::{BlockPayload, Transaction};

    fn setup() -> Storage {
        Storage::open_temporary().unwrap()
    }

    fn next_block(parent: &Block) -> Block {
        let txs = vec![Transaction::mining_reward("miner", 10)];
        Block::new(parent.index + 1, parent.hash, BlockPayload::Transactions(txs))
    }

    #[test]
    fn test_genesis_init() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        assert!(!chain.is_initialized().unwrap());

        let genesis = Block::genesis();
        chain.append_block(&genesis, Vec::new()).unwrap();

        assert!(chain.is_initialized().unwrap());
        assert_eq!(chain.get_height().unwrap(), 0);
        assert_eq!(chain.get_head().unwrap(), Some(genesis.hash));
    }

    #[test]
    fn test_genesis_double_init_fails() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis();
        chain.append_block(&genesis, Vec::new()).unwrap();

        let result = chain.append_block(&genesis, Vec::new());
        assert!(matches!(result, Err(StorageError::InvalidChainState(_))));
    }

    #[test]
    fn test_non_genesis_as_first_block_fails() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let block = next_block(&Block::genesis());
        let result = chain.append_block(&block, Vec::new());
        assert!(matches!(result, Err(StorageError::InvalidChainState(_))));
    }

    #[test]
    fn test_block_lookups() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis();
        chain.append_block(&genesis, Vec::new()).unwrap();

        let by_hash = chain.get_block_by_hash(&genesis.hash).unwrap().unwrap();
        assert_eq!(by_hash, genesis);

        let by_height = chain.get_block_by_height(0).unwrap().unwrap();
        assert_eq!(by_height, genesis);
        assert!(chain.get_block_by_height(1).unwrap().is_none());
    }

    #[test]
    fn test_append_block_with_extra_ops() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis();
        chain.append_block(&genesis, Vec::new()).unwrap();

        let block1 = next_block(&genesis);
        let extra = vec![BatchOp::put(Storage::asset_key("COW001"), &7u64).unwrap()];
        chain.append_block(&block1, extra).unwrap();

        assert_eq!(chain.get_height().unwrap(), 1);
        assert_eq!(chain.get_head().unwrap(), Some(block1.hash));
        assert_eq!(storage.get::<_, u64>(Storage::asset_key("COW001")).unwrap(), Some(7));
    }

    #[test]
    fn test_rejected_append_writes_nothing() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis();
        chain.append_block(&genesis, Vec::new()).unwrap();

        let mut orphan = next_block(&genesis);
        orphan.previous_hash = Hash([0xFF; 32]);
        let extra = vec![BatchOp::put(Storage::asset_key("COW001"), &7u64).unwrap()];

        let result = chain.append_block(&orphan, extra);
        assert!(matches!(result, Err(StorageError::InvalidChainState(_))));
        assert!(!storage.contains(Storage::asset_key("COW001")).unwrap());
        assert_eq!(chain.get_height().unwrap(), 0);
    }

    #[test]
    fn test_append_wrong_index_fails() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis();
        chain.append_block(&genesis, Vec::new()).unwrap();

        let mut block = next_block(&genesis);
        block.index = 5;
        let result = chain.append_block(&block, Vec::new());
        assert!(matches!(result, Err(StorageError::InvalidChainState(_))));
    }

    #[test]
    fn test_chain_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = Block::genesis();
        {
            let storage = Storage::open(dir.path()).unwrap();
            ChainStore::new(&storage).append_block(&genesis, Vec::new()).unwrap();
            storage.flush().unwrap();
        }

        let storage = Storage::open(dir.path()).unwrap();
        let chain = ChainStore::new(&storage);
        assert_eq!(chain.load_chain().unwrap(), vec![genesis]);
    }

    #[test]
    fn test_load_chain() {
        let storage = setup();
        let chain = ChainStore::new(&storage);
        assert!(chain.load_chain().unwrap().is_empty());

        let genesis = Block::genesis();
        chain.append_block(&genesis, Vec::new()).unwrap();
        let block1 = next_block(&genesis);
        chain.append_block(&block1, Vec::new()).unwrap();
        let block2 = next_block(&block1);
        chain.append_block(&block2, Vec::new()).unwrap();

        let blocks = chain.load_chain().unwrap();
        assert_eq!(blocks, vec![genesis, block1, block2]);
    }
}
