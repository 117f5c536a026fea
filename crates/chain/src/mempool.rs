//! Pending transaction pool.
//!
//! Transactions wait here, in submission order, until the next block is
//! mined. Order matters: a transfer may depend on a registration queued
//! before it.

use herdledger_core::{Hash, Transaction, TransactionKind};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors that can occur during mempool operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already pending: {0}")]
    DuplicateTransaction(Hash),

    #[error("pending pool is full (capacity: {0})")]
    MempoolFull(usize),
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Configuration for the mempool.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of pending transactions.
    pub max_transactions: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10_000,
        }
    }
}

/// Insertion-ordered pool of pending transactions.
pub struct Mempool {
    config: MempoolConfig,
    transactions: Vec<Transaction>,
    ids: HashSet<Hash>,
}

impl Mempool {
    /// Create a new mempool with default configuration.
    pub fn new() -> Self {
        Self::with_config(MempoolConfig::default())
    }

    pub fn with_config(config: MempoolConfig) -> Self {
        Self {
            config,
            transactions: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Check if a transaction id is pending.
    pub fn contains(&self, id: &Hash) -> bool {
        self.ids.contains(id)
    }

    /// Whether `tx` would be accepted by [`Mempool::add`].
    pub fn check(&self, tx: &Transaction) -> Result<()> {
        if self.contains(&tx.id) {
            return Err(MempoolError::DuplicateTransaction(tx.id));
        }
        if self.transactions.len() >= self.config.max_transactions {
            return Err(MempoolError::MempoolFull(self.config.max_transactions));
        }
        Ok(())
    }

    /// Queue a transaction at the back of the pool.
    pub fn add(&mut self, tx: Transaction) -> Result<()> {
        self.check(&tx)?;
        self.ids.insert(tx.id);
        self.transactions.push(tx);
        Ok(())
    }

    /// Pending transactions in submission order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
        self.ids.clear();
    }

    /// Get mempool statistics.
    pub fn stats(&self) -> MempoolStats {
        let mut by_kind = BTreeMap::new();
        for tx in &self.transactions {
            *by_kind.entry(tx.kind()).or_insert(0) += 1;
        }

        MempoolStats {
            total_transactions: self.len(),
            by_kind,
            capacity: self.config.max_transactions,
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

/// Mempool statistics.
#[derive(Debug, Clone)]
pub struct MempoolStats {
    /// Total number of transactions.
    pub total_transactions: usize,
    /// Pending count per transaction kind.
    pub by_kind: BTreeMap<TransactionKind, usize>,
    /// Mempool capacity.
    pub capacity: usize,
}
