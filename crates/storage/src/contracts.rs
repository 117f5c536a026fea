//! Persistent breeding contracts.

use crate::db::{Result, Storage};
use herdledger_core::BreedingContract;

/// Read access to stored breeding contracts.
///
/// Contracts are only written through `StagedState`, alongside the block
/// that carries their events.
pub struct ContractBook<'a> {
    storage: &'a Storage,
}

impl<'a> ContractBook<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn get(&self, contract_id: &str) -> Result<Option<BreedingContract>> {
        self.storage.get(Storage::contract_key(contract_id))
    }

    pub fn contains(&self, contract_id: &str) -> Result<bool> {
        self.storage.contains(Storage::contract_key(contract_id))
    }

    /// All contract ids, sorted.
    pub fn contract_ids(&self) -> Result<Vec<String>> {
        self.storage.keys_with_prefix(Storage::CONTRACT_PREFIX)
    }
}
