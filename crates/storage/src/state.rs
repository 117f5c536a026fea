//! Staged registry and contract writes.
//!
//! A `StagedState` reads through to storage, keeps every mutated record in
//! memory, and turns the result into one batch. The mutated records live in
//! a [`StagedChanges`] that outlives the borrow of storage, so a caller can
//! keep the effects of its pending pool between submissions and hand the
//! batch to the chain store when the block is sealed.

use crate::contracts::ContractBook;
use crate::db::{BatchOp, Storage, StorageError};
use crate::registry::{AssetRegistry, OwnershipPolicy, RegistryError, Result};
use chrono::{DateTime, Utc};
use herdledger_core::{
    AssetRecord, BreedingContract, ContractEvent, HealthEvent, NewAsset, OwnershipTransfer,
    Transaction, TxPayload,
};
use std::collections::BTreeMap;

/// Records mutated by staged transactions, not yet written.
#[derive(Debug, Clone, Default)]
pub struct StagedChanges {
    assets: BTreeMap<String, AssetRecord>,
    contracts: BTreeMap<String, BreedingContract>,
}

impl StagedChanges {
    /// Staged records as batch inserts.
    pub fn to_batch(&self) -> std::result::Result<Vec<BatchOp>, StorageError> {
        let mut ops = Vec::with_capacity(self.assets.len() + self.contracts.len());
        for (asset_id, record) in &self.assets {
            ops.push(BatchOp::put(Storage::asset_key(asset_id), record)?);
        }
        for (contract_id, contract) in &self.contracts {
            ops.push(BatchOp::put(Storage::contract_key(contract_id), contract)?);
        }
        Ok(ops)
    }
}

/// Pending registry and contract mutations over a storage snapshot.
pub struct StagedState<'a> {
    registry: AssetRegistry<'a>,
    contracts: ContractBook<'a>,
    policy: OwnershipPolicy,
    changes: StagedChanges,
}

impl<'a> StagedState<'a> {
    pub fn new(storage: &'a Storage, policy: OwnershipPolicy) -> Self {
        Self::resume(storage, policy, StagedChanges::default())
    }

    /// Continue staging on top of earlier `changes`.
    pub fn resume(storage: &'a Storage, policy: OwnershipPolicy, changes: StagedChanges) -> Self {
        Self {
            registry: AssetRegistry::with_policy(storage, policy),
            contracts: ContractBook::new(storage),
            policy,
            changes,
        }
    }

    /// Current view of an asset, staged changes first.
    pub fn asset(&self, asset_id: &str) -> std::result::Result<Option<AssetRecord>, StorageError> {
        match self.changes.assets.get(asset_id) {
            Some(record) => Ok(Some(record.clone())),
            None => self.registry.get(asset_id),
        }
    }

    /// Current view of a contract, staged changes first.
    pub fn contract(
        &self,
        contract_id: &str,
    ) -> std::result::Result<Option<BreedingContract>, StorageError> {
        match self.changes.contracts.get(contract_id) {
            Some(contract) => Ok(Some(contract.clone())),
            None => self.contracts.get(contract_id),
        }
    }

    fn existing_asset(&self, asset_id: &str) -> Result<AssetRecord> {
        self.asset(asset_id)?
            .ok_or_else(|| RegistryError::AssetNotFound(asset_id.to_string()))
    }

    /// Stage a new asset.
    pub fn register(&mut self, asset: NewAsset) -> Result<()> {
        if !asset.has_valid_lineage() {
            return Err(RegistryError::InvalidLineage {
                count: asset.parent_ids.len(),
                asset_id: asset.asset_id,
            });
        }
        if self.asset(&asset.asset_id)?.is_some() {
            return Err(RegistryError::DuplicateAsset(asset.asset_id));
        }

        let record = AssetRecord::register(asset);
        self.changes.assets.insert(record.asset_id.clone(), record);
        Ok(())
    }

    /// Stage an ownership change dated `date`.
    pub fn transfer(&mut self, transfer: &OwnershipTransfer, date: DateTime<Utc>) -> Result<()> {
        let mut record = self.existing_asset(&transfer.asset_id)?;

        if self.policy == OwnershipPolicy::Strict && record.owner_id != transfer.from_owner {
            return Err(RegistryError::OwnerMismatch {
                asset_id: transfer.asset_id.clone(),
                owner: record.owner_id,
                claimed: transfer.from_owner.clone(),
            });
        }

        record.record_transfer(&transfer.to_owner, date, transfer.price);
        self.changes.assets.insert(record.asset_id.clone(), record);
        Ok(())
    }

    /// Stage a health event.
    pub fn add_health_record(&mut self, asset_id: &str, event: HealthEvent) -> Result<()> {
        let mut record = self.existing_asset(asset_id)?;
        record.record_health(event);
        self.changes.assets.insert(record.asset_id.clone(), record);
        Ok(())
    }

    /// Stage a new breeding contract.
    pub fn create_contract(&mut self, contract: BreedingContract) -> Result<()> {
        if self.contract(&contract.contract_id)?.is_some() {
            return Err(RegistryError::DuplicateContract(contract.contract_id));
        }
        self.changes
            .contracts
            .insert(contract.contract_id.clone(), contract);
        Ok(())
    }

    /// Stage contract completion together with the offspring registration.
    pub fn execute_contract(
        &mut self,
        contract_id: &str,
        offspring: NewAsset,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut contract = self
            .contract(contract_id)?
            .ok_or_else(|| RegistryError::ContractNotFound(contract_id.to_string()))?;
        if !contract.is_active() {
            return Err(RegistryError::ContractNotActive(contract_id.to_string()));
        }

        let offspring_id = offspring.asset_id.clone();
        self.register(offspring)?;
        contract.complete(&offspring_id, completed_at);
        self.changes
            .contracts
            .insert(contract_id.to_string(), contract);
        Ok(())
    }

    /// Stage the effect of one transaction.
    ///
    /// Dates come from the transaction, so applying the same transaction
    /// twice yields the same record. A transaction that fails stages
    /// nothing.
    pub fn apply(&mut self, tx: &Transaction) -> Result<()> {
        match &tx.payload {
            TxPayload::Registration(asset) => self.register(asset.clone()),
            TxPayload::Transfer(transfer) => self.transfer(transfer, tx.timestamp),
            TxPayload::HealthRecord(update) => {
                self.add_health_record(&update.asset_id, update.event.clone())
            }
            TxPayload::MiningReward => Ok(()),
            TxPayload::SmartContract(ContractEvent::Created(contract)) => {
                self.create_contract(contract.clone())
            }
            TxPayload::SmartContract(ContractEvent::Executed {
                contract_id,
                offspring,
                completed_at,
            }) => self.execute_contract(contract_id, offspring.clone(), *completed_at),
        }
    }

    /// Release the borrow of storage, keeping what was staged.
    pub fn into_changes(self) -> StagedChanges {
        self.changes
    }

    /// Staged records as batch inserts.
    pub fn into_batch(self) -> std::result::Result<Vec<BatchOp>, StorageError> {
        self.changes.to_batch()
    }
}
