//! Persistent asset registry.

use crate::db::{Storage, StorageError};
use crate::state::StagedState;
use herdledger_core::{
    AssetRecord, Block, ContractEvent, HealthEvent, NewAsset, OwnershipTransfer, TxPayload,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by registry and contract mutations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("asset already registered: {0}")]
    DuplicateAsset(String),

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("asset {asset_id} lists {count} parents (maximum 2)")]
    InvalidLineage { asset_id: String, count: usize },

    #[error("asset {asset_id} is owned by {owner}, not {claimed}")]
    OwnerMismatch {
        asset_id: String,
        owner: String,
        claimed: String,
    },

    #[error("contract already exists: {0}")]
    DuplicateContract(String),

    #[error("contract not found: {0}")]
    ContractNotFound(String),

    #[error("contract is not active: {0}")]
    ContractNotActive(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// How transfers treat the claimed current owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipPolicy {
    /// Any `from_owner` is accepted.
    #[default]
    Permissive,
    /// `from_owner` must match the recorded owner.
    Strict,
}

/// Why an authenticity check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    NotFound,
    HashMismatch,
    /// The record differs from the one the chain's transactions produce.
    ChainMismatch,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationFailure::NotFound => f.write_str("not found"),
            VerificationFailure::HashMismatch => f.write_str("hash mismatch"),
            VerificationFailure::ChainMismatch => {
                f.write_str("record does not match chain history")
            }
        }
    }
}

/// Outcome of an authenticity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// The full record, present only when valid.
    pub record: Option<AssetRecord>,
    pub reason: Option<VerificationFailure>,
}

impl Verification {
    fn authentic(record: AssetRecord) -> Self {
        Self {
            valid: true,
            record: Some(record),
            reason: None,
        }
    }

    fn failed(reason: VerificationFailure) -> Self {
        Self {
            valid: false,
            record: None,
            reason: Some(reason),
        }
    }
}

/// Registry of cattle records keyed by asset id.
pub struct AssetRegistry<'a> {
    storage: &'a Storage,
    policy: OwnershipPolicy,
}

impl<'a> AssetRegistry<'a> {
    /// Create a registry with the permissive ownership policy.
    pub fn new(storage: &'a Storage) -> Self {
        Self::with_policy(storage, OwnershipPolicy::default())
    }

    pub fn with_policy(storage: &'a Storage, policy: OwnershipPolicy) -> Self {
        Self { storage, policy }
    }

    pub fn policy(&self) -> OwnershipPolicy {
        self.policy
    }

    /// Look up a record.
    pub fn get(&self, asset_id: &str) -> std::result::Result<Option<AssetRecord>, StorageError> {
        self.storage.get(Storage::asset_key(asset_id))
    }

    pub fn contains(&self, asset_id: &str) -> std::result::Result<bool, StorageError> {
        self.storage.contains(Storage::asset_key(asset_id))
    }

    /// All registered asset ids, sorted.
    pub fn asset_ids(&self) -> std::result::Result<Vec<String>, StorageError> {
        self.storage.keys_with_prefix(Storage::ASSET_PREFIX)
    }

    // =========================================================================
    // Direct mutations
    //
    // Each runs through a single-operation StagedState and commits it as one
    // batch. The ledger does not use these; it stages a whole block instead.
    // =========================================================================

    /// Insert a new record.
    pub fn register(&self, asset: NewAsset) -> Result<AssetRecord> {
        let asset_id = asset.asset_id.clone();
        let mut staged = StagedState::new(self.storage, self.policy);
        staged.register(asset)?;
        self.commit(staged, &asset_id)
    }

    /// Move an asset to a new owner.
    pub fn transfer(
        &self,
        asset_id: &str,
        from_owner: &str,
        to_owner: &str,
        price: u64,
    ) -> Result<AssetRecord> {
        let transfer = OwnershipTransfer {
            asset_id: asset_id.to_string(),
            from_owner: from_owner.to_string(),
            to_owner: to_owner.to_string(),
            price,
        };
        let mut staged = StagedState::new(self.storage, self.policy);
        staged.transfer(&transfer, Utc::now())?;
        self.commit(staged, asset_id)
    }

    /// Append a health event.
    pub fn add_health_record(&self, asset_id: &str, event: HealthEvent) -> Result<AssetRecord> {
        let mut staged = StagedState::new(self.storage, self.policy);
        staged.add_health_record(asset_id, event)?;
        self.commit(staged, asset_id)
    }

    fn commit(&self, staged: StagedState<'_>, asset_id: &str) -> Result<AssetRecord> {
        self.storage.batch(staged.into_batch()?)?;
        self.get(asset_id)?
            .ok_or_else(|| RegistryError::AssetNotFound(asset_id.to_string()))
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Recompute the identity hash and compare it to the stored one.
    pub fn verify_authenticity(
        &self,
        asset_id: &str,
    ) -> std::result::Result<Verification, StorageError> {
        let verification = match self.get(asset_id)? {
            None => Verification::failed(VerificationFailure::NotFound),
            Some(record) if record.is_authentic() => Verification::authentic(record),
            Some(_) => {
                tracing::warn!(asset_id, "certification hash mismatch");
                Verification::failed(VerificationFailure::HashMismatch)
            }
        };
        Ok(verification)
    }

    /// [`AssetRegistry::verify_authenticity`], then compare the stored
    /// record with the one rebuilt from `blocks`.
    ///
    /// Owner, ownership history and health records are outside the
    /// certification hash; the chain is what vouches for them.
    pub fn verify_against_chain(
        &self,
        asset_id: &str,
        blocks: &[Block],
    ) -> std::result::Result<Verification, StorageError> {
        let verification = self.verify_authenticity(asset_id)?;
        let diverged = match &verification.record {
            Some(record) => replay_asset(asset_id, blocks).as_ref() != Some(record),
            None => false,
        };

        if diverged {
            tracing::warn!(asset_id, "record diverges from chain history");
            return Ok(Verification::failed(VerificationFailure::ChainMismatch));
        }
        Ok(verification)
    }
}

/// Rebuild an asset's record from the transactions in `blocks`.
fn replay_asset(asset_id: &str, blocks: &[Block]) -> Option<AssetRecord> {
    let mut record: Option<AssetRecord> = None;

    for tx in blocks.iter().flat_map(|block| block.transactions()) {
        match &tx.payload {
            TxPayload::Registration(asset)
            | TxPayload::SmartContract(ContractEvent::Executed {
                offspring: asset, ..
            }) if asset.asset_id == asset_id => {
                record = Some(AssetRecord::register(asset.clone()));
            }
            TxPayload::Transfer(transfer) if transfer.asset_id == asset_id => {
                if let Some(record) = record.as_mut() {
                    record.record_transfer(&transfer.to_owner, tx.timestamp, transfer.price);
                }
            }
            TxPayload::HealthRecord(update) if update.asset_id == asset_id => {
                if let Some(record) = record.as_mut() {
                    record.record_health(update.event.clone());
                }
            }
            _ => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use herdledger_core::{BlockPayload, Hash, HealthEventKind, OwnershipEntry, Transaction};

    fn cow(id: &str) -> NewAsset {
        NewAsset::new(
            id,
            "Gir",
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
            "FARMER001",
            "Gujarat, India",
        )
    }

    #[test]
    fn test_register_and_get() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);

        let record = registry.register(cow("COW001")).unwrap();

        assert_eq!(registry.get("COW001").unwrap(), Some(record.clone()));
        assert_eq!(
            record.ownership_history,
            vec![OwnershipEntry::Initial("FARMER001".into())]
        );
        assert!(registry.contains("COW001").unwrap());
    }

    #[test]
    fn test_duplicate_registration_leaves_state_unchanged() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);

        registry.register(cow("COW001")).unwrap();
        let before = registry.get("COW001").unwrap();

        let mut again = cow("COW001");
        again.breed = "Sahiwal".into();
        let result = registry.register(again);

        assert!(matches!(result, Err(RegistryError::DuplicateAsset(id)) if id == "COW001"));
        assert_eq!(registry.get("COW001").unwrap(), before);
        assert_eq!(registry.asset_ids().unwrap(), vec!["COW001"]);
    }

    #[test]
    fn test_transfer_unknown_asset() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);

        let result = registry.transfer("NOPE", "A", "B", 1);
        assert!(matches!(result, Err(RegistryError::AssetNotFound(_))));
    }

    #[test]
    fn test_transfer_audit_trail() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        registry.register(cow("COW001")).unwrap();

        let owners = ["F2", "F3", "F4", "F5"];
        let mut previous = "FARMER001";
        for (i, owner) in owners.iter().enumerate() {
            registry
                .transfer("COW001", previous, owner, 1_000 * (i as u64 + 1))
                .unwrap();
            previous = owner;
        }

        let record = registry.get("COW001").unwrap().unwrap();
        assert_eq!(record.ownership_history.len(), owners.len() + 1);
        assert_eq!(record.ownership_history.last().unwrap().owner(), record.owner_id);
        assert_eq!(record.owner_id, "F5");
    }

    #[test]
    fn test_permissive_policy_ignores_claimed_owner() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        registry.register(cow("COW001")).unwrap();

        let record = registry.transfer("COW001", "SOMEONE", "F2", 10).unwrap();
        assert_eq!(record.owner_id, "F2");
    }

    #[test]
    fn test_strict_policy_checks_owner() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::with_policy(&storage, OwnershipPolicy::Strict);
        registry.register(cow("COW001")).unwrap();

        let result = registry.transfer("COW001", "SOMEONE", "F2", 10);
        assert!(matches!(result, Err(RegistryError::OwnerMismatch { .. })));

        let record = registry.transfer("COW001", "FARMER001", "F2", 10).unwrap();
        assert_eq!(record.owner_id, "F2");
    }

    #[test]
    fn test_health_records_append() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        registry.register(cow("COW001")).unwrap();

        let first = HealthEvent::new(HealthEventKind::Vaccination, "FMD", "VET1");
        let second = HealthEvent::new(HealthEventKind::Checkup, "routine", "VET2");
        registry.add_health_record("COW001", first.clone()).unwrap();
        let record = registry.add_health_record("COW001", second.clone()).unwrap();

        assert_eq!(record.health_records, vec![first, second]);

        let missing = registry.add_health_record(
            "NOPE",
            HealthEvent::new(HealthEventKind::Checkup, "", "VET"),
        );
        assert!(matches!(missing, Err(RegistryError::AssetNotFound(_))));
    }

    #[test]
    fn test_verify_authenticity() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        registry.register(cow("COW001")).unwrap();

        let ok = registry.verify_authenticity("COW001").unwrap();
        assert!(ok.valid);
        assert_eq!(ok.record.unwrap().asset_id, "COW001");

        let missing = registry.verify_authenticity("NOPE").unwrap();
        assert!(!missing.valid);
        assert_eq!(missing.reason, Some(VerificationFailure::NotFound));
        assert_eq!(missing.reason.unwrap().to_string(), "not found");
    }

    #[test]
    fn test_tampered_record_fails_verification() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        let mut record = registry.register(cow("COW001")).unwrap();

        // Write around the registry API.
        record.location = "Elsewhere".into();
        storage.put(Storage::asset_key("COW001"), &record).unwrap();

        let result = registry.verify_authenticity("COW001").unwrap();
        assert!(!result.valid);
        assert!(result.record.is_none());
        assert_eq!(result.reason, Some(VerificationFailure::HashMismatch));
    }

    /// Commit `txs` through a staged write and wrap them in one block.
    fn committed(storage: &Storage, txs: Vec<Transaction>) -> Vec<Block> {
        let mut staged = StagedState::new(storage, OwnershipPolicy::Permissive);
        for tx in &txs {
            staged.apply(tx).unwrap();
        }
        storage.batch(staged.into_batch().unwrap()).unwrap();
        vec![Block::new(1, Hash::ZERO, BlockPayload::Transactions(txs))]
    }

    #[test]
    fn test_chain_history_matches_record() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        let blocks = committed(
            &storage,
            vec![
                Transaction::registration(cow("COW001")),
                Transaction::transfer("COW001", "FARMER001", "FARMER002", 500),
                Transaction::health_record(
                    "COW001",
                    HealthEvent::new(HealthEventKind::Checkup, "ok", "VET1"),
                ),
            ],
        );

        let result = registry.verify_against_chain("COW001", &blocks).unwrap();
        assert!(result.valid);
        assert_eq!(result.record.unwrap().owner_id, "FARMER002");
    }

    #[test]
    fn test_owner_rewrite_caught_by_chain_history() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        let blocks = committed(&storage, vec![Transaction::registration(cow("COW001"))]);

        let mut record = registry.get("COW001").unwrap().unwrap();
        record.owner_id = "THIEF".into();
        record.ownership_history.clear();
        storage.put(Storage::asset_key("COW001"), &record).unwrap();

        // The identity fields are untouched.
        assert!(registry.verify_authenticity("COW001").unwrap().valid);

        let result = registry.verify_against_chain("COW001", &blocks).unwrap();
        assert!(!result.valid);
        assert!(result.record.is_none());
        assert_eq!(result.reason, Some(VerificationFailure::ChainMismatch));
    }

    #[test]
    fn test_record_missing_from_chain() {
        let storage = Storage::open_temporary().unwrap();
        let registry = AssetRegistry::new(&storage);
        registry.register(cow("COW001")).unwrap();

        let result = registry.verify_against_chain("COW001", &[]).unwrap();
        assert_eq!(result.reason, Some(VerificationFailure::ChainMismatch));
    }
}
