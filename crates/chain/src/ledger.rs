//! The ledger facade.
//!
//! All mutating calls queue a transaction; nothing reaches the registry until
//! [`Ledger::mine_block`] seals the pending pool into a block. The effects of
//! the pending pool are kept staged in memory and each submission is applied
//! on top of them, so a pool that was accepted can always be mined.
//!
//! Asset checks compare the stored record with both its certification hash
//! and the record the chain's transactions produce.

use crate::blockchain::Chain;
use crate::certificate::{
    Certificate, CertificateError, CertificateKey, CertificateVerification, CertificationService,
};
use crate::config::{KeyPolicy, LedgerConfig};
use crate::error::{LedgerError, Result};
use crate::mempool::{Mempool, MempoolConfig, MempoolStats};
use chrono::{NaiveDate, Utc};
use herdledger_consensus::ProofOfWork;
use herdledger_core::{
    AssetRecord, Block, BreedingContract, CancelToken, Hash, HealthEvent, NewAsset, Transaction,
};
use herdledger_storage::{
    AssetRegistry, ChainStore, ContractBook, StagedChanges, StagedState, Storage, StorageError,
    Verification,
};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

const CERTIFICATE_KEY: &[u8] = b"meta:certificate_key";

/// Breed given to offspring whose parents differ or are unregistered.
pub const MIXED_BREED: &str = "Mixed";

struct LedgerState {
    chain: Chain,
    pending: Mempool,
    /// Registry and contract effects of `pending`.
    staged: StagedChanges,
}

/// Summary returned by [`Ledger::chain_status`].
#[derive(Debug, Clone)]
pub struct ChainStatus {
    pub length: usize,
    pub pending_count: usize,
    pub is_valid: bool,
    pub latest_hash: Hash,
    pub difficulty: usize,
    pub pending: MempoolStats,
}

/// A persistent cattle ledger.
pub struct Ledger {
    storage: Storage,
    config: LedgerConfig,
    certification: CertificationService,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Open or create a ledger under `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: LedgerConfig) -> Result<Self> {
        Self::with_storage(Storage::open(path)?, config)
    }

    /// Ledger backed by a throwaway database.
    pub fn open_temporary(config: LedgerConfig) -> Result<Self> {
        Self::with_storage(Storage::open_temporary()?, config)
    }

    /// Load the chain from `storage`, mining a genesis block if it is empty.
    pub fn with_storage(storage: Storage, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let pow = ProofOfWork::new(config.difficulty);
        let store = ChainStore::new(&storage);

        let blocks = store.load_chain()?;
        let chain = if blocks.is_empty() {
            let mut chain = Chain::new(pow);
            chain.init(&store, &CancelToken::new())?;
            chain
        } else {
            info!(length = blocks.len(), "chain loaded");
            let chain = Chain::restore(blocks, pow);
            if let Err(err) = chain.validate() {
                warn!(error = %err, "stored chain failed validation");
            }
            chain
        };

        let certification = match config.certificate_keys {
            KeyPolicy::Ephemeral => CertificationService::new(),
            KeyPolicy::Persisted => CertificationService::with_key(load_or_create_key(&storage)?),
        };

        let pending = Mempool::with_config(MempoolConfig {
            max_transactions: config.max_pending,
        });

        Ok(Self {
            storage,
            config,
            certification,
            state: RwLock::new(LedgerState {
                chain,
                pending,
                staged: StagedChanges::default(),
            }),
        })
    }

    /// Flush and drop. Pending transactions are not persisted.
    pub fn close(self) -> Result<()> {
        let pending = self.read()?.pending.len();
        if pending > 0 {
            warn!(pending, "closing ledger with unmined transactions");
        }
        self.storage.flush()?;
        Ok(())
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Direct access to the underlying store.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.state.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.state.write().map_err(|_| LedgerError::LockPoisoned)
    }

    fn registry(&self) -> AssetRegistry<'_> {
        AssetRegistry::with_policy(&self.storage, self.config.ownership_policy)
    }

    /// Run `f` against the stored state with `changes` staged on top.
    fn with_staged<T>(
        &self,
        changes: &mut StagedChanges,
        f: impl FnOnce(&mut StagedState<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut staged = StagedState::resume(
            &self.storage,
            self.config.ownership_policy,
            std::mem::take(changes),
        );
        let result = f(&mut staged);
        *changes = staged.into_changes();
        result
    }

    fn submit(&self, tx: Transaction) -> Result<Hash> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        self.with_staged(&mut state.staged, |staged| {
            state.pending.check(&tx)?;
            Ok(staged.apply(&tx)?)
        })?;
        self.queue(state, tx)
    }

    fn queue(&self, state: &mut LedgerState, tx: Transaction) -> Result<Hash> {
        let id = tx.id;
        let kind = tx.kind();
        state.pending.add(tx)?;
        info!(%kind, %id, pending = state.pending.len(), "transaction queued");
        Ok(id)
    }

    // =========================================================================
    // Submissions
    // =========================================================================

    /// Queue a registration.
    pub fn register_asset(&self, asset: NewAsset) -> Result<Hash> {
        self.submit(Transaction::registration(asset))
    }

    /// Queue an ownership transfer.
    pub fn transfer_ownership(
        &self,
        asset_id: &str,
        from_owner: &str,
        to_owner: &str,
        price: u64,
    ) -> Result<Hash> {
        self.submit(Transaction::transfer(asset_id, from_owner, to_owner, price))
    }

    /// Queue a health event. The veterinarian is the sender.
    pub fn add_health_record(&self, asset_id: &str, event: HealthEvent) -> Result<Hash> {
        self.submit(Transaction::health_record(asset_id, event))
    }

    /// Queue a new breeding contract between `party_a` (sire) and `party_b` (dam).
    pub fn create_contract(
        &self,
        contract_id: &str,
        party_a: &str,
        party_b: &str,
        expected_date: NaiveDate,
        reward: u64,
    ) -> Result<Hash> {
        let contract = BreedingContract::new(contract_id, party_a, party_b, expected_date, reward);
        self.submit(Transaction::contract_created(contract))
    }

    /// Queue execution of an active contract, registering `offspring_id`.
    ///
    /// Returns `Ok(false)` if the contract exists but is already completed,
    /// counting completions still waiting in the pending pool.
    pub fn execute_contract(&self, contract_id: &str, offspring_id: &str) -> Result<bool> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let tx = self.with_staged(&mut state.staged, |staged| {
            let contract = staged
                .contract(contract_id)?
                .ok_or_else(|| LedgerError::contract_not_found(contract_id))?;
            if !contract.is_active() {
                info!(contract_id, "contract already executed");
                return Ok(None);
            }

            let offspring = self.offspring_for(staged, &contract, offspring_id)?;
            let tx = Transaction::contract_executed(contract_id, offspring, contract.reward);
            state.pending.check(&tx)?;
            staged.apply(&tx)?;
            Ok(Some(tx))
        })?;

        match tx {
            Some(tx) => {
                self.queue(state, tx)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Offspring of a contract: shared parent breed or mixed, owned and
    /// located with the dam when she is registered.
    fn offspring_for(
        &self,
        staged: &StagedState<'_>,
        contract: &BreedingContract,
        offspring_id: &str,
    ) -> Result<NewAsset> {
        let sire = staged.asset(&contract.party_a)?;
        let dam = staged.asset(&contract.party_b)?;

        let breed = match (&sire, &dam) {
            (Some(sire), Some(dam)) if sire.breed == dam.breed => sire.breed.clone(),
            _ => MIXED_BREED.to_string(),
        };
        let (owner, location) = match dam {
            Some(dam) => (dam.owner_id, dam.location),
            None => (
                self.config.offspring_owner.clone(),
                self.config.offspring_location.clone(),
            ),
        };

        Ok(
            NewAsset::new(offspring_id, breed, Utc::now().date_naive(), owner, location)
                .with_parents(contract.parents()),
        )
    }

    // =========================================================================
    // Mining
    // =========================================================================

    /// Seal all pending transactions into a new block, paying `reward_target`.
    pub fn mine_block(&self, reward_target: &str) -> Result<Block> {
        self.mine_block_with(reward_target, &CancelToken::new())
    }

    /// [`Ledger::mine_block`] with cancellation.
    ///
    /// On cancellation or storage failure the pending pool, the chain and
    /// the registry are all left as they were.
    pub fn mine_block_with(&self, reward_target: &str, cancel: &CancelToken) -> Result<Block> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let pending = state.pending.transactions().to_vec();
        let registry_ops = state.staged.to_batch()?;

        let reward = Transaction::mining_reward(reward_target, self.config.mining_reward);
        let store = ChainStore::new(&self.storage);
        let block = state
            .chain
            .append_pending(&store, pending, reward, registry_ops, cancel)?
            .clone();

        state.pending.clear();
        state.staged = StagedChanges::default();
        info!(
            index = block.index,
            hash = %block.hash,
            reward_target,
            "block mined"
        );
        Ok(block)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check the stored record against its certification hash and the chain.
    pub fn verify_asset(&self, asset_id: &str) -> Result<Verification> {
        let state = self.read()?;
        Ok(self.authenticate(&state, asset_id)?)
    }

    fn authenticate(
        &self,
        state: &LedgerState,
        asset_id: &str,
    ) -> std::result::Result<Verification, StorageError> {
        self.registry()
            .verify_against_chain(asset_id, state.chain.blocks())
    }

    pub fn asset(&self, asset_id: &str) -> Result<Option<AssetRecord>> {
        Ok(self.registry().get(asset_id)?)
    }

    pub fn asset_ids(&self) -> Result<Vec<String>> {
        Ok(self.registry().asset_ids()?)
    }

    pub fn contract(&self, contract_id: &str) -> Result<Option<BreedingContract>> {
        Ok(ContractBook::new(&self.storage).get(contract_id)?)
    }

    pub fn contract_ids(&self) -> Result<Vec<String>> {
        Ok(ContractBook::new(&self.storage).contract_ids()?)
    }

    pub fn chain_status(&self) -> Result<ChainStatus> {
        let state = self.read()?;
        Ok(ChainStatus {
            length: state.chain.len(),
            pending_count: state.pending.len(),
            is_valid: state.chain.is_valid(),
            latest_hash: state.chain.latest()?.hash,
            difficulty: state.chain.pow().difficulty,
            pending: state.pending.stats(),
        })
    }

    /// Full chain validation with the first violation reported.
    pub fn validate_chain(&self) -> Result<()> {
        self.read()?.chain.validate()
    }

    pub fn latest_block(&self) -> Result<Block> {
        Ok(self.read()?.chain.latest()?.clone())
    }

    pub fn block(&self, index: u64) -> Result<Option<Block>> {
        Ok(self.read()?.chain.get(index).cloned())
    }

    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self.read()?.chain.blocks().to_vec())
    }

    pub fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.read()?.pending.transactions().to_vec())
    }

    // =========================================================================
    // Certificates
    // =========================================================================

    /// Issue a certificate for an asset that passes [`Ledger::verify_asset`].
    ///
    /// `None` means the asset cannot be certified: it is unknown, or its
    /// record has been altered outside the ledger.
    pub fn issue_certificate(&self, asset_id: &str) -> Result<Option<Certificate>> {
        let verification = self.verify_asset(asset_id)?;
        if let Some(reason) = verification.reason {
            warn!(asset_id, %reason, "asset cannot be certified");
        }
        Ok(self.certification.issue(verification)?)
    }

    /// Check a certificate. A blob that cannot be opened yields an invalid
    /// result rather than an error.
    pub fn verify_certificate(&self, certificate: &str) -> Result<CertificateVerification> {
        let state = self.read()?;
        let result = self
            .certification
            .verify(certificate, |asset_id| self.authenticate(&state, asset_id));
        match result {
            Ok(result) => {
                if !result.valid {
                    warn!(reason = ?result.reason, "certificate rejected");
                }
                Ok(result)
            }
            Err(CertificateError::Decryption) => {
                warn!("certificate could not be opened");
                Ok(CertificateVerification::rejected(
                    LedgerError::DecryptionError.to_string(),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn load_or_create_key(storage: &Storage) -> Result<CertificateKey> {
    if let Some(key) = storage.get::<_, CertificateKey>(CERTIFICATE_KEY)? {
        return Ok(key);
    }
    let key = crate::certificate::generate_key();
    storage.put(CERTIFICATE_KEY, &key)?;
    info!("certificate key created");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdledger_core::{HealthEventKind, OwnershipEntry};
    use herdledger_storage::OwnershipPolicy;

    fn config() -> LedgerConfig {
        LedgerConfig {
            difficulty: 1,
            ..LedgerConfig::default()
        }
    }

    fn cow(id: &str, breed: &str, owner: &str) -> NewAsset {
        NewAsset::new(
            id,
            breed,
            NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(),
            owner,
            "Punjab, India",
        )
    }

    #[test]
    fn test_new_ledger_has_mined_genesis() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        let status = ledger.chain_status().unwrap();

        assert_eq!(status.length, 1);
        assert_eq!(status.pending_count, 0);
        assert!(status.is_valid);
        assert!(ledger.latest_block().unwrap().is_genesis());
    }

    #[test]
    fn test_registration_visible_after_mining() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();

        assert!(ledger.asset("COW001").unwrap().is_none());
        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);

        let block = ledger.mine_block("miner").unwrap();
        assert_eq!(block.tx_count(), 2);
        assert!(ledger.asset("COW001").unwrap().is_some());
        assert!(ledger.pending_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_pending_duplicate_rejected() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();

        let result = ledger.register_asset(cow("COW001", "Sahiwal", "F2"));
        assert!(matches!(result, Err(LedgerError::DuplicateAsset(id)) if id == "COW001"));
        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_full_pool_rejection_stages_nothing() {
        let ledger = Ledger::open_temporary(LedgerConfig {
            max_pending: 1,
            ..config()
        })
        .unwrap();
        ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();

        assert!(matches!(
            ledger.register_asset(cow("COW002", "Gir", "F1")),
            Err(LedgerError::Mempool(_))
        ));
        ledger.mine_block("miner").unwrap();
        assert!(ledger.asset("COW002").unwrap().is_none());

        // The staged view was reset with the pool.
        ledger.register_asset(cow("COW002", "Gir", "F1")).unwrap();
        ledger.mine_block("miner").unwrap();
        assert_eq!(ledger.asset_ids().unwrap(), vec!["COW001", "COW002"]);
    }

    #[test]
    fn test_failed_submission_keeps_earlier_staged_effects() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();
        assert!(ledger.transfer_ownership("NOPE", "F1", "F2", 1).is_err());
        ledger.transfer_ownership("COW001", "F1", "F2", 1).unwrap();
        ledger.mine_block("miner").unwrap();

        assert_eq!(ledger.asset("COW001").unwrap().unwrap().owner_id, "F2");
        assert!(ledger.verify_asset("COW001").unwrap().valid);
    }

    #[test]
    fn test_transfer_of_pending_registration() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();
        ledger.transfer_ownership("COW001", "F1", "F2", 100).unwrap();
        ledger.mine_block("miner").unwrap();

        let record = ledger.asset("COW001").unwrap().unwrap();
        assert_eq!(record.owner_id, "F2");
        assert_eq!(record.ownership_history[0], OwnershipEntry::Initial("F1".into()));
    }

    #[test]
    fn test_unknown_asset_operations() {
        let ledger = Ledger::open_temporary(config()).unwrap();

        assert!(matches!(
            ledger.transfer_ownership("NOPE", "A", "B", 1),
            Err(LedgerError::NotFound { kind: "asset", .. })
        ));
        assert!(matches!(
            ledger.add_health_record("NOPE", HealthEvent::new(HealthEventKind::Checkup, "", "V")),
            Err(LedgerError::NotFound { kind: "asset", .. })
        ));
        assert!(ledger.pending_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_strict_policy() {
        let ledger = Ledger::open_temporary(LedgerConfig {
            ownership_policy: OwnershipPolicy::Strict,
            ..config()
        })
        .unwrap();
        ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();

        assert!(matches!(
            ledger.transfer_ownership("COW001", "F9", "F2", 1),
            Err(LedgerError::OwnerMismatch { .. })
        ));
        ledger.transfer_ownership("COW001", "F1", "F2", 1).unwrap();
    }

    #[test]
    fn test_contract_offspring_inherits_from_parents() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        ledger.register_asset(cow("BULL01", "Gir", "F1")).unwrap();
        ledger.register_asset(cow("COW001", "Gir", "F2")).unwrap();
        ledger
            .create_contract(
                "BRD001",
                "BULL01",
                "COW001",
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                500,
            )
            .unwrap();
        assert!(ledger.execute_contract("BRD001", "CALF01").unwrap());
        assert!(!ledger.execute_contract("BRD001", "CALF02").unwrap());
        ledger.mine_block("miner").unwrap();

        let calf = ledger.asset("CALF01").unwrap().unwrap();
        assert_eq!(calf.breed, "Gir");
        assert_eq!(calf.owner_id, "F2");
        assert_eq!(calf.parent_ids, vec!["BULL01", "COW001"]);
        assert!(!ledger.contract("BRD001").unwrap().unwrap().is_active());
        assert!(ledger.asset("CALF02").unwrap().is_none());
    }

    #[test]
    fn test_contract_with_unregistered_parents() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        ledger
            .create_contract("BRD002", "X", "Y", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 0)
            .unwrap();
        assert!(ledger.execute_contract("BRD002", "CALF09").unwrap());
        ledger.mine_block("miner").unwrap();

        let calf = ledger.asset("CALF09").unwrap().unwrap();
        assert_eq!(calf.breed, MIXED_BREED);
        assert_eq!(calf.owner_id, "farm_owner");
        assert_eq!(calf.location, "Smart Farm");
    }

    #[test]
    fn test_execute_missing_contract() {
        let ledger = Ledger::open_temporary(config()).unwrap();
        assert!(matches!(
            ledger.execute_contract("NOPE", "CALF01"),
            Err(LedgerError::NotFound { kind: "contract", .. })
        ));
    }

    #[test]
    fn test_persisted_key_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig {
            certificate_keys: KeyPolicy::Persisted,
            ..config()
        };

        let certificate = {
            let ledger = Ledger::open(dir.path(), config.clone()).unwrap();
            ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();
            ledger.mine_block("miner").unwrap();
            let cert = ledger.issue_certificate("COW001").unwrap().unwrap();
            ledger.close().unwrap();
            cert.certificate
        };

        let ledger = Ledger::open(dir.path(), config).unwrap();
        assert!(ledger.verify_certificate(&certificate).unwrap().valid);
    }

    #[test]
    fn test_ephemeral_key_does_not_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let certificate = {
            let ledger = Ledger::open(dir.path(), config()).unwrap();
            ledger.register_asset(cow("COW001", "Gir", "F1")).unwrap();
            ledger.mine_block("miner").unwrap();
            let cert = ledger.issue_certificate("COW001").unwrap().unwrap();
            ledger.close().unwrap();
            cert.certificate
        };

        let ledger = Ledger::open(dir.path(), config()).unwrap();
        let result = ledger.verify_certificate(&certificate).unwrap();
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("invalid certificate"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Ledger::open_temporary(LedgerConfig {
            max_pending: 0,
            ..config()
        });
        assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
    }
}
