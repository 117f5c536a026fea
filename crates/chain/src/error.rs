//! Ledger error taxonomy.

use crate::certificate::CertificateError;
use crate::mempool::MempoolError;
use herdledger_consensus::ValidationError;
use herdledger_core::MiningError;
use herdledger_storage::{RegistryError, StorageError};
use thiserror::Error;

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("asset already registered: {0}")]
    DuplicateAsset(String),

    #[error("contract already exists: {0}")]
    DuplicateContract(String),

    #[error("contract is not active: {0}")]
    ContractNotActive(String),

    #[error("invalid certificate")]
    DecryptionError,

    #[error("chain is empty")]
    EmptyChain,

    #[error("chain already initialized")]
    AlreadyInitialized,

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StorageError),

    #[error("chain validation failed: {0}")]
    ValidationFailure(#[from] ValidationError),

    #[error("mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("asset {asset_id} lists {count} parents (maximum 2)")]
    InvalidLineage { asset_id: String, count: usize },

    #[error("asset {asset_id} is owned by {owner}, not {claimed}")]
    OwnerMismatch {
        asset_id: String,
        owner: String,
        claimed: String,
    },

    #[error("pending pool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub(crate) fn asset_not_found(id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            kind: "asset",
            id: id.into(),
        }
    }

    pub(crate) fn contract_not_found(id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            kind: "contract",
            id: id.into(),
        }
    }
}

impl From<RegistryError> for LedgerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateAsset(id) => LedgerError::DuplicateAsset(id),
            RegistryError::AssetNotFound(id) => LedgerError::asset_not_found(id),
            RegistryError::InvalidLineage { asset_id, count } => {
                LedgerError::InvalidLineage { asset_id, count }
            }
            RegistryError::OwnerMismatch {
                asset_id,
                owner,
                claimed,
            } => LedgerError::OwnerMismatch {
                asset_id,
                owner,
                claimed,
            },
            RegistryError::DuplicateContract(id) => LedgerError::DuplicateContract(id),
            RegistryError::ContractNotFound(id) => LedgerError::contract_not_found(id),
            RegistryError::ContractNotActive(id) => LedgerError::ContractNotActive(id),
            RegistryError::Storage(err) => LedgerError::PersistenceFailure(err),
        }
    }
}

impl From<CertificateError> for LedgerError {
    fn from(err: CertificateError) -> Self {
        match err {
            CertificateError::Decryption => LedgerError::DecryptionError,
            CertificateError::Storage(err) => LedgerError::PersistenceFailure(err),
            other => LedgerError::Certificate(other.to_string()),
        }
    }
}
