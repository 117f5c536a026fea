//! Ledger transactions with typed payloads.

use crate::asset::{HealthEvent, NewAsset};
use crate::contract::{BreedingContract, ContractEvent};
use crate::hash::{hash_serialized, Hash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender used for transactions the ledger itself originates.
pub const SYSTEM_ACCOUNT: &str = "system";

/// Transaction category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionKind {
    Registration,
    Transfer,
    HealthRecord,
    MiningReward,
    SmartContract,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Registration => "registration",
            TransactionKind::Transfer => "transfer",
            TransactionKind::HealthRecord => "health_record",
            TransactionKind::MiningReward => "mining_reward",
            TransactionKind::SmartContract => "smart_contract",
        };
        f.write_str(name)
    }
}

/// Ownership change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransfer {
    pub asset_id: String,
    pub from_owner: String,
    pub to_owner: String,
    pub price: u64,
}

/// Health event addressed to one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthUpdate {
    pub asset_id: String,
    pub event: HealthEvent,
}

/// Payload, one variant per transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPayload {
    Registration(NewAsset),
    Transfer(OwnershipTransfer),
    HealthRecord(HealthUpdate),
    MiningReward,
    SmartContract(ContractEvent),
}

impl TxPayload {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TxPayload::Registration(_) => TransactionKind::Registration,
            TxPayload::Transfer(_) => TransactionKind::Transfer,
            TxPayload::HealthRecord(_) => TransactionKind::HealthRecord,
            TxPayload::MiningReward => TransactionKind::MiningReward,
            TxPayload::SmartContract(_) => TransactionKind::SmartContract,
        }
    }
}

/// A transaction on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Hash of (from, to, amount, timestamp, payload).
    pub id: Hash,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub payload: TxPayload,
    pub timestamp: DateTime<Utc>,
}

/// Fields covered by the transaction id.
#[derive(Serialize)]
struct TransactionPreimage<'a> {
    from: &'a str,
    to: &'a str,
    amount: u64,
    timestamp: &'a DateTime<Utc>,
    payload: &'a TxPayload,
}

impl Transaction {
    /// Create a transaction stamped with the current time.
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u64, payload: TxPayload) -> Self {
        Self::at(from, to, amount, payload, Utc::now())
    }

    /// Create a transaction with an explicit timestamp.
    pub fn at(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: u64,
        payload: TxPayload,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut tx = Self {
            id: Hash::ZERO,
            from: from.into(),
            to: to.into(),
            amount,
            payload,
            timestamp,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Register a new asset.
    pub fn registration(asset: NewAsset) -> Self {
        let to = asset.asset_id.clone();
        Self::new(SYSTEM_ACCOUNT, to, 0, TxPayload::Registration(asset))
    }

    /// Transfer an asset between owners; the price is the amount.
    pub fn transfer(asset_id: &str, from_owner: &str, to_owner: &str, price: u64) -> Self {
        Self::new(
            from_owner,
            to_owner,
            price,
            TxPayload::Transfer(OwnershipTransfer {
                asset_id: asset_id.to_string(),
                from_owner: from_owner.to_string(),
                to_owner: to_owner.to_string(),
                price,
            }),
        )
    }

    /// Append a health event, sent by the examining veterinarian.
    pub fn health_record(asset_id: &str, event: HealthEvent) -> Self {
        let from = event.veterinarian.clone();
        Self::new(
            from,
            asset_id,
            0,
            TxPayload::HealthRecord(HealthUpdate {
                asset_id: asset_id.to_string(),
                event,
            }),
        )
    }

    /// Reward paid to the miner of a block.
    pub fn mining_reward(target: &str, amount: u64) -> Self {
        Self::new(SYSTEM_ACCOUNT, target, amount, TxPayload::MiningReward)
    }

    /// Open a breeding contract.
    pub fn contract_created(contract: BreedingContract) -> Self {
        let to = contract.contract_id.clone();
        Self::new(
            SYSTEM_ACCOUNT,
            to,
            0,
            TxPayload::SmartContract(ContractEvent::Created(contract)),
        )
    }

    /// Complete a breeding contract, registering the offspring.
    pub fn contract_executed(contract_id: &str, offspring: NewAsset, reward: u64) -> Self {
        Self::new(
            SYSTEM_ACCOUNT,
            contract_id,
            reward,
            TxPayload::SmartContract(ContractEvent::Executed {
                contract_id: contract_id.to_string(),
                offspring,
                completed_at: Utc::now(),
            }),
        )
    }

    pub fn kind(&self) -> TransactionKind {
        self.payload.kind()
    }

    /// Recompute the id from the transaction fields.
    pub fn compute_id(&self) -> Hash {
        hash_serialized(&TransactionPreimage {
            from: &self.from,
            to: &self.to,
            amount: self.amount,
            timestamp: &self.timestamp,
            payload: &self.payload,
        })
    }

    /// Hash of the full transaction; used as the merkle leaf.
    pub fn hash(&self) -> Hash {
        hash_serialized(self)
    }
}
