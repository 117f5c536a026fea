//! Breeding agreements between two registered animals.

use crate::asset::NewAsset;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a breeding contract.
///
/// There is no expiry: an active contract stays active until executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    Active,
    Completed {
        offspring_id: String,
        completed_at: DateTime<Utc>,
    },
}

/// A breeding agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedingContract {
    pub contract_id: String,
    /// Sire.
    pub party_a: String,
    /// Dam.
    pub party_b: String,
    pub expected_date: NaiveDate,
    pub reward: u64,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
}

impl BreedingContract {
    /// Create an active contract.
    pub fn new(
        contract_id: impl Into<String>,
        party_a: impl Into<String>,
        party_b: impl Into<String>,
        expected_date: NaiveDate,
        reward: u64,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            party_a: party_a.into(),
            party_b: party_b.into(),
            expected_date,
            reward,
            status: ContractStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ContractStatus::Active
    }

    /// Both parents, in sire/dam order.
    pub fn parents(&self) -> Vec<String> {
        vec![self.party_a.clone(), self.party_b.clone()]
    }

    /// Move to the completed state.
    pub fn complete(&mut self, offspring_id: &str, completed_at: DateTime<Utc>) {
        self.status = ContractStatus::Completed {
            offspring_id: offspring_id.to_string(),
            completed_at,
        };
    }
}

/// State change of a contract carried by a `smart_contract` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    Created(BreedingContract),
    /// Completion; the offspring registration lands in the same block.
    Executed {
        contract_id: String,
        offspring: NewAsset,
        completed_at: DateTime<Utc>,
    },
}

impl ContractEvent {
    pub fn contract_id(&self) -> &str {
        match self {
            ContractEvent::Created(contract) => &contract.contract_id,
            ContractEvent::Executed { contract_id, .. } => contract_id,
        }
    }
}
