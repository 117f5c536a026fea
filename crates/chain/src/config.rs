//! Ledger configuration.

use crate::error::{LedgerError, Result};
use herdledger_core::MAX_DIFFICULTY;
use herdledger_storage::OwnershipPolicy;
use serde::{Deserialize, Serialize};

/// Where the certificate encryption key lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Fresh key per process; certificates die with the process.
    #[default]
    Ephemeral,
    /// Key stored in the ledger database and reused on reopen.
    Persisted,
}

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Proof-of-work difficulty in leading zero hex digits.
    pub difficulty: usize,
    /// Amount of the reward transaction added to every mined block.
    pub mining_reward: u64,
    /// Maximum number of pending transactions.
    pub max_pending: usize,
    pub ownership_policy: OwnershipPolicy,
    pub certificate_keys: KeyPolicy,
    /// Owner of contract offspring whose dam is not registered.
    pub offspring_owner: String,
    /// Location of contract offspring whose dam is not registered.
    pub offspring_location: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            mining_reward: 10,
            max_pending: 10_000,
            ownership_policy: OwnershipPolicy::Permissive,
            certificate_keys: KeyPolicy::Ephemeral,
            offspring_owner: "farm_owner".to_string(),
            offspring_location: "Smart Farm".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Check the values before a ledger is built from them.
    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty {} exceeds maximum {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.max_pending == 0 {
            return Err(LedgerError::InvalidConfig(
                "max_pending must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LedgerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_unreachable_difficulty() {
        let config = LedgerConfig {
            difficulty: MAX_DIFFICULTY + 1,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{ "difficulty": 4, "certificate_keys": "persisted" }"#).unwrap();

        assert_eq!(config.difficulty, 4);
        assert_eq!(config.certificate_keys, KeyPolicy::Persisted);
        assert_eq!(config.mining_reward, 10);
        assert_eq!(config.ownership_policy, OwnershipPolicy::Permissive);
    }
}
