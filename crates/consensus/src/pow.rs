//! Proof-of-work block sealing.
//!
//! Work here is a tunable delay for a single-writer ledger, not a defence
//! against adversarial miners. Each extra digit of difficulty multiplies the
//! expected number of attempts by 16.

use herdledger_core::{Block, CancelToken, MiningError, MAX_DIFFICULTY};
use std::time::{Duration, Instant};

/// Proof-of-work configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Required leading zero hex digits.
    pub difficulty: usize,
}

/// Statistics about a completed mining run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningOutcome {
    pub attempts: u64,
    pub elapsed: Duration,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self { difficulty: 2 }
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }

    /// Mine `block` in place, honouring `cancel`.
    pub fn seal(&self, block: &mut Block, cancel: &CancelToken) -> Result<MiningOutcome, MiningError> {
        let started = Instant::now();
        tracing::debug!(index = block.index, difficulty = self.difficulty, "mining block");

        match block.mine(self.difficulty, cancel) {
            Ok(attempts) => {
                let outcome = MiningOutcome {
                    attempts,
                    elapsed: started.elapsed(),
                };
                tracing::debug!(
                    index = block.index,
                    nonce = block.nonce,
                    attempts,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "block mined"
                );
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(index = block.index, error = %err, "mining stopped");
                Err(err)
            }
        }
    }

    /// Check that a block's stored hash meets this difficulty and is genuine.
    pub fn verify(&self, block: &Block) -> bool {
        block.hash.meets_difficulty(self.difficulty) && block.verify_hash()
    }
}
