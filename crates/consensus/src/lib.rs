//! Proof-of-work sealing and chain validation for herdledger.
//!
//! This crate provides:
//! - Proof-of-work block sealing with cooperative cancellation
//! - Block validation (hash recomputation, merkle roots, transaction ids)
//! - Chain validation (hash links from genesis to head)
//!
//! # Example
//!
//! ```rust,no_run
//! use herdledger_consensus::{ChainValidator, ProofOfWork};
//! use herdledger_core::{Block, CancelToken};
//!
//! let pow = ProofOfWork::new(3);
//! let mut genesis = Block::genesis();
//! pow.seal(&mut genesis, &CancelToken::new()).unwrap();
//!
//! assert!(pow.verify(&genesis));
//! assert!(ChainValidator::is_valid(&[genesis]));
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{MiningOutcome, ProofOfWork};
pub use validator::{BlockValidator, ChainValidator, ValidationError};
