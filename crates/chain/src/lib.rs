//! Ledger orchestration for herdledger.
//!
//! This crate brings the lower layers together into a usable ledger:
//! - **Mempool**: submission-ordered pool of pending transactions
//! - **Chain**: the in-memory block log, sealed with proof of work
//! - **Certificates**: AES-256-GCM sealed, QR-renderable asset certificates
//! - **Ledger**: the thread-safe facade over all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use herdledger_chain::{Ledger, LedgerConfig};
//! use herdledger_core::NewAsset;
//!
//! let ledger = Ledger::open("./herd_data", LedgerConfig::default()).unwrap();
//!
//! let birth = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
//! ledger
//!     .register_asset(NewAsset::new("COW001", "Gir", birth, "FARMER001", "Gujarat, India"))
//!     .unwrap();
//! ledger.transfer_ownership("COW001", "FARMER001", "FARMER002", 50_000).unwrap();
//!
//! // Nothing is in the registry until a block is mined.
//! ledger.mine_block("miner").unwrap();
//! assert!(ledger.verify_asset("COW001").unwrap().valid);
//! ```

pub mod blockchain;
pub mod certificate;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mempool;

// Re-export commonly used types
pub use blockchain::Chain;
pub use certificate::{
    Certificate, CertificateError, CertificatePayload, CertificateVerification,
    CertificationService,
};
pub use config::{KeyPolicy, LedgerConfig};
pub use error::{LedgerError, Result};
pub use ledger::{ChainStatus, Ledger, MIXED_BREED};
pub use mempool::{Mempool, MempoolConfig, MempoolError, MempoolStats};
pub use herdledger_storage::{OwnershipPolicy, Verification, VerificationFailure};
