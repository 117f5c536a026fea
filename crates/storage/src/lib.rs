//! Persistent storage layer for herdledger.
//!
//! This crate provides the storage backend for the ledger:
//! - Block storage (by hash and index) and chain head tracking
//! - The asset registry (cattle records, ownership and health history)
//! - Breeding contracts
//! - Staged write sets that commit a block and its registry effects together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! │              (Ledger, Chain, Certification)              │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                   Storage Layer                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ StagedState │  │ ChainStore  │  │ Storage (DB)    │  │
//! │  │  - Assets   │  │  - Blocks   │  │  - sled wrapper │  │
//! │  │  - Contracts│  │  - Height   │  │  - serialization│  │
//! │  │  - Batch    │  │  - Head     │  │  - key helpers  │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘  │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                    sled Database                         │
//! │              (Embedded Key-Value Store)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use herdledger_core::NewAsset;
//! use herdledger_storage::{AssetRegistry, Storage};
//!
//! let storage = Storage::open("./ledger_data").unwrap();
//! let registry = AssetRegistry::new(&storage);
//!
//! let birth = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
//! registry
//!     .register(NewAsset::new("COW001", "Gir", birth, "FARMER001", "Gujarat"))
//!     .unwrap();
//! assert!(registry.verify_authenticity("COW001").unwrap().valid);
//! ```

pub mod chain;
pub mod contracts;
pub mod db;
pub mod registry;
pub mod state;

// Re-export commonly used types
pub use chain::{BlockSink, ChainStore};
pub use contracts::ContractBook;
pub use db::{BatchOp, Result, Storage, StorageError};
pub use registry::{
    AssetRegistry, OwnershipPolicy, RegistryError, Verification, VerificationFailure,
};
pub use state::{StagedChanges, StagedState};
