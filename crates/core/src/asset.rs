//! Cattle asset records kept by the registry.

use crate::hash::{hash_serialized, Hash};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of recorded parents (sire and dam).
pub const MAX_PARENTS: usize = 2;

/// Registration request for a new asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsset {
    pub asset_id: String,
    pub breed: String,
    pub birth_date: NaiveDate,
    pub owner_id: String,
    pub location: String,
    /// Lineage: zero, one or two previously registered asset ids.
    pub parent_ids: Vec<String>,
}

impl NewAsset {
    /// Create a registration request without lineage.
    pub fn new(
        asset_id: impl Into<String>,
        breed: impl Into<String>,
        birth_date: NaiveDate,
        owner_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            breed: breed.into(),
            birth_date,
            owner_id: owner_id.into(),
            location: location.into(),
            parent_ids: Vec::new(),
        }
    }

    /// Attach lineage.
    pub fn with_parents(mut self, parent_ids: Vec<String>) -> Self {
        self.parent_ids = parent_ids;
        self
    }

    /// Whether the lineage fits the sire/dam limit.
    pub fn has_valid_lineage(&self) -> bool {
        self.parent_ids.len() <= MAX_PARENTS
    }

    /// Content hash over the identity fields.
    pub fn identity_hash(&self) -> Hash {
        identity_hash(
            &self.asset_id,
            &self.breed,
            &self.birth_date,
            &self.location,
            &self.parent_ids,
        )
    }
}

/// Fields covered by the certification hash.
///
/// The owner is not part of the identity: it changes on every transfer.
#[derive(Serialize)]
struct AssetIdentity<'a> {
    asset_id: &'a str,
    breed: &'a str,
    birth_date: &'a NaiveDate,
    location: &'a str,
    parent_ids: &'a [String],
}

fn identity_hash(
    asset_id: &str,
    breed: &str,
    birth_date: &NaiveDate,
    location: &str,
    parent_ids: &[String],
) -> Hash {
    hash_serialized(&AssetIdentity {
        asset_id,
        breed,
        birth_date,
        location,
        parent_ids,
    })
}

/// One entry of an asset's ownership audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipEntry {
    /// The owner recorded at registration.
    Initial(String),
    /// A completed transfer.
    Transfer {
        owner: String,
        date: DateTime<Utc>,
        price: u64,
    },
}

impl OwnershipEntry {
    /// The owner this entry assigns the asset to.
    pub fn owner(&self) -> &str {
        match self {
            OwnershipEntry::Initial(owner) => owner,
            OwnershipEntry::Transfer { owner, .. } => owner,
        }
    }
}

/// Category of a health event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthEventKind {
    Vaccination,
    Treatment,
    Checkup,
    Other(String),
}

impl fmt::Display for HealthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthEventKind::Vaccination => write!(f, "vaccination"),
            HealthEventKind::Treatment => write!(f, "treatment"),
            HealthEventKind::Checkup => write!(f, "checkup"),
            HealthEventKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

impl FromStr for HealthEventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "vaccination" => HealthEventKind::Vaccination,
            "treatment" => HealthEventKind::Treatment,
            "checkup" => HealthEventKind::Checkup,
            _ => HealthEventKind::Other(s.to_string()),
        })
    }
}

/// A veterinary event appended to an asset's health history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub kind: HealthEventKind,
    pub description: String,
    pub veterinarian: String,
    pub recorded_at: DateTime<Utc>,
}

impl HealthEvent {
    /// Create a health event stamped with the current time.
    pub fn new(
        kind: HealthEventKind,
        description: impl Into<String>,
        veterinarian: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            veterinarian: veterinarian.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// A registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: String,
    pub breed: String,
    pub birth_date: NaiveDate,
    pub owner_id: String,
    pub location: String,
    pub parent_ids: Vec<String>,
    pub health_records: Vec<HealthEvent>,
    pub ownership_history: Vec<OwnershipEntry>,
    pub certification_hash: Hash,
}

impl AssetRecord {
    /// Build the initial record for a registration.
    pub fn register(new: NewAsset) -> Self {
        let certification_hash = new.identity_hash();
        Self {
            ownership_history: vec![OwnershipEntry::Initial(new.owner_id.clone())],
            asset_id: new.asset_id,
            breed: new.breed,
            birth_date: new.birth_date,
            owner_id: new.owner_id,
            location: new.location,
            parent_ids: new.parent_ids,
            health_records: Vec::new(),
            certification_hash,
        }
    }

    /// Recompute the identity hash from the stored fields.
    pub fn identity_hash(&self) -> Hash {
        identity_hash(
            &self.asset_id,
            &self.breed,
            &self.birth_date,
            &self.location,
            &self.parent_ids,
        )
    }

    /// Whether the stored certification hash still matches the identity fields.
    pub fn is_authentic(&self) -> bool {
        self.identity_hash() == self.certification_hash
    }

    /// Record a change of owner.
    pub fn record_transfer(&mut self, to_owner: &str, date: DateTime<Utc>, price: u64) {
        self.ownership_history.push(OwnershipEntry::Transfer {
            owner: to_owner.to_string(),
            date,
            price,
        });
        self.owner_id = to_owner.to_string();
    }

    /// Append a health event.
    pub fn record_health(&mut self, event: HealthEvent) {
        self.health_records.push(event);
    }
}
