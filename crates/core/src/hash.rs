//! SHA-256 hashing utilities for the ledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A named alias for a 32-byte(u8) array, used to represent a 256-bit digest.
pub type H256 = [u8; 32];

/// A wrapper type for H256 with Display and Debug formatting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub H256);

impl Hash {
    /// The zero hash (all zeros).
    ///
    /// Used as the genesis `previous_hash` and as the empty merkle root.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &H256 {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Number of leading zero hex digits.
    pub fn leading_zero_digits(&self) -> usize {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    /// Check the proof-of-work target: at least `difficulty` leading zero hex digits.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.leading_zero_digits() >= difficulty
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<H256> for Hash {
    fn from(bytes: H256) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for H256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash arbitrary data using SHA-256.
pub fn hash(data: &[u8]) -> Hash {
    Hash(Sha256::digest(data).into())
}

/// Hash multiple pieces of data by concatenating them.
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

/// Hash the bincode encoding of a serializable value.
pub fn hash_serialized<T: Serialize + ?Sized>(value: &T) -> Hash {
    let encoded = bincode::serialize(value).expect("serialization should not fail");
    hash(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        let h1 = hash(data);
        let h2 = hash(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_is_sha256() {
        // Well-known digest of the empty string.
        assert_eq!(
            hash(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_different_inputs() {
        let h1 = hash(b"hello");
        let h2 = hash(b"world");
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = hash(b"test data");
        let parsed = Hash::from_hex(&h.to_string()).unwrap();
        assert_eq!(h, parsed);
        assert!(Hash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_hash_display() {
        let h = hash(b"test");
        let display = format!("{}", h);
        assert!(display.starts_with("0x"));
        assert_eq!(display.len(), 66); // "0x" + 64 hex chars
    }

    #[test]
    fn test_hash_concat() {
        let h1 = hash_concat(&[b"hello", b"world"]);
        let h2 = hash(b"helloworld");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_leading_zero_digits() {
        assert_eq!(Hash::ZERO.leading_zero_digits(), 64);

        let mut bytes = [0xffu8; 32];
        assert_eq!(Hash(bytes).leading_zero_digits(), 0);

        bytes[0] = 0x0f;
        assert_eq!(Hash(bytes).leading_zero_digits(), 1);

        bytes[0] = 0x00;
        bytes[1] = 0x1f;
        assert_eq!(Hash(bytes).leading_zero_digits(), 3);
        assert!(Hash(bytes).meets_difficulty(3));
        assert!(!Hash(bytes).meets_difficulty(4));
        assert!(Hash(bytes).meets_difficulty(0));
    }
}
