//! Encrypted, QR-renderable asset certificates.
//!
//! A certificate is a JSON payload sealed with AES-256-GCM and encoded as
//! standard base64. The sealed bytes are `nonce (12) || ciphertext || tag`.
//! Only the key holder can open a certificate; anyone with the ledger and
//! the key can check that the asset behind it is still authentic.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use herdledger_core::hash_concat;
use herdledger_storage::{StorageError, Verification};
use qrcode::QrCode;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// AES-256 key.
pub type CertificateKey = [u8; 32];

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
const ID_SALT_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum CertificateError {
    /// Covers bad base64, truncation, wrong key and malformed JSON alike.
    #[error("invalid certificate")]
    Decryption,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("qr rendering failed: {0}")]
    QrCode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, CertificateError>;

/// The sealed content of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePayload {
    pub certificate_id: String,
    pub asset_id: String,
    pub breed: String,
    /// Owner at the time of issue.
    pub owner_id: String,
    pub issued_at: DateTime<Utc>,
    /// Certification hash of the record when issued, hex encoded.
    pub registry_hash: String,
}

/// An issued certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub certificate_id: String,
    /// Base64 ciphertext; the value handed to `verify`.
    pub certificate: String,
    /// Text-mode QR code of the plaintext payload.
    pub qr_code: String,
    pub payload: CertificatePayload,
}

/// Result of checking a certificate.
#[derive(Debug, Clone)]
pub struct CertificateVerification {
    pub valid: bool,
    pub payload: Option<CertificatePayload>,
    pub chain_verification: Option<Verification>,
    pub reason: Option<String>,
}

impl CertificateVerification {
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            payload: None,
            chain_verification: None,
            reason: Some(reason.into()),
        }
    }
}

/// Generate a random certificate key.
pub fn generate_key() -> CertificateKey {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

/// Issues and checks certificates under one key.
pub struct CertificationService {
    key: CertificateKey,
}

impl CertificationService {
    /// Service with a fresh random key.
    pub fn new() -> Self {
        Self::with_key(generate_key())
    }

    pub fn with_key(key: CertificateKey) -> Self {
        Self { key }
    }

    /// Issue a certificate from an authenticity check.
    ///
    /// `None` unless the check passed: an unknown asset and a tampered
    /// record alike cannot be certified.
    pub fn issue(&self, verification: Verification) -> Result<Option<Certificate>> {
        let record = match verification.record {
            Some(record) if verification.valid => record,
            _ => return Ok(None),
        };

        let issued_at = Utc::now();
        let certificate_id = certificate_id(&record.asset_id, &issued_at);
        let payload = CertificatePayload {
            certificate_id: certificate_id.clone(),
            registry_hash: record.certification_hash.to_hex(),
            asset_id: record.asset_id,
            breed: record.breed,
            owner_id: record.owner_id,
            issued_at,
        };

        let json = serde_json::to_vec(&payload)?;
        let certificate = STANDARD.encode(self.seal(&json)?);
        let qr_code = render_qr(&json)?;

        tracing::info!(
            asset_id = %payload.asset_id,
            certificate_id = %certificate_id,
            "certificate issued"
        );
        Ok(Some(Certificate {
            certificate_id,
            certificate,
            qr_code,
            payload,
        }))
    }

    /// Open a certificate and check the asset it names with `authenticate`.
    ///
    /// Fails with [`CertificateError::Decryption`] if the blob cannot be
    /// opened under this key. A blob that opens is valid when the asset
    /// passes `authenticate` and its certification hash matches the one
    /// sealed in at issue.
    pub fn verify<F>(&self, certificate: &str, authenticate: F) -> Result<CertificateVerification>
    where
        F: FnOnce(&str) -> std::result::Result<Verification, StorageError>,
    {
        let payload = self.open(certificate)?;
        let verification = authenticate(&payload.asset_id)?;

        let reason = match &verification.record {
            None => verification.reason.map(|r| r.to_string()),
            Some(record) if record.certification_hash.to_hex() != payload.registry_hash => {
                Some("registry hash changed since issue".to_string())
            }
            Some(_) => None,
        };

        Ok(CertificateVerification {
            valid: reason.is_none(),
            payload: Some(payload),
            chain_verification: Some(verification),
            reason,
        })
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CertificateError::Encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CertificateError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, certificate: &str) -> Result<CertificatePayload> {
        let sealed = STANDARD
            .decode(certificate.trim())
            .map_err(|_| CertificateError::Decryption)?;
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CertificateError::Decryption);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CertificateError::Decryption)?;
        let nonce = Nonce::from_slice(&sealed[..NONCE_SIZE]);
        let plaintext = cipher
            .decrypt(nonce, &sealed[NONCE_SIZE..])
            .map_err(|_| CertificateError::Decryption)?;

        serde_json::from_slice(&plaintext).map_err(|_| CertificateError::Decryption)
    }
}

impl Default for CertificationService {
    fn default() -> Self {
        Self::new()
    }
}

/// sha256(asset id || issue time || random salt), hex encoded.
fn certificate_id(asset_id: &str, issued_at: &DateTime<Utc>) -> String {
    let mut salt = [0u8; ID_SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let issued = issued_at.to_rfc3339();
    hash_concat(&[asset_id.as_bytes(), issued.as_bytes(), &salt]).to_hex()
}

fn render_qr(data: &[u8]) -> Result<String> {
    let code = QrCode::new(data).map_err(|e| CertificateError::QrCode(e.to_string()))?;
    Ok(code
        .render::<char>()
        .quiet_zone(false)
        .module_dimensions(2, 1)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use herdledger_core::NewAsset;
    use herdledger_storage::{AssetRegistry, Storage, VerificationFailure};

    fn setup() -> Storage {
        let storage = Storage::open_temporary().unwrap();
        AssetRegistry::new(&storage)
            .register(NewAsset::new(
                "COW001",
                "Gir",
                NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
                "FARMER001",
                "Gujarat, India",
            ))
            .unwrap();
        storage
    }

    fn issue(service: &CertificationService, storage: &Storage, asset_id: &str) -> Option<Certificate> {
        let verification = AssetRegistry::new(storage)
            .verify_authenticity(asset_id)
            .unwrap();
        service.issue(verification).unwrap()
    }

    fn verify(
        service: &CertificationService,
        storage: &Storage,
        certificate: &str,
    ) -> Result<CertificateVerification> {
        let registry = AssetRegistry::new(storage);
        service.verify(certificate, |id| registry.verify_authenticity(id))
    }

    #[test]
    fn test_issue_and_verify() {
        let storage = setup();
        let service = CertificationService::new();

        let cert = issue(&service, &storage, "COW001").unwrap();
        assert_eq!(cert.certificate_id.len(), 64);
        assert!(!cert.qr_code.is_empty());
        assert_eq!(cert.payload.owner_id, "FARMER001");

        let result = verify(&service, &storage, &cert.certificate).unwrap();
        assert!(result.valid);
        assert_eq!(result.payload.unwrap(), cert.payload);
        assert!(result.chain_verification.unwrap().valid);
    }

    #[test]
    fn test_issue_unknown_asset() {
        let storage = setup();
        assert!(issue(&CertificationService::new(), &storage, "NOPE").is_none());
    }

    #[test]
    fn test_tampered_record_cannot_be_certified() {
        let storage = setup();
        let registry = AssetRegistry::new(&storage);

        let mut record = registry.get("COW001").unwrap().unwrap();
        record.breed = "Holstein".into();
        storage.put(Storage::asset_key("COW001"), &record).unwrap();

        assert!(issue(&CertificationService::new(), &storage, "COW001").is_none());
    }

    #[test]
    fn test_failed_check_cannot_be_certified() {
        let storage = setup();
        let record = AssetRegistry::new(&storage).get("COW001").unwrap();

        // A record is attached but the check itself failed.
        let verification = Verification {
            valid: false,
            record,
            reason: Some(VerificationFailure::ChainMismatch),
        };
        assert!(CertificationService::new().issue(verification).unwrap().is_none());
    }

    #[test]
    fn test_certificate_ids_are_unique() {
        let storage = setup();
        let service = CertificationService::new();

        let a = issue(&service, &storage, "COW001").unwrap();
        let b = issue(&service, &storage, "COW001").unwrap();
        assert_ne!(a.certificate_id, b.certificate_id);
        assert_ne!(a.certificate, b.certificate);
    }

    #[test]
    fn test_payload_json_field_names() {
        let storage = setup();
        let cert = issue(&CertificationService::new(), &storage, "COW001").unwrap();

        let json = serde_json::to_value(&cert.payload).unwrap();
        for field in ["certificateId", "assetId", "breed", "ownerId", "issuedAt", "registryHash"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn test_wrong_key_and_garbage_rejected() {
        let storage = setup();
        let cert = issue(&CertificationService::new(), &storage, "COW001").unwrap();

        let other = CertificationService::new();
        assert!(matches!(
            verify(&other, &storage, &cert.certificate),
            Err(CertificateError::Decryption)
        ));
        for garbage in ["", "not base64!!", "AAAA"] {
            assert!(matches!(
                verify(&other, &storage, garbage),
                Err(CertificateError::Decryption)
            ));
        }
    }

    #[test]
    fn test_flipped_byte_rejected() {
        let storage = setup();
        let service = CertificationService::new();
        let cert = issue(&service, &storage, "COW001").unwrap();

        let mut sealed = STANDARD.decode(&cert.certificate).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(matches!(
            verify(&service, &storage, &STANDARD.encode(sealed)),
            Err(CertificateError::Decryption)
        ));
    }

    #[test]
    fn test_tampered_record_invalidates_certificate() {
        let storage = setup();
        let service = CertificationService::with_key([7u8; 32]);
        let cert = issue(&service, &storage, "COW001").unwrap();

        let registry = AssetRegistry::new(&storage);
        let mut record = registry.get("COW001").unwrap().unwrap();
        record.breed = "Sahiwal".into();
        storage.put(Storage::asset_key("COW001"), &record).unwrap();

        let result = verify(&service, &storage, &cert.certificate).unwrap();
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("hash mismatch"));
        assert!(result.payload.is_some());
    }

    #[test]
    fn test_rehashed_record_invalidates_certificate() {
        let storage = setup();
        let service = CertificationService::new();
        let cert = issue(&service, &storage, "COW001").unwrap();

        // A consistent rewrite passes authenticity but not the sealed hash.
        let registry = AssetRegistry::new(&storage);
        let mut record = registry.get("COW001").unwrap().unwrap();
        record.breed = "Sahiwal".into();
        record.certification_hash = record.identity_hash();
        storage.put(Storage::asset_key("COW001"), &record).unwrap();

        let result = verify(&service, &storage, &cert.certificate).unwrap();
        assert!(!result.valid);
        assert!(result.chain_verification.unwrap().valid);
    }
}
