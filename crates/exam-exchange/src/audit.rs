//! Encrypted audit trail of every payload exchanged with the vendor.
//!
//! Payloads are sealed-box encrypted under a public key this system holds no
//! private half of, then written to durable object storage. The trail is a
//! compliance record, not a retry aid: auditing happens whether or not the
//! transfer itself succeeds, and the records are write-only from here.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use crypto_box::PublicKey;
use rand::rngs::OsRng;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::debug;

use crate::config::{AuditConfig, ConfigError};

const AUDIT_KEY_PREFIX: &str = "exam_audits";

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit storage failure: {0}")]
    Storage(String),
    #[error("audit encryption failure")]
    Encryption,
    #[error("audit path has no file name: {0}")]
    BadPath(PathBuf),
    #[error("audit io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage seam for ciphertext, so pipelines can be exercised against an
/// in-memory store.
pub trait AuditStore: Send + Sync {
    fn put(&self, key: &str, ciphertext: &[u8]) -> Result<(), AuditError>;
}

/// Concrete store over the audit bucket. The bucket is expected to enforce
/// its own server-side encryption on top of the sealed-box payload.
pub struct S3AuditStore {
    bucket: Box<Bucket>,
}

impl S3AuditStore {
    pub fn from_config(config: &AuditConfig) -> Result<Self, ConfigError> {
        let name = config.require_bucket()?;
        let region: Region = config
            .require_region()?
            .parse()
            .map_err(|_| ConfigError::AuditStorage("unparsable region".to_string()))?;
        let credentials = Credentials::new(
            Some(config.require_access_key()?),
            Some(config.require_secret_key()?),
            None,
            None,
            None,
        )
        .map_err(|err| ConfigError::AuditStorage(err.to_string()))?;
        let bucket = Bucket::new(name, region, credentials)
            .map_err(|err| ConfigError::AuditStorage(err.to_string()))?;
        Ok(Self { bucket })
    }
}

impl AuditStore for S3AuditStore {
    fn put(&self, key: &str, ciphertext: &[u8]) -> Result<(), AuditError> {
        self.bucket
            .put_object(key, ciphertext)
            .map_err(|err| AuditError::Storage(err.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum AuditKind {
    Request,
    Response,
}

impl AuditKind {
    const fn folder(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

/// Audits request/response files, or does nothing when auditing is disabled
/// by configuration. Enabled-but-incomplete configuration is a construction
/// error, surfaced before any file or network activity.
pub struct ExamAuditor<S> {
    inner: Option<AuditorInner<S>>,
}

struct AuditorInner<S> {
    public_key: PublicKey,
    store: S,
}

impl ExamAuditor<S3AuditStore> {
    /// Build from configuration with the concrete bucket store.
    pub fn from_config(config: &AuditConfig) -> Result<Self, ConfigError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let public_key = decode_public_key(config.require_public_key()?)?;
        let store = S3AuditStore::from_config(config)?;
        Ok(Self::new(public_key, store))
    }
}

impl<S: AuditStore> ExamAuditor<S> {
    pub fn new(public_key: PublicKey, store: S) -> Self {
        Self {
            inner: Some(AuditorInner { public_key, store }),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Seal and store an outbound payload under `request/{basename}`.
    pub fn audit_request_file(&self, path: &Path) -> Result<(), AuditError> {
        self.audit_file(AuditKind::Request, path)
    }

    /// Seal and store an inbound payload under `response/{basename}`.
    pub fn audit_response_file(&self, path: &Path) -> Result<(), AuditError> {
        self.audit_file(AuditKind::Response, path)
    }

    fn audit_file(&self, kind: AuditKind, path: &Path) -> Result<(), AuditError> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };
        let basename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| AuditError::BadPath(path.to_path_buf()))?;
        let plaintext = fs::read(path)?;
        let ciphertext = inner
            .public_key
            .seal(&mut OsRng, &plaintext)
            .map_err(|_| AuditError::Encryption)?;
        let key = format!("{}/{}/{}.nacl", AUDIT_KEY_PREFIX, kind.folder(), basename);
        inner.store.put(&key, &ciphertext)?;
        debug!(key, bytes = ciphertext.len(), "audited exchange payload");
        Ok(())
    }
}

/// Decode the configured base64 NaCl public key.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, ConfigError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| ConfigError::InvalidAuditKey)?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidAuditKey)?;
    Ok(PublicKey::from(bytes))
}
