use std::env;
use std::fmt;
use std::path::PathBuf;

/// Top-level configuration for the exchange subsystem, loaded once from the
/// environment. Every later component receives the slice of this struct it
/// needs; nothing reads settings ad hoc.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub sftp: SftpConfig,
    pub audit: AuditConfig,
    pub tmp_dir: PathBuf,
    pub telemetry: TelemetryConfig,
}

impl ExchangeConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let sftp = SftpConfig {
            host: require("EXAM_SFTP_HOST")?,
            port: require("EXAM_SFTP_PORT")?
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort)?,
            username: require("EXAM_SFTP_USERNAME")?,
            password: require("EXAM_SFTP_PASSWORD")?,
            upload_dir: require("EXAM_SFTP_UPLOAD_DIR")?,
            results_dir: require("EXAM_SFTP_RESULTS_DIR")?,
        };

        let audit = AuditConfig {
            enabled: flag("EXAM_AUDIT_ENABLED")?,
            bucket: optional("EXAM_AUDIT_BUCKET"),
            region: optional("EXAM_AUDIT_REGION"),
            access_key: optional("EXAM_AUDIT_ACCESS_KEY"),
            secret_key: optional("EXAM_AUDIT_SECRET_KEY"),
            public_key: optional("EXAM_AUDIT_PUBLIC_KEY"),
        };

        let tmp_dir = PathBuf::from(require("EXAM_TMP_DIR")?);

        let log_level = env::var("EXAM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            sftp,
            audit,
            tmp_dir,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Connection parameters for the vendor's SFTP endpoint. All fields are
/// required before any network attempt is made.
#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Remote directory outbound CDD/EAD files are uploaded into.
    pub upload_dir: String,
    /// Remote directory the vendor drops result archives into.
    pub results_dir: String,
}

/// Settings for the encrypted audit trail. The storage and key fields are
/// optional here and validated by the auditor constructor, which fails fast
/// when auditing is enabled but incomplete.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub enabled: bool,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Base64-encoded 32-byte NaCl public key.
    pub public_key: Option<String>,
}

impl AuditConfig {
    /// A disabled audit configuration, for callers that opt out explicitly.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            bucket: None,
            region: None,
            access_key: None,
            secret_key: None,
            public_key: None,
        }
    }

    pub(crate) fn require_bucket(&self) -> Result<&str, ConfigError> {
        required_field(&self.bucket, "EXAM_AUDIT_BUCKET")
    }

    pub(crate) fn require_region(&self) -> Result<&str, ConfigError> {
        required_field(&self.region, "EXAM_AUDIT_REGION")
    }

    pub(crate) fn require_access_key(&self) -> Result<&str, ConfigError> {
        required_field(&self.access_key, "EXAM_AUDIT_ACCESS_KEY")
    }

    pub(crate) fn require_secret_key(&self) -> Result<&str, ConfigError> {
        required_field(&self.secret_key, "EXAM_AUDIT_SECRET_KEY")
    }

    pub(crate) fn require_public_key(&self) -> Result<&str, ConfigError> {
        required_field(&self.public_key, "EXAM_AUDIT_PUBLIC_KEY")
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

fn required_field<'a>(
    value: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, ConfigError> {
    value.as_deref().ok_or(ConfigError::Missing(name))
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

// Disabling the audit trail must be an explicit decision, so an unset flag
// is a configuration error rather than a default.
fn flag(name: &'static str) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Err(ConfigError::Missing(name)),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { name, value }),
        },
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    InvalidPort,
    InvalidFlag { name: &'static str, value: String },
    InvalidAuditKey,
    AuditStorage(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "required setting {} is absent", name),
            ConfigError::InvalidPort => write!(f, "EXAM_SFTP_PORT must be a valid u16"),
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{} must be a boolean, got '{}'", name, value)
            }
            ConfigError::InvalidAuditKey => {
                write!(f, "EXAM_AUDIT_PUBLIC_KEY must be a base64-encoded 32-byte key")
            }
            ConfigError::AuditStorage(reason) => {
                write!(f, "audit storage configuration rejected: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
