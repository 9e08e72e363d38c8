//! SFTP transport to the vendor, and the trait seam the pipelines use.
//!
//! Connection-level failures (TCP, SSH protocol, unexpected end of stream)
//! are all wrapped into [`RetryableTransportError`]: that classification is
//! the contract the scheduler's backoff logic keys on. Local filesystem
//! problems are not retryable and propagate as themselves.

use std::fs;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use ssh2::Session;
use tracing::debug;

use crate::config::SftpConfig;
use crate::retry::Retryable;

/// A connection-level failure worth re-attempting with backoff.
#[derive(Debug, thiserror::Error)]
#[error("retryable transport failure during {operation}: {source}")]
pub struct RetryableTransportError {
    operation: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl RetryableTransportError {
    pub fn new(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Retryable(#[from] RetryableTransportError),
    #[error("local file error at {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("local path has no file name: {0}")]
    BadPath(PathBuf),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        TransportError::is_retryable(self)
    }
}

/// The file operations the pipelines need from the vendor endpoint.
pub trait VendorTransport: Send + Sync {
    /// Names of regular files currently in the results directory.
    fn list_result_files(&self) -> Result<Vec<String>, TransportError>;

    /// Download one result file into `dest_dir`, returning its local path.
    fn fetch_result(&self, name: &str, dest_dir: &Path) -> Result<PathBuf, TransportError>;

    /// Upload a local file into the vendor's upload directory.
    fn upload(&self, local_path: &Path) -> Result<(), TransportError>;

    /// Acknowledge a fully processed result file by deleting it remotely.
    fn remove_result(&self, name: &str) -> Result<(), TransportError>;
}

/// Blocking SFTP client over one connection, opened at construction and
/// released on drop. Remote paths are always absolute joins against the
/// configured directories.
pub struct SftpTransport {
    sftp: ssh2::Sftp,
    // Keeps the SSH session alive for the lifetime of the SFTP channel.
    _session: Session,
    upload_dir: PathBuf,
    results_dir: PathBuf,
}

impl SftpTransport {
    /// Connect, handshake, and authenticate. Every failure here is
    /// connection-level and therefore retryable.
    pub fn connect(config: &SftpConfig) -> Result<Self, TransportError> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .map_err(|err| RetryableTransportError::new("connect", err))?;
        let mut session =
            Session::new().map_err(|err| RetryableTransportError::new("session", err))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|err| RetryableTransportError::new("handshake", err))?;
        session
            .userauth_password(&config.username, &config.password)
            .map_err(|err| RetryableTransportError::new("auth", err))?;
        let sftp = session
            .sftp()
            .map_err(|err| RetryableTransportError::new("sftp", err))?;
        debug!(host = %config.host, port = config.port, "sftp connection established");
        Ok(Self {
            sftp,
            _session: session,
            upload_dir: PathBuf::from(&config.upload_dir),
            results_dir: PathBuf::from(&config.results_dir),
        })
    }
}

impl VendorTransport for SftpTransport {
    fn list_result_files(&self) -> Result<Vec<String>, TransportError> {
        let entries = self
            .sftp
            .readdir(&self.results_dir)
            .map_err(|err| RetryableTransportError::new("list", err))?;
        let mut names = Vec::new();
        for (path, stat) in entries {
            if !stat.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn fetch_result(&self, name: &str, dest_dir: &Path) -> Result<PathBuf, TransportError> {
        let remote_path = self.results_dir.join(name);
        let mut remote = self
            .sftp
            .open(&remote_path)
            .map_err(|err| RetryableTransportError::new("get", err))?;
        let local_path = dest_dir.join(name);
        let mut local = fs::File::create(&local_path).map_err(|source| TransportError::Local {
            path: local_path.clone(),
            source,
        })?;
        // A failure mid-copy is an interrupted stream, so it is retryable.
        io::copy(&mut remote, &mut local)
            .map_err(|err| RetryableTransportError::new("get", err))?;
        debug!(file = name, "downloaded result file");
        Ok(local_path)
    }

    fn upload(&self, local_path: &Path) -> Result<(), TransportError> {
        let name = local_path
            .file_name()
            .ok_or_else(|| TransportError::BadPath(local_path.to_path_buf()))?;
        let mut local = fs::File::open(local_path).map_err(|source| TransportError::Local {
            path: local_path.to_path_buf(),
            source,
        })?;
        let remote_path = self.upload_dir.join(name);
        let mut remote = self
            .sftp
            .create(&remote_path)
            .map_err(|err| RetryableTransportError::new("put", err))?;
        io::copy(&mut local, &mut remote)
            .map_err(|err| RetryableTransportError::new("put", err))?;
        debug!(file = %name.to_string_lossy(), "uploaded exchange file");
        Ok(())
    }

    fn remove_result(&self, name: &str) -> Result<(), TransportError> {
        self.sftp
            .unlink(&self.results_dir.join(name))
            .map_err(|err| RetryableTransportError::new("remove", err))?;
        debug!(file = name, "removed acknowledged result file");
        Ok(())
    }
}
