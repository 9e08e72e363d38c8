//! Export pipeline: move PENDING profiles and authorizations to the vendor.
//!
//! Status transitions happen only after a successful upload, in one
//! repository call, so a retried batch cannot double-apply them; an upload
//! failure leaves the whole batch PENDING for the next scheduled run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{AuditError, AuditStore, ExamAuditor};
use crate::domain::repository::{ExamRepository, RepositoryError};
use crate::retry::Retryable;
use crate::transport::{TransportError, VendorTransport};
use crate::tsv::formats;
use crate::tsv::{CodecError, EncodeOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to stage export file {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Retryable for ExportError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_retryable())
    }
}

/// Outcome of one export run, for logs and the worker's summary output.
#[derive(Debug, Default, Serialize)]
pub struct ExportSummary {
    pub exported: usize,
    pub invalid: usize,
    pub file_name: Option<String>,
}

pub struct ExportPipeline<R, T, S> {
    repository: Arc<R>,
    transport: Arc<T>,
    auditor: Arc<ExamAuditor<S>>,
    tmp_dir: PathBuf,
}

impl<R, T, S> ExportPipeline<R, T, S>
where
    R: ExamRepository,
    T: VendorTransport,
    S: AuditStore,
{
    pub fn new(
        repository: Arc<R>,
        transport: Arc<T>,
        auditor: Arc<ExamAuditor<S>>,
        tmp_dir: PathBuf,
    ) -> Self {
        Self {
            repository,
            transport,
            auditor,
            tmp_dir,
        }
    }

    /// Export PENDING profiles as one CDD file. Codec-rejected profiles are
    /// marked INVALID in the same update that moves the rest to IN_PROGRESS.
    pub fn export_profiles(&self) -> Result<ExportSummary, ExportError> {
        let profiles = self.repository.pending_profiles()?;
        if profiles.is_empty() {
            info!("no pending exam profiles to export");
            return Ok(ExportSummary::default());
        }

        let outcome = formats::encode_cdd(&profiles)?;
        for rejected in &outcome.rejected {
            warn!(
                student_id = profiles[rejected.index].student_id,
                reason = %rejected.reason,
                "profile cannot be encoded, marking invalid"
            );
        }
        let exported_ids: Vec<i64> = outcome
            .accepted
            .iter()
            .map(|&index| profiles[index].student_id)
            .collect();
        let invalid_ids: Vec<i64> = outcome
            .rejected
            .iter()
            .map(|rejected| profiles[rejected.index].student_id)
            .collect();

        if exported_ids.is_empty() {
            // Nothing encodable; no upload, but the invalid rows must not be
            // retried forever.
            self.repository.mark_profiles_exported(&[], &invalid_ids)?;
            return Ok(ExportSummary {
                exported: 0,
                invalid: invalid_ids.len(),
                file_name: None,
            });
        }

        let file_name = self.ship(&outcome, "cdd")?;
        self.repository
            .mark_profiles_exported(&exported_ids, &invalid_ids)?;
        info!(
            file = %file_name,
            exported = exported_ids.len(),
            invalid = invalid_ids.len(),
            "exported exam profiles"
        );
        Ok(ExportSummary {
            exported: exported_ids.len(),
            invalid: invalid_ids.len(),
            file_name: Some(file_name),
        })
    }

    /// Export PENDING authorizations as one EAD file. There is no invalid
    /// state for authorizations: rejected rows are logged and stay PENDING.
    pub fn export_authorizations(&self) -> Result<ExportSummary, ExportError> {
        let pending = self.repository.pending_authorizations()?;
        if pending.is_empty() {
            info!("no pending exam authorizations to export");
            return Ok(ExportSummary::default());
        }

        let outcome = formats::encode_ead(&pending)?;
        for rejected in &outcome.rejected {
            warn!(
                authorization_id = pending[rejected.index].authorization.id,
                reason = %rejected.reason,
                "authorization cannot be encoded, leaving pending"
            );
        }
        if outcome.accepted.is_empty() {
            return Ok(ExportSummary {
                exported: 0,
                invalid: outcome.rejected.len(),
                file_name: None,
            });
        }

        let exported_ids: Vec<i64> = outcome
            .accepted
            .iter()
            .map(|&index| pending[index].authorization.id)
            .collect();
        let file_name = self.ship(&outcome, "ead")?;
        self.repository
            .mark_authorizations_exported(&exported_ids)?;
        info!(
            file = %file_name,
            exported = exported_ids.len(),
            "exported exam authorizations"
        );
        Ok(ExportSummary {
            exported: exported_ids.len(),
            invalid: outcome.rejected.len(),
            file_name: Some(file_name),
        })
    }

    /// Write the payload under the tmp dir, audit it, upload it, and always
    /// drop the local copy.
    fn ship(&self, outcome: &EncodeOutcome, prefix: &str) -> Result<String, ExportError> {
        let file_name = export_file_name(prefix);
        let path = self.tmp_dir.join(&file_name);
        fs::write(&path, &outcome.payload).map_err(|source| ExportError::Stage {
            path: path.clone(),
            source,
        })?;
        let shipped = self.audit_and_upload(&path);
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), "could not remove staged export file: {err}");
        }
        shipped?;
        Ok(file_name)
    }

    fn audit_and_upload(&self, path: &Path) -> Result<(), ExportError> {
        self.auditor.audit_request_file(path)?;
        self.transport.upload(path)?;
        Ok(())
    }
}

/// `cdd-%Y%m%d%H_<suffix>.dat` per the vendor naming convention; the random
/// suffix keeps two runs within the same hour from colliding.
fn export_file_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    format!("{}-{}_{}.dat", prefix, Utc::now().format("%Y%m%d%H"), suffix)
}
