//! Import pipeline: ingest vendor result archives and apply transitions.
//!
//! An archive is acknowledged (deleted remotely) only when every member is
//! accounted for; anything less leaves it in place for the next poll. All
//! row-level problems aggregate into operator messages instead of aborting
//! sibling rows, and every transition is keyed by immutable vendor ids so
//! re-processing the same archive is a no-op.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::archive::{self, ArchiveError};
use crate::audit::{AuditError, AuditStore, ExamAuditor};
use crate::domain::repository::{ExamRepository, RepositoryError};
use crate::domain::{AuthorizationStatus, ProctoredExamGrade, ProfileStatus};
use crate::retry::Retryable;
use crate::transport::{TransportError, VendorTransport};
use crate::tsv::formats::{self, EacRow, ExamResultRow, VcdcRow};

/// Result-dump prefixes the vendor sends that carry nothing we ingest. They
/// count as processed so they never block deletion of the archive.
const IGNORED_PREFIXES: &[&str] = &[
    "candidate", "survey", "comment", "section", "item", "response",
];

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("failed to stage result file: {0}")]
    Stage(#[from] io::Error),
}

impl Retryable for ImportError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_retryable())
    }
}

/// Out-of-band notification seam for aggregated row errors.
pub trait OperatorNotifier: Send + Sync {
    fn notify(&self, subject: &str, messages: &[String]);
}

/// Default notifier: the messages land in the error log.
pub struct LogNotifier;

impl OperatorNotifier for LogNotifier {
    fn notify(&self, subject: &str, messages: &[String]) {
        for message in messages {
            error!(subject, "{message}");
        }
    }
}

/// Outcome of one import run.
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub files_seen: usize,
    pub files_processed: usize,
    pub files_deferred: usize,
}

pub struct ArchivedResponseProcessor<R, T, S, N> {
    repository: Arc<R>,
    transport: Arc<T>,
    auditor: Arc<ExamAuditor<S>>,
    notifier: Arc<N>,
    tmp_dir: PathBuf,
}

impl<R, T, S, N> ArchivedResponseProcessor<R, T, S, N>
where
    R: ExamRepository,
    T: VendorTransport,
    S: AuditStore,
    N: OperatorNotifier,
{
    pub fn new(
        repository: Arc<R>,
        transport: Arc<T>,
        auditor: Arc<ExamAuditor<S>>,
        notifier: Arc<N>,
        tmp_dir: PathBuf,
    ) -> Self {
        Self {
            repository,
            transport,
            auditor,
            notifier,
            tmp_dir,
        }
    }

    /// Poll the results directory once, in listing order.
    pub fn process_results(&self) -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary::default();
        for name in self.transport.list_result_files()? {
            if !name.to_ascii_lowercase().ends_with(".zip") {
                debug!(file = %name, "skipping non-archive result file");
                continue;
            }
            summary.files_seen += 1;
            if self.process_remote_archive(&name)? {
                summary.files_processed += 1;
            } else {
                summary.files_deferred += 1;
            }
        }
        info!(
            seen = summary.files_seen,
            processed = summary.files_processed,
            deferred = summary.files_deferred,
            "import run finished"
        );
        Ok(summary)
    }

    /// Fetch, audit, and unpack one archive; delete it remotely only when
    /// every member was accounted for. Local copies live in a scoped temp
    /// dir and are removed with it, error or not.
    fn process_remote_archive(&self, name: &str) -> Result<bool, ImportError> {
        let scratch = tempfile::Builder::new()
            .prefix("exam-results-")
            .tempdir_in(&self.tmp_dir)?;
        let local_zip = self.transport.fetch_result(name, scratch.path())?;
        self.auditor.audit_response_file(&local_zip)?;

        let processed = self.process_zip(&local_zip, scratch.path())?;
        if processed {
            self.transport.remove_result(name)?;
            info!(file = name, "result archive processed and acknowledged");
        } else {
            warn!(file = name, "leaving result archive on server for reprocessing");
        }
        Ok(processed)
    }

    /// Returns true only when every member is processed or ignorable. A
    /// corrupt archive counts as unprocessed so it stays for re-inspection.
    fn process_zip(&self, zip_path: &Path, scratch: &Path) -> Result<bool, ImportError> {
        let members = match archive::extract_all(zip_path, scratch) {
            Ok(members) => members,
            Err(ArchiveError::Zip(err)) => {
                warn!(file = %zip_path.display(), "result archive is unreadable: {err}");
                return Ok(false);
            }
            Err(ArchiveError::Io(err)) => return Err(ImportError::Stage(err)),
        };

        let mut all_processed = true;
        let mut messages = Vec::new();
        for member in &members {
            if !self.process_member(member, &mut messages)? {
                all_processed = false;
            }
        }
        if !messages.is_empty() {
            self.notifier
                .notify("exam result file errors", &messages);
        }
        Ok(all_processed)
    }

    /// Dispatch one extracted member by filename prefix.
    fn process_member(
        &self,
        path: &Path,
        messages: &mut Vec<String>,
    ) -> Result<bool, ImportError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if file_name.starts_with("vcdc") {
            self.process_vcdc(path, messages)?;
            Ok(true)
        } else if file_name.starts_with("eac") {
            self.process_eac(path, messages)?;
            Ok(true)
        } else if file_name.starts_with("exam") {
            self.process_exam(path, messages)?;
            Ok(true)
        } else if IGNORED_PREFIXES
            .iter()
            .any(|prefix| file_name.starts_with(prefix))
        {
            debug!(file = %file_name, "ignoring vendor dump file");
            Ok(true)
        } else {
            messages.push(format!("unrecognized vendor response file: {file_name}"));
            Ok(false)
        }
    }

    /// CDD confirmations: Accepted without a WARNING marker means SUCCESS.
    /// Row errors never block the file; they only aggregate.
    fn process_vcdc(&self, path: &Path, messages: &mut Vec<String>) -> Result<(), ImportError> {
        let outcome = formats::decode_vcdc(self.open(path)?);
        self.collect_parse_errors(path, outcome.invalid, messages);
        for row in outcome.rows {
            self.apply_vcdc_row(&row, messages)?;
        }
        Ok(())
    }

    fn apply_vcdc_row(
        &self,
        row: &VcdcRow,
        messages: &mut Vec<String>,
    ) -> Result<(), ImportError> {
        let Some(profile) = self.repository.profile_by_student_id(row.client_candidate_id)?
        else {
            messages.push(format!(
                "VCDC row for unknown candidate {}",
                row.client_candidate_id
            ));
            return Ok(());
        };
        if row.accepted() {
            self.repository
                .set_profile_status(profile.student_id, ProfileStatus::Success)?;
        } else {
            self.repository
                .set_profile_status(profile.student_id, ProfileStatus::Failed)?;
            messages.push(format!(
                "candidate {} rejected by vendor: {}",
                profile.student_id, row.message
            ));
        }
        Ok(())
    }

    /// EAD confirmations, keyed by the vendor-issued authorization id.
    fn process_eac(&self, path: &Path, messages: &mut Vec<String>) -> Result<(), ImportError> {
        let outcome = formats::decode_eac(self.open(path)?);
        self.collect_parse_errors(path, outcome.invalid, messages);
        for row in outcome.rows {
            self.apply_eac_row(&row, messages)?;
        }
        Ok(())
    }

    fn apply_eac_row(&self, row: &EacRow, messages: &mut Vec<String>) -> Result<(), ImportError> {
        let Some(authorization) = self
            .repository
            .authorization_by_id(row.client_authorization_id)?
        else {
            messages.push(format!(
                "EAC row for unknown authorization {}",
                row.client_authorization_id
            ));
            return Ok(());
        };
        if row.accepted() {
            self.repository
                .set_authorization_status(authorization.id, AuthorizationStatus::Success)?;
        } else {
            self.repository
                .set_authorization_status(authorization.id, AuthorizationStatus::Failed)?;
            messages.push(format!(
                "authorization {} rejected by vendor: {}",
                authorization.id, row.message
            ));
        }
        Ok(())
    }

    /// Exam results: upsert the grade and record the attempt. Unknown grade
    /// vocabulary leaves both the grade and the authorization untouched.
    fn process_exam(&self, path: &Path, messages: &mut Vec<String>) -> Result<(), ImportError> {
        let outcome = formats::decode_exam(self.open(path)?);
        self.collect_parse_errors(path, outcome.invalid, messages);
        for (row, raw) in outcome.rows {
            self.apply_exam_row(&row, raw, messages)?;
        }
        Ok(())
    }

    fn apply_exam_row(
        &self,
        row: &ExamResultRow,
        raw: String,
        messages: &mut Vec<String>,
    ) -> Result<(), ImportError> {
        let Some(authorization_id) = row.client_authorization_id else {
            messages.push(format!(
                "EXAM row for candidate {} carries no authorization id",
                row.client_candidate_id
            ));
            return Ok(());
        };
        let Some(authorization) = self.repository.authorization_by_id(authorization_id)? else {
            messages.push(format!(
                "EXAM row for unknown authorization {authorization_id}"
            ));
            return Ok(());
        };

        let grade = row.grade.to_ascii_lowercase();
        let passed = if row.no_show {
            false
        } else {
            match grade.as_str() {
                "pass" => true,
                "fail" => false,
                other => {
                    messages.push(format!(
                        "unknown grade '{other}' for authorization {authorization_id}"
                    ));
                    return Ok(());
                }
            }
        };

        self.repository.upsert_grade(ProctoredExamGrade {
            student_id: authorization.student_id,
            course_id: authorization.course_id.clone(),
            exam_run_id: authorization.exam_run_id,
            client_authorization_id: authorization_id,
            exam_date: row.exam_date,
            passing_score: row.passing_score,
            score: row.score,
            grade,
            passed,
            percentage_grade: row.score.map(|score| score / 100.0).unwrap_or(0.0),
            row_data: raw,
        })?;
        self.repository
            .record_exam_attempt(authorization_id, row.no_show)?;
        Ok(())
    }

    fn open(&self, path: &Path) -> Result<fs::File, ImportError> {
        fs::File::open(path).map_err(ImportError::Stage)
    }

    fn collect_parse_errors(
        &self,
        path: &Path,
        invalid: Vec<String>,
        messages: &mut Vec<String>,
    ) {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        for description in invalid {
            messages.push(format!("{file_name}: {description}"));
        }
    }
}
