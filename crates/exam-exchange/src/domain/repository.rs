use super::{
    AuthorizationStatus, ExamAuthorization, ExamProfile, ExamRun, PendingAuthorization,
    ProctoredExamGrade, ProfileStatus,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for the exchange subsystem.
///
/// The real store lives in the surrounding application; this trait exposes
/// exactly the queries and transitions the pipelines use, so they can be
/// exercised against an in-memory implementation.
pub trait ExamRepository: Send + Sync {
    fn pending_profiles(&self) -> Result<Vec<ExamProfile>, RepositoryError>;

    fn pending_authorizations(&self) -> Result<Vec<PendingAuthorization>, RepositoryError>;

    /// Apply the outcome of one successful profile upload in a single update:
    /// encoded rows move to IN_PROGRESS, codec-rejected rows to INVALID.
    fn mark_profiles_exported(
        &self,
        exported: &[i64],
        invalid: &[i64],
    ) -> Result<(), RepositoryError>;

    /// Move successfully uploaded authorizations to IN_PROGRESS.
    fn mark_authorizations_exported(&self, exported: &[i64]) -> Result<(), RepositoryError>;

    fn profile_by_student_id(
        &self,
        student_id: i64,
    ) -> Result<Option<ExamProfile>, RepositoryError>;

    fn set_profile_status(
        &self,
        student_id: i64,
        status: ProfileStatus,
    ) -> Result<(), RepositoryError>;

    fn authorization_by_id(&self, id: i64)
        -> Result<Option<ExamAuthorization>, RepositoryError>;

    fn set_authorization_status(
        &self,
        id: i64,
        status: AuthorizationStatus,
    ) -> Result<(), RepositoryError>;

    /// Record that the exam was sat (or skipped): `exam_taken` becomes true
    /// and `exam_no_show` mirrors the vendor's flag.
    fn record_exam_attempt(
        &self,
        authorization_id: i64,
        no_show: bool,
    ) -> Result<(), RepositoryError>;

    /// Create or replace the grade for its (learner, course, run,
    /// authorization) key.
    fn upsert_grade(&self, grade: ProctoredExamGrade) -> Result<(), RepositoryError>;

    fn run_by_id(&self, id: i64) -> Result<Option<ExamRun>, RepositoryError>;

    /// Reset every non-taken authorization of a run to PENDING/UPDATE so the
    /// next export re-sends it. Returns the number of rows touched.
    fn reset_authorizations_for_run(&self, run_id: i64) -> Result<usize, RepositoryError>;

    fn mark_run_authorized(&self, run_id: i64) -> Result<(), RepositoryError>;
}
