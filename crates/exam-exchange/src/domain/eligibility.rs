//! Explicit entry points for authorization refresh.
//!
//! The surrounding application calls these when an exam run changes, instead
//! of relying on implicit persistence hooks: the call site stays traceable.

use tracing::info;

use super::repository::{ExamRepository, RepositoryError};

/// An eligibility-window change invalidates previously sent authorizations:
/// every non-taken authorization of the run goes back to PENDING with the
/// `update` operation so the next export re-sends it.
pub fn refresh_authorizations_for_run<R: ExamRepository>(
    repository: &R,
    run_id: i64,
) -> Result<usize, RepositoryError> {
    repository
        .run_by_id(run_id)?
        .ok_or(RepositoryError::NotFound)?;
    let touched = repository.reset_authorizations_for_run(run_id)?;
    info!(run_id, touched, "reset authorizations after eligibility window change");
    Ok(touched)
}

/// Record that the initial authorization batch for a run has been queued.
pub fn mark_run_authorized<R: ExamRepository>(
    repository: &R,
    run_id: i64,
) -> Result<(), RepositoryError> {
    repository.mark_run_authorized(run_id)?;
    info!(run_id, "exam run marked authorized");
    Ok(())
}
