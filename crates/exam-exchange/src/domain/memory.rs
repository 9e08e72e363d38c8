use std::collections::HashMap;
use std::sync::Mutex;

use super::repository::{ExamRepository, RepositoryError};
use super::{
    AuthorizationOperation, AuthorizationStatus, ExamAuthorization, ExamProfile, ExamRun,
    PendingAuthorization, ProctoredExamGrade, ProfileStatus,
};

/// (student, course, run, vendor authorization id) — the immutable grade key.
type GradeKey = (i64, String, i64, i64);

#[derive(Default)]
struct Inner {
    profiles: HashMap<i64, ExamProfile>,
    authorizations: HashMap<i64, ExamAuthorization>,
    runs: HashMap<i64, ExamRun>,
    grades: HashMap<GradeKey, ProctoredExamGrade>,
}

/// Map-backed [`ExamRepository`] used by the worker binary and the tests.
/// Deployments bind their own implementation over the real store.
#[derive(Default)]
pub struct InMemoryExamRepository {
    inner: Mutex<Inner>,
}

impl InMemoryExamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: ExamProfile) {
        let mut inner = self.lock_for_seed();
        inner.profiles.insert(profile.student_id, profile);
    }

    pub fn insert_authorization(&self, authorization: ExamAuthorization) {
        let mut inner = self.lock_for_seed();
        inner
            .authorizations
            .insert(authorization.id, authorization);
    }

    pub fn insert_run(&self, run: ExamRun) {
        let mut inner = self.lock_for_seed();
        inner.runs.insert(run.id, run);
    }

    pub fn grade_count(&self) -> usize {
        self.lock_for_seed().grades.len()
    }

    pub fn grade_for_authorization(&self, authorization_id: i64) -> Option<ProctoredExamGrade> {
        self.lock_for_seed()
            .grades
            .values()
            .find(|grade| grade.client_authorization_id == authorization_id)
            .cloned()
    }

    // Seeding/assertion helpers may panic; the trait impl never does.
    fn lock_for_seed(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("repository mutex poisoned")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ExamRepository for InMemoryExamRepository {
    fn pending_profiles(&self) -> Result<Vec<ExamProfile>, RepositoryError> {
        let inner = self.lock()?;
        let mut pending: Vec<ExamProfile> = inner
            .profiles
            .values()
            .filter(|profile| profile.status == ProfileStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|profile| profile.student_id);
        Ok(pending)
    }

    fn pending_authorizations(&self) -> Result<Vec<PendingAuthorization>, RepositoryError> {
        let inner = self.lock()?;
        let mut pending = Vec::new();
        for authorization in inner.authorizations.values() {
            if authorization.status != AuthorizationStatus::Pending {
                continue;
            }
            let run = inner
                .runs
                .get(&authorization.exam_run_id)
                .ok_or(RepositoryError::NotFound)?;
            pending.push(PendingAuthorization {
                authorization: authorization.clone(),
                run: run.clone(),
            });
        }
        pending.sort_by_key(|record| record.authorization.id);
        Ok(pending)
    }

    fn mark_profiles_exported(
        &self,
        exported: &[i64],
        invalid: &[i64],
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        for student_id in exported {
            if let Some(profile) = inner.profiles.get_mut(student_id) {
                profile.status = ProfileStatus::InProgress;
            }
        }
        for student_id in invalid {
            if let Some(profile) = inner.profiles.get_mut(student_id) {
                profile.status = ProfileStatus::Invalid;
            }
        }
        Ok(())
    }

    fn mark_authorizations_exported(&self, exported: &[i64]) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        for id in exported {
            if let Some(authorization) = inner.authorizations.get_mut(id) {
                authorization.status = AuthorizationStatus::InProgress;
            }
        }
        Ok(())
    }

    fn profile_by_student_id(
        &self,
        student_id: i64,
    ) -> Result<Option<ExamProfile>, RepositoryError> {
        Ok(self.lock()?.profiles.get(&student_id).cloned())
    }

    fn set_profile_status(
        &self,
        student_id: i64,
        status: ProfileStatus,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        let profile = inner
            .profiles
            .get_mut(&student_id)
            .ok_or(RepositoryError::NotFound)?;
        profile.status = status;
        Ok(())
    }

    fn authorization_by_id(
        &self,
        id: i64,
    ) -> Result<Option<ExamAuthorization>, RepositoryError> {
        Ok(self.lock()?.authorizations.get(&id).cloned())
    }

    fn set_authorization_status(
        &self,
        id: i64,
        status: AuthorizationStatus,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        let authorization = inner
            .authorizations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        authorization.status = status;
        Ok(())
    }

    fn record_exam_attempt(
        &self,
        authorization_id: i64,
        no_show: bool,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        let authorization = inner
            .authorizations
            .get_mut(&authorization_id)
            .ok_or(RepositoryError::NotFound)?;
        authorization.exam_taken = true;
        authorization.exam_no_show = no_show;
        Ok(())
    }

    fn upsert_grade(&self, grade: ProctoredExamGrade) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        let key = (
            grade.student_id,
            grade.course_id.clone(),
            grade.exam_run_id,
            grade.client_authorization_id,
        );
        inner.grades.insert(key, grade);
        Ok(())
    }

    fn run_by_id(&self, id: i64) -> Result<Option<ExamRun>, RepositoryError> {
        Ok(self.lock()?.runs.get(&id).cloned())
    }

    fn reset_authorizations_for_run(&self, run_id: i64) -> Result<usize, RepositoryError> {
        let mut inner = self.lock()?;
        let mut touched = 0;
        for authorization in inner.authorizations.values_mut() {
            if authorization.exam_run_id == run_id && !authorization.exam_taken {
                authorization.status = AuthorizationStatus::Pending;
                authorization.operation = AuthorizationOperation::Update;
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn mark_run_authorized(&self, run_id: i64) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        let run = inner.runs.get_mut(&run_id).ok_or(RepositoryError::NotFound)?;
        run.authorized = true;
        Ok(())
    }
}
