pub mod eligibility;
pub mod memory;
pub mod repository;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sync state of a learner's demographic record with the vendor.
///
/// Export moves `Pending` to `InProgress` (or `Invalid` when the record can
/// never be encoded); import moves `InProgress` to `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Invalid,
}

impl ProfileStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Invalid => "invalid",
        }
    }
}

/// Sync state of one exam authorization. `Pending` is the only exportable
/// state; there is no invalid state because a rejected encoding simply stays
/// pending for the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl AuthorizationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Whether an authorization is the first one sent for its exam run (`Add`)
/// or a re-send after something about the run changed (`Update`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationOperation {
    Add,
    Update,
}

impl AuthorizationOperation {
    /// Value of the vendor's AuthorizationTransactionType column.
    pub const fn transaction_type(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
        }
    }
}

/// One learner's demographic record as the vendor needs it. At most one
/// profile exists per learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamProfile {
    /// Local student id, doubling as the vendor's ClientCandidateID.
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address1: String,
    pub address2: Option<String>,
    pub address3: Option<String>,
    pub city: String,
    /// ISO 3166-2 subdivision, e.g. `US-MA`.
    pub state_or_territory: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub postal_code: String,
    /// International format: `+<calling code> <national number>`.
    pub phone: String,
    pub updated_at: DateTime<Utc>,
    pub status: ProfileStatus,
}

/// One (learner, course, exam run) the learner may sit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAuthorization {
    /// Local primary key, doubling as the vendor's ClientAuthorizationID.
    pub id: i64,
    pub student_id: i64,
    pub course_id: String,
    pub exam_run_id: i64,
    pub operation: AuthorizationOperation,
    pub status: AuthorizationStatus,
    pub exam_taken: bool,
    pub exam_no_show: bool,
    pub exam_coupon_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One schedulable window of an exam for a course. Read-only here except for
/// the `authorized` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRun {
    pub id: i64,
    pub course_id: String,
    pub exam_series_code: String,
    pub exam_module: Option<String>,
    pub date_first_schedulable: NaiveDate,
    pub date_last_schedulable: NaiveDate,
    pub date_first_eligible: NaiveDate,
    pub date_last_eligible: NaiveDate,
    /// Set once the initial authorization batch for this run has been queued.
    pub authorized: bool,
}

/// Decoded result of one exam attempt, keyed by the vendor-issued
/// authorization id so re-ingestion stays idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctoredExamGrade {
    pub student_id: i64,
    pub course_id: String,
    pub exam_run_id: i64,
    pub client_authorization_id: i64,
    pub exam_date: DateTime<Utc>,
    pub passing_score: Option<f64>,
    pub score: Option<f64>,
    pub grade: String,
    pub passed: bool,
    pub percentage_grade: f64,
    /// Raw vendor row, kept verbatim for audit and debugging.
    pub row_data: String,
}

/// An authorization joined with its run, as the EAD writer needs it.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub authorization: ExamAuthorization,
    pub run: ExamRun,
}
