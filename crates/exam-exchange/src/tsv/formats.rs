//! The five vendor file formats. Column order is a byte-exact contract, so
//! each row struct lists its fields in wire order and carries the vendor
//! column names as serde renames.

use std::io::Read;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{self, FieldError};
use super::{CodecError, DecodeOutcome, EncodeOutcome, RejectedRecord};
use crate::domain::{ExamProfile, PendingAuthorization};

/// CDD: outbound candidate demographics.
#[derive(Debug, Serialize)]
struct CddRow {
    #[serde(rename = "ClientCandidateID")]
    client_candidate_id: i64,
    #[serde(rename = "FirstName")]
    first_name: String,
    #[serde(rename = "LastName")]
    last_name: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Address1")]
    address1: String,
    #[serde(rename = "Address2")]
    address2: Option<String>,
    #[serde(rename = "Address3")]
    address3: Option<String>,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "PostalCode")]
    postal_code: String,
    #[serde(rename = "Country")]
    country: String,
    #[serde(rename = "Phone")]
    phone: String,
    #[serde(rename = "PhoneCountryCode")]
    phone_country_code: String,
    #[serde(rename = "LastUpdate")]
    last_update: String,
}

impl CddRow {
    fn from_profile(profile: &ExamProfile) -> Result<Self, FieldError> {
        let phone = fields::split_phone(&profile.phone)?;
        Ok(Self {
            client_candidate_id: profile.student_id,
            first_name: fields::flat("FirstName", &profile.first_name)?,
            last_name: fields::flat("LastName", &profile.last_name)?,
            email: fields::flat("Email", &profile.email)?,
            address1: fields::flat("Address1", &profile.address1)?,
            address2: fields::flat_opt("Address2", profile.address2.as_deref())?,
            address3: fields::flat_opt("Address3", profile.address3.as_deref())?,
            city: fields::flat("City", &profile.city)?,
            state: fields::state_code(&profile.state_or_territory),
            postal_code: fields::flat("PostalCode", &profile.postal_code)?,
            country: fields::country_alpha3(&profile.country)?,
            phone: phone.number,
            phone_country_code: phone.country_code,
            last_update: fields::format_datetime(profile.updated_at),
        })
    }
}

/// EAD: outbound exam authorizations.
#[derive(Debug, Serialize)]
struct EadRow {
    #[serde(rename = "AuthorizationTransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "ClientAuthorizationID")]
    client_authorization_id: i64,
    #[serde(rename = "ClientCandidateID")]
    client_candidate_id: i64,
    #[serde(rename = "ExamSeriesCode")]
    exam_series_code: String,
    #[serde(rename = "Modules")]
    modules: Option<String>,
    /// Always empty; accommodations go through the vendor's own channel.
    #[serde(rename = "Accommodations")]
    accommodations: String,
    #[serde(rename = "EligibilityApptDateFirst")]
    eligibility_appt_date_first: String,
    #[serde(rename = "EligibilityApptDateLast")]
    eligibility_appt_date_last: String,
    #[serde(rename = "LastUpdate")]
    last_update: String,
}

impl EadRow {
    fn from_pending(pending: &PendingAuthorization) -> Result<Self, FieldError> {
        let authorization = &pending.authorization;
        let run = &pending.run;
        Ok(Self {
            transaction_type: authorization.operation.transaction_type(),
            client_authorization_id: authorization.id,
            client_candidate_id: authorization.student_id,
            exam_series_code: fields::flat("ExamSeriesCode", &run.exam_series_code)?,
            modules: fields::flat_opt("Modules", run.exam_module.as_deref())?,
            accommodations: String::new(),
            eligibility_appt_date_first: fields::format_date(run.date_first_eligible),
            eligibility_appt_date_last: fields::format_date(run.date_last_eligible),
            last_update: fields::format_datetime(authorization.updated_at),
        })
    }
}

/// Encode pending profiles as a CDD file. Records the codec refuses are
/// excluded from the payload and surfaced in `rejected`.
pub fn encode_cdd(profiles: &[ExamProfile]) -> Result<EncodeOutcome, CodecError> {
    encode_batch(profiles, CddRow::from_profile)
}

/// Encode pending authorizations as an EAD file.
pub fn encode_ead(pending: &[PendingAuthorization]) -> Result<EncodeOutcome, CodecError> {
    encode_batch(pending, EadRow::from_pending)
}

fn encode_batch<Record, Row: Serialize>(
    records: &[Record],
    convert: impl Fn(&Record) -> Result<Row, FieldError>,
) -> Result<EncodeOutcome, CodecError> {
    let mut rows = Vec::with_capacity(records.len());
    let mut accepted = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match convert(record) {
            Ok(row) => {
                rows.push(row);
                accepted.push(index);
            }
            Err(err) => rejected.push(RejectedRecord {
                index,
                reason: err.to_string(),
            }),
        }
    }
    Ok(EncodeOutcome {
        payload: super::write_rows(&rows)?,
        accepted,
        rejected,
    })
}

/// VCDC: inbound confirmation of a CDD row.
#[derive(Debug, Deserialize)]
pub struct VcdcRow {
    #[serde(rename = "ClientCandidateID")]
    pub client_candidate_id: i64,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Date", deserialize_with = "fields::vendor_datetime_de")]
    pub date: DateTime<Utc>,
    #[serde(rename = "Message", default)]
    pub message: String,
}

impl VcdcRow {
    /// The vendor flags soft problems by keeping `Accepted` but putting a
    /// WARNING marker in the message; those still count as failures.
    pub fn accepted(&self) -> bool {
        self.status == "Accepted" && !self.message.contains("WARNING")
    }
}

/// EAC: inbound confirmation of an EAD row.
#[derive(Debug, Deserialize)]
pub struct EacRow {
    #[serde(rename = "ClientAuthorizationID")]
    pub client_authorization_id: i64,
    #[serde(rename = "ClientCandidateID")]
    pub client_candidate_id: i64,
    #[serde(rename = "Date", deserialize_with = "fields::vendor_datetime_de")]
    pub date: DateTime<Utc>,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

impl EacRow {
    pub fn accepted(&self) -> bool {
        self.status == "Accepted" && !self.message.contains("WARNING")
    }
}

/// EXAM: inbound exam result. No-show rows carry no numeric grade cells.
#[derive(Debug, Deserialize)]
pub struct ExamResultRow {
    #[serde(rename = "RegistrationID")]
    pub registration_id: i64,
    #[serde(rename = "ClientCandidateID")]
    pub client_candidate_id: i64,
    #[serde(rename = "ClientAuthorizationID", deserialize_with = "fields::empty_i64")]
    pub client_authorization_id: Option<i64>,
    #[serde(rename = "ExamSeriesCode")]
    pub exam_series_code: String,
    #[serde(rename = "ExamName")]
    pub exam_name: String,
    #[serde(rename = "ExamRevision", default)]
    pub exam_revision: String,
    #[serde(rename = "Form", default)]
    pub form: String,
    #[serde(rename = "ExamLanguage", default)]
    pub exam_language: String,
    #[serde(rename = "Attempt", deserialize_with = "fields::empty_u32")]
    pub attempt: Option<u32>,
    #[serde(rename = "ExamDate", deserialize_with = "fields::vendor_datetime_de")]
    pub exam_date: DateTime<Utc>,
    #[serde(rename = "TimeUsed", default)]
    pub time_used: String,
    #[serde(rename = "PassingScore", deserialize_with = "fields::empty_f64")]
    pub passing_score: Option<f64>,
    #[serde(rename = "Score", deserialize_with = "fields::empty_f64")]
    pub score: Option<f64>,
    #[serde(rename = "Grade", default)]
    pub grade: String,
    #[serde(rename = "NoShow", deserialize_with = "fields::vendor_bool")]
    pub no_show: bool,
    #[serde(rename = "NDARefused", deserialize_with = "fields::vendor_bool")]
    pub nda_refused: bool,
    #[serde(rename = "Correct", deserialize_with = "fields::empty_u32")]
    pub correct: Option<u32>,
    #[serde(rename = "Incorrect", deserialize_with = "fields::empty_u32")]
    pub incorrect: Option<u32>,
    #[serde(rename = "Skipped", deserialize_with = "fields::empty_u32")]
    pub skipped: Option<u32>,
    #[serde(rename = "Unscored", deserialize_with = "fields::empty_u32")]
    pub unscored: Option<u32>,
    #[serde(rename = "Voucher", deserialize_with = "fields::empty_string_as_none", default)]
    pub voucher: Option<String>,
}

pub fn decode_vcdc<R: Read>(reader: R) -> DecodeOutcome<VcdcRow> {
    super::read_rows(reader)
}

pub fn decode_eac<R: Read>(reader: R) -> DecodeOutcome<EacRow> {
    super::read_rows(reader)
}

/// EXAM rows keep the raw tab-joined vendor line for the audit trail.
pub fn decode_exam<R: Read>(reader: R) -> DecodeOutcome<(ExamResultRow, String)> {
    super::read_rows_with_raw(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AuthorizationOperation, AuthorizationStatus, ExamAuthorization, ExamRun, ProfileStatus,
    };
    use chrono::{NaiveDate, TimeZone};

    fn profile() -> ExamProfile {
        ExamProfile {
            student_id: 14879,
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            email: "jane@example.com".to_string(),
            address1: "1 Main St, Room B345".to_string(),
            address2: None,
            address3: None,
            city: "Boston".to_string(),
            state_or_territory: "US-MA".to_string(),
            country: "US".to_string(),
            postal_code: "02115".to_string(),
            phone: "+1 617 293-3423".to_string(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            status: ProfileStatus::Pending,
        }
    }

    fn pending_authorization() -> PendingAuthorization {
        PendingAuthorization {
            authorization: ExamAuthorization {
                id: 143,
                student_id: 14879,
                course_id: "course-v1:Test".to_string(),
                exam_run_id: 7,
                operation: AuthorizationOperation::Add,
                status: AuthorizationStatus::Pending,
                exam_taken: false,
                exam_no_show: false,
                exam_coupon_url: None,
                updated_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            },
            run: ExamRun {
                id: 7,
                course_id: "course-v1:Test".to_string(),
                exam_series_code: "EX-SERIES".to_string(),
                exam_module: None,
                date_first_schedulable: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                date_last_schedulable: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
                date_first_eligible: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                date_last_eligible: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
                authorized: true,
            },
        }
    }

    #[test]
    fn cdd_row_matches_vendor_contract() {
        let outcome = encode_cdd(&[profile()]).expect("encode succeeds");
        let text = String::from_utf8(outcome.payload).expect("utf-8 payload");
        let mut lines = text.split("\r\n");
        assert_eq!(
            lines.next(),
            Some(
                "ClientCandidateID\tFirstName\tLastName\tEmail\tAddress1\tAddress2\tAddress3\
                 \tCity\tState\tPostalCode\tCountry\tPhone\tPhoneCountryCode\tLastUpdate"
            )
        );
        assert_eq!(
            lines.next(),
            Some(
                "14879\tJane\tSmith\tjane@example.com\t1 Main St, Room B345\t\t\tBoston\tMA\
                 \t02115\tUSA\t6172933423\t1\t2026/03/04 05:06:07"
            )
        );
        assert_eq!(outcome.accepted, vec![0]);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn cdd_excludes_records_with_bad_phone_numbers() {
        let mut bad = profile();
        bad.student_id = 14880;
        bad.phone = "617-293-3423".to_string();
        let outcome = encode_cdd(&[profile(), bad]).expect("encode succeeds");
        assert_eq!(outcome.accepted, vec![0]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].index, 1);
        assert!(outcome.rejected[0].reason.contains("international format"));

        let text = String::from_utf8(outcome.payload).expect("utf-8 payload");
        assert_eq!(text.matches("\r\n").count(), 2); // header + one row
    }

    #[test]
    fn cdd_excludes_records_with_unknown_country() {
        let mut bad = profile();
        bad.country = "XX".to_string();
        let outcome = encode_cdd(&[bad]).expect("encode succeeds");
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert!(outcome.rejected[0].reason.contains("alpha-3"));
    }

    #[test]
    fn ead_row_matches_vendor_contract() {
        let outcome = encode_ead(&[pending_authorization()]).expect("encode succeeds");
        let text = String::from_utf8(outcome.payload).expect("utf-8 payload");
        let mut lines = text.split("\r\n");
        assert_eq!(
            lines.next(),
            Some(
                "AuthorizationTransactionType\tClientAuthorizationID\tClientCandidateID\
                 \tExamSeriesCode\tModules\tAccommodations\tEligibilityApptDateFirst\
                 \tEligibilityApptDateLast\tLastUpdate"
            )
        );
        assert_eq!(
            lines.next(),
            Some("add\t143\t14879\tEX-SERIES\t\t\t2026/04/01\t2026/06/30\t2026/03/04 05:06:07")
        );
    }

    #[test]
    fn ead_update_operation_changes_transaction_type() {
        let mut pending = pending_authorization();
        pending.authorization.operation = AuthorizationOperation::Update;
        let outcome = encode_ead(&[pending]).expect("encode succeeds");
        let text = String::from_utf8(outcome.payload).expect("utf-8 payload");
        assert!(text.contains("\r\nupdate\t143\t"));
    }

    #[test]
    fn vcdc_accepted_rules() {
        let data = "ClientCandidateID\tStatus\tDate\tMessage\r\n\
                    14879\tAccepted\t2026/05/01 09:00:00\t\r\n\
                    14880\tAccepted\t2026/05/01 09:00:00\tWARNING: address truncated\r\n\
                    14881\tError\t2026/05/01 09:00:00\tInvalid address\r\n";
        let outcome = decode_vcdc(data.as_bytes());
        assert!(outcome.invalid.is_empty());
        assert_eq!(outcome.rows.len(), 3);
        assert!(outcome.rows[0].accepted());
        assert!(!outcome.rows[1].accepted());
        assert!(!outcome.rows[2].accepted());
    }

    #[test]
    fn exam_no_show_row_parses_without_grade_cells() {
        let data = "RegistrationID\tClientCandidateID\tClientAuthorizationID\tExamSeriesCode\
                    \tExamName\tExamRevision\tForm\tExamLanguage\tAttempt\tExamDate\tTimeUsed\
                    \tPassingScore\tScore\tGrade\tNoShow\tNDARefused\tCorrect\tIncorrect\
                    \tSkipped\tUnscored\tVoucher\r\n\
                    991\t14879\t143\tEX-SERIES\tTest Exam\t\t\tENU\t1\t2026/05/01 09:00:00\t\
                    \t\t\t\t1\t0\t\t\t\t\t\r\n";
        let outcome = decode_exam(data.as_bytes());
        assert!(outcome.invalid.is_empty(), "invalid: {:?}", outcome.invalid);
        let (row, raw) = &outcome.rows[0];
        assert!(row.no_show);
        assert_eq!(row.client_authorization_id, Some(143));
        assert!(row.score.is_none());
        assert!(row.passing_score.is_none());
        assert!(raw.starts_with("991\t14879\t143"));
    }

    #[test]
    fn exam_invalid_rows_do_not_drop_siblings() {
        let data = "RegistrationID\tClientCandidateID\tClientAuthorizationID\tExamSeriesCode\
                    \tExamName\tExamRevision\tForm\tExamLanguage\tAttempt\tExamDate\tTimeUsed\
                    \tPassingScore\tScore\tGrade\tNoShow\tNDARefused\tCorrect\tIncorrect\
                    \tSkipped\tUnscored\tVoucher\r\n\
                    991\t14879\t143\tEX-SERIES\tTest Exam\t\t\tENU\t1\tnot-a-date\t\
                    \t\t\t\t1\t0\t\t\t\t\t\r\n\
                    992\t14879\t144\tEX-SERIES\tTest Exam\t\t\tENU\t1\t2026/05/01 09:00:00\t01:30\
                    \t60\t71\tpass\t0\t0\t40\t12\t2\t0\tV-1\r\n";
        let outcome = decode_exam(data.as_bytes());
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.invalid.len(), 1);
        let (row, _) = &outcome.rows[0];
        assert_eq!(row.score, Some(71.0));
        assert_eq!(row.grade, "pass");
        assert_eq!(row.voucher.as_deref(), Some("V-1"));
    }
}
