//! Batch exam exchange with the Pearson VUE testing vendor.
//!
//! The vendor supports no synchronous API; everything moves as fixed-column
//! TSV files over SFTP. Outbound candidate demographics (CDD) and exam
//! authorizations (EAD) are produced by the [`export`] pipeline; inbound
//! confirmation and result archives (VCDC, EAC, EXAM) are ingested by the
//! [`import`] pipeline. Every payload exchanged is sealed-box encrypted and
//! written to durable object storage by [`audit`], whether or not the
//! transfer itself succeeds.
//!
//! Persistence is an external collaborator reached only through
//! [`domain::repository::ExamRepository`]; scheduling and its retry/backoff
//! contract live behind [`retry`].

pub mod archive;
pub mod audit;
pub mod config;
pub mod domain;
pub mod export;
pub mod import;
pub mod retry;
pub mod telemetry;
pub mod transport;
pub mod tsv;
