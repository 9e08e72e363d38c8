#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::{NaiveDate, TimeZone, Utc};

use exam_exchange::audit::{AuditError, AuditStore};
use exam_exchange::domain::{
    AuthorizationOperation, AuthorizationStatus, ExamAuthorization, ExamProfile, ExamRun,
    ProfileStatus,
};
use exam_exchange::import::OperatorNotifier;
use exam_exchange::transport::{RetryableTransportError, TransportError, VendorTransport};

/// In-memory stand-in for the vendor's SFTP endpoint.
#[derive(Default)]
pub struct FakeTransport {
    remote_results: Mutex<BTreeMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    upload_failures_remaining: AtomicU32,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a result file on the fake server.
    pub fn stage_result(&self, name: &str, payload: Vec<u8>) {
        self.remote_results
            .lock()
            .expect("transport mutex poisoned")
            .insert(name.to_string(), payload);
    }

    /// Make the next `count` uploads fail with a retryable error.
    pub fn fail_uploads(&self, count: u32) {
        self.upload_failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads
            .lock()
            .expect("transport mutex poisoned")
            .clone()
    }

    pub fn remote_files(&self) -> Vec<String> {
        self.remote_results
            .lock()
            .expect("transport mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl VendorTransport for FakeTransport {
    fn list_result_files(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.remote_files())
    }

    fn fetch_result(&self, name: &str, dest_dir: &Path) -> Result<PathBuf, TransportError> {
        let remote = self.remote_results.lock().expect("transport mutex poisoned");
        let payload = remote
            .get(name)
            .ok_or_else(|| RetryableTransportError::new("get", missing(name)))?;
        let path = dest_dir.join(name);
        fs::write(&path, payload).map_err(|source| TransportError::Local {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn upload(&self, local_path: &Path) -> Result<(), TransportError> {
        let remaining = self.upload_failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.upload_failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(RetryableTransportError::new("put", missing("connection reset")).into());
        }
        let name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let payload = fs::read(local_path).map_err(|source| TransportError::Local {
            path: local_path.to_path_buf(),
            source,
        })?;
        self.uploads
            .lock()
            .expect("transport mutex poisoned")
            .push((name, payload));
        Ok(())
    }

    fn remove_result(&self, name: &str) -> Result<(), TransportError> {
        self.remote_results
            .lock()
            .expect("transport mutex poisoned")
            .remove(name);
        Ok(())
    }
}

fn missing(detail: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::ConnectionReset, detail.to_string())
}

/// Audit store that records ciphertext keys and sizes. Clones share the
/// recording, so a test can keep a handle after the auditor takes one.
#[derive(Clone, Default)]
pub struct MemoryAuditStore {
    puts: std::sync::Arc<Mutex<Vec<(String, usize)>>>,
}

impl MemoryAuditStore {
    pub fn keys(&self) -> Vec<String> {
        self.puts
            .lock()
            .expect("audit mutex poisoned")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl AuditStore for MemoryAuditStore {
    fn put(&self, key: &str, ciphertext: &[u8]) -> Result<(), AuditError> {
        self.puts
            .lock()
            .expect("audit mutex poisoned")
            .push((key.to_string(), ciphertext.len()));
        Ok(())
    }
}

/// Notifier that keeps every aggregated message for assertions.
#[derive(Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

impl OperatorNotifier for CollectingNotifier {
    fn notify(&self, _subject: &str, messages: &[String]) {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .extend_from_slice(messages);
    }
}

pub fn profile(student_id: i64) -> ExamProfile {
    ExamProfile {
        student_id,
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

pub fn exam_run(id: i64) -> ExamRun {
    ExamRun {
        id,
        course_id: "course-v1:Test".to_string(),
        exam_series_code: "EX-SERIES".to_string(),
        exam_module: None,
        date_first_schedulable: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        date_last_schedulable: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        date_first_eligible: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        date_last_eligible: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        authorized: true,
    }
}

pub fn authorization(id: i64, student_id: i64, run_id: i64) -> ExamAuthorization {
    ExamAuthorization {
        id,
        student_id,
        course_id: "course-v1:Test".to_string(),
        exam_run_id: run_id,
        operation: AuthorizationOperation::Add,
        status: AuthorizationStatus::Pending,
        exam_taken: false,
        exam_no_show: false,
        exam_coupon_url: None,
        updated_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
    }
}
