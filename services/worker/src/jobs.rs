use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use exam_exchange::audit::{ExamAuditor, S3AuditStore};
use exam_exchange::config::ExchangeConfig;
use exam_exchange::domain::memory::InMemoryExamRepository;
use exam_exchange::export::{ExportPipeline, ExportSummary};
use exam_exchange::import::{ArchivedResponseProcessor, ImportSummary, LogNotifier};
use exam_exchange::retry::{run_with_retry, RetryPolicy};
use exam_exchange::telemetry;
use exam_exchange::transport::SftpTransport;

use crate::cli::RetryArgs;
use crate::error::WorkerError;

fn policy(args: &RetryArgs) -> RetryPolicy {
    RetryPolicy {
        max_attempts: args.max_attempts,
        base_delay: Duration::from_secs(args.base_delay_secs),
    }
}

/// Shared pieces of one job invocation. The repository here is the in-memory
/// one; a deployment embeds the library and binds its own `ExamRepository`
/// over the real store.
struct Stack {
    config: ExchangeConfig,
    repository: Arc<InMemoryExamRepository>,
    auditor: Arc<ExamAuditor<S3AuditStore>>,
    policy: RetryPolicy,
}

fn build_stack(args: &RetryArgs) -> Result<Stack, WorkerError> {
    let config = ExchangeConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let auditor = Arc::new(ExamAuditor::from_config(&config.audit)?);
    Ok(Stack {
        config,
        repository: Arc::new(InMemoryExamRepository::new()),
        auditor,
        policy: policy(args),
    })
}

/// Each attempt owns a fresh SFTP connection: a retryable failure means the
/// previous session is not worth reusing.
fn export_batches(stack: &Stack) -> Result<(ExportSummary, ExportSummary), WorkerError> {
    let profiles = run_with_retry(&stack.policy, "profile export", || {
        let transport = Arc::new(SftpTransport::connect(&stack.config.sftp)?);
        let pipeline = ExportPipeline::new(
            Arc::clone(&stack.repository),
            transport,
            Arc::clone(&stack.auditor),
            stack.config.tmp_dir.clone(),
        );
        pipeline.export_profiles()
    })?;
    let authorizations = run_with_retry(&stack.policy, "authorization export", || {
        let transport = Arc::new(SftpTransport::connect(&stack.config.sftp)?);
        let pipeline = ExportPipeline::new(
            Arc::clone(&stack.repository),
            transport,
            Arc::clone(&stack.auditor),
            stack.config.tmp_dir.clone(),
        );
        pipeline.export_authorizations()
    })?;
    Ok((profiles, authorizations))
}

fn import_results(stack: &Stack) -> Result<ImportSummary, WorkerError> {
    let summary = run_with_retry(&stack.policy, "result import", || {
        let transport = Arc::new(SftpTransport::connect(&stack.config.sftp)?);
        let processor = ArchivedResponseProcessor::new(
            Arc::clone(&stack.repository),
            transport,
            Arc::clone(&stack.auditor),
            Arc::new(LogNotifier),
            stack.config.tmp_dir.clone(),
        );
        processor.process_results()
    })?;
    Ok(summary)
}

pub(crate) fn run_export(args: RetryArgs) -> Result<(), WorkerError> {
    let stack = build_stack(&args)?;
    let (profiles, authorizations) = export_batches(&stack)?;
    info!("export run complete");
    println!(
        "{}",
        serde_json::json!({
            "profiles": profiles,
            "authorizations": authorizations,
        })
    );
    Ok(())
}

pub(crate) fn run_import(args: RetryArgs) -> Result<(), WorkerError> {
    let stack = build_stack(&args)?;
    let results = import_results(&stack)?;
    info!("import run complete");
    println!("{}", serde_json::json!({ "results": results }));
    Ok(())
}

pub(crate) fn run_sync(args: RetryArgs) -> Result<(), WorkerError> {
    let stack = build_stack(&args)?;
    let (profiles, authorizations) = export_batches(&stack)?;
    let results = import_results(&stack)?;
    info!("sync run complete");
    println!(
        "{}",
        serde_json::json!({
            "profiles": profiles,
            "authorizations": authorizations,
            "results": results,
        })
    );
    Ok(())
}
