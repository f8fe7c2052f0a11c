use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::classify::{classify, classify_code};
use crate::executor::ScriptRunner;
use crate::operation::{BatchOperation, Operation, OperationDescriptor};
use crate::parser::parse_output;
use crate::result::{failure, success, ErrorCode, ErrorRecord, TypedResult};
use crate::script::ScriptCompiler;
use crate::validate::validate_ids;

/// Largest number of ids handed to one interpreter process.
pub const CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: String,
    pub error: String,
    pub code: ErrorCode,
}

/// Per-id outcome of a batch call. Every distinct input id lands in exactly
/// one of the two lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchFailure>,
    pub total_succeeded: usize,
    pub total_failed: usize,
}

impl<T> BatchOutcome<T> {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What one chunk script prints: the host's own per-id error strings.
#[derive(Debug, Deserialize)]
struct ChunkReport {
    succeeded: Vec<BatchItem>,
    failed: Vec<ReportedFailure>,
}

#[derive(Debug, Deserialize)]
struct ReportedFailure {
    id: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Default)]
struct Accumulator {
    succeeded: Vec<BatchItem>,
    failed: Vec<BatchFailure>,
}

impl Accumulator {
    fn fail_all(&mut self, ids: &[String], error: &ErrorRecord) {
        self.failed.extend(ids.iter().map(|id| BatchFailure {
            id: id.clone(),
            error: error.message.clone(),
            code: error.code,
        }));
    }

    /// Keeps only ids that belong to the chunk, once each, in chunk order.
    /// Anything the script did not mention is failed explicitly.
    fn merge(&mut self, ids: &[String], report: ChunkReport) {
        let mut succeeded: HashMap<String, BatchItem> = HashMap::new();
        for item in report.succeeded {
            succeeded.entry(item.id.clone()).or_insert(item);
        }
        let mut failed: HashMap<String, String> = HashMap::new();
        for item in report.failed {
            let error = item
                .error
                .filter(|error| !error.trim().is_empty())
                .unwrap_or_else(|| "Host reported a failure without a message".to_string());
            failed.entry(item.id).or_insert(error);
        }

        for id in ids {
            if let Some(item) = succeeded.remove(id) {
                self.succeeded.push(item);
            } else if let Some(error) = failed.remove(id) {
                let code = classify_code(&error);
                self.failed.push(BatchFailure {
                    id: id.clone(),
                    error,
                    code,
                });
            } else {
                self.failed.push(BatchFailure {
                    id: id.clone(),
                    error: "No result reported for this id".to_string(),
                    code: ErrorCode::AutomationError,
                });
            }
        }
    }

    fn finish(self) -> BatchOutcome<BatchItem> {
        BatchOutcome {
            total_succeeded: self.succeeded.len(),
            total_failed: self.failed.len(),
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

/// Runs `operation` over `ids`. Invalid ids fail the whole call before any
/// process is spawned; after that the call always succeeds and per-id
/// failures are data in the outcome.
pub fn run_batch<R: ScriptRunner>(
    runner: &R,
    compiler: &ScriptCompiler<'_>,
    operation: &BatchOperation,
    ids: &[String],
) -> TypedResult<BatchOutcome<BatchItem>> {
    if ids.is_empty() {
        return failure(ErrorRecord::new(
            ErrorCode::ValidationError,
            "At least one id is required",
        ));
    }
    let ids = match validate_ids("task id", ids) {
        Ok(ids) => ids,
        Err(error) => return failure(error),
    };

    let chunks = ids.len().div_ceil(CHUNK_SIZE);
    tracing::info!(
        operation = operation.name(),
        ids = ids.len(),
        chunks,
        "starting batch"
    );

    let mut acc = Accumulator::default();
    for (index, chunk) in ids.chunks(CHUNK_SIZE).enumerate() {
        let descriptor = OperationDescriptor::new(Operation::BatchChunk {
            operation: operation.clone(),
            ids: chunk.to_vec(),
        });
        let script = match compiler.compile(&descriptor) {
            Ok(script) => script,
            Err(error) => {
                acc.fail_all(chunk, &error);
                continue;
            }
        };

        let raw = runner.run(&script.text);
        if !raw.ok {
            let error = classify(&raw.stderr);
            tracing::warn!(
                chunk = index + 1,
                of = chunks,
                code = %error.code,
                "batch chunk failed as a whole"
            );
            acc.fail_all(chunk, &error);
            continue;
        }
        match parse_output::<ChunkReport>(raw).into_result() {
            Ok(report) => {
                tracing::debug!(
                    chunk = index + 1,
                    of = chunks,
                    succeeded = report.succeeded.len(),
                    failed = report.failed.len(),
                    "batch chunk finished"
                );
                acc.merge(chunk, report);
            }
            Err(error) => {
                tracing::warn!(chunk = index + 1, of = chunks, "batch chunk output unreadable");
                acc.fail_all(chunk, &error);
            }
        }
    }

    let outcome = acc.finish();
    tracing::info!(
        operation = operation.name(),
        succeeded = outcome.total_succeeded,
        failed = outcome.total_failed,
        "batch finished"
    );
    success(outcome)
}
