//! Post-spin pipeline: persist, verify, print
//!
//! Persist runs alongside the upload→print chain. Print waits for the
//! verifier's checksum only when upload is enabled; otherwise it goes out
//! immediately without one. Every task failure is caught here and folded
//! into the [`PipelineReport`]; `run` itself cannot fail. With a task
//! timeout set, a collaborator that never answers counts as a failure.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture};

use qs_stage::{PipelineReport, TaskStatus};

use crate::error::{PersistError, PrintError, UploadError};
use crate::outcome::{checksum, Outcome};

/// Which pipeline tasks run for a spin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineFlags {
    pub persist: bool,
    pub upload: bool,
    pub print: bool,
}

impl PipelineFlags {
    pub fn none() -> Self {
        Self {
            persist: false,
            upload: false,
            print: false,
        }
    }

    pub fn all() -> Self {
        Self {
            persist: true,
            upload: true,
            print: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.persist || self.upload || self.print)
    }
}

impl Default for PipelineFlags {
    fn default() -> Self {
        Self::all()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Content-addressed blob storage
pub trait QuoteStore: Send + Sync {
    fn store<'a>(&'a self, key: &'a str, blob: &'a [u8]) -> BoxFuture<'a, Result<(), PersistError>>;
}

/// Remote attestation verification; returns the verifier's checksum
pub trait QuoteVerifier: Send + Sync {
    fn verify<'a>(&'a self, blob: &'a [u8]) -> BoxFuture<'a, Result<String, UploadError>>;
}

/// Receipt rendering and dispatch
pub trait ReceiptPrinter: Send + Sync {
    fn print<'a>(
        &'a self,
        outcome: &'a Outcome,
        checksum: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), PrintError>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Best-effort side-effect fan-out after a spin settles
#[derive(Clone, Default)]
pub struct PostSpinPipeline {
    store: Option<Arc<dyn QuoteStore>>,
    verifier: Option<Arc<dyn QuoteVerifier>>,
    printer: Option<Arc<dyn ReceiptPrinter>>,
    task_timeout: Option<Duration>,
}

impl PostSpinPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn QuoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn QuoteVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_printer(mut self, printer: Arc<dyn ReceiptPrinter>) -> Self {
        self.printer = Some(printer);
        self
    }

    /// Bound each store/upload/print call
    pub fn with_task_timeout(mut self, limit: Duration) -> Self {
        self.task_timeout = Some(limit);
        self
    }

    /// Run the enabled tasks for `outcome`
    pub async fn run(&self, outcome: &Outcome, flags: PipelineFlags) -> PipelineReport {
        let blob = outcome.blob();
        let key = checksum(&blob);

        let persist = self.persist(&key, &blob, flags.persist);
        let upload_then_print = async {
            let (upload, verified) = self.upload(&blob, flags.upload).await;
            let print = self.print(outcome, verified.as_deref(), flags.print).await;
            (upload, verified, print)
        };

        let (persist, (upload, verified_checksum, print)) =
            future::join(persist, upload_then_print).await;

        let report = PipelineReport {
            checksum: key,
            persist,
            upload,
            verified_checksum,
            print,
        };
        if report.is_clean() {
            log::info!("[Pipeline] Done for {}", short(&report.checksum));
        } else {
            log::warn!(
                "[Pipeline] Done for {} with {} failed task(s)",
                short(&report.checksum),
                report.failures()
            );
        }
        report
    }

    async fn persist(&self, key: &str, blob: &[u8], enabled: bool) -> TaskStatus {
        if !enabled {
            return TaskStatus::Skipped;
        }
        let Some(store) = &self.store else {
            log::warn!("[Pipeline] Persist enabled but no store attached");
            return TaskStatus::Skipped;
        };
        match self.bounded(store.store(key, blob)).await {
            Ok(()) => {
                log::debug!("[Pipeline] Stored {} bytes as {}", blob.len(), short(key));
                TaskStatus::Succeeded
            }
            Err(e) => {
                log::warn!("[Pipeline] Persist failed: {}", e);
                TaskStatus::Failed(e)
            }
        }
    }

    async fn upload(&self, blob: &[u8], enabled: bool) -> (TaskStatus, Option<String>) {
        if !enabled {
            return (TaskStatus::Skipped, None);
        }
        let Some(verifier) = &self.verifier else {
            log::warn!("[Pipeline] Upload enabled but no verifier attached");
            return (TaskStatus::Skipped, None);
        };
        match self.bounded(verifier.verify(blob)).await {
            Ok(verified) => {
                log::info!("[Pipeline] Verifier accepted quote: {}", verified);
                (TaskStatus::Succeeded, Some(verified))
            }
            Err(e) => {
                log::warn!("[Pipeline] Upload failed: {}", e);
                (TaskStatus::Failed(e), None)
            }
        }
    }

    async fn print(&self, outcome: &Outcome, checksum: Option<&str>, enabled: bool) -> TaskStatus {
        if !enabled {
            return TaskStatus::Skipped;
        }
        let Some(printer) = &self.printer else {
            log::warn!("[Pipeline] Print enabled but no printer attached");
            return TaskStatus::Skipped;
        };
        match self.bounded(printer.print(outcome, checksum)).await {
            Ok(()) => TaskStatus::Succeeded,
            Err(e) => {
                log::warn!("[Pipeline] Print failed: {}", e);
                TaskStatus::Failed(e)
            }
        }
    }

    async fn bounded<T, E: fmt::Display>(
        &self,
        work: BoxFuture<'_, Result<T, E>>,
    ) -> Result<T, String> {
        let result = match self.task_timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| format!("timed out after {} ms", limit.as_millis()))?,
            None => work.await,
        };
        result.map_err(|e| e.to_string())
    }
}

fn short(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}
