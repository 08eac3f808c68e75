//! End-to-end run: read → dedupe → classify → persist → deliver → summary.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use leadflow_shared::{
    CategoryService, ClassifiedRecord, FallbackReason, InputRecord, LeadSink, LeadStore, Result,
    RunConfig, RunSummary,
};

use crate::classify::{self, classify_record};
use crate::dedup::filter_new;
use crate::dispatch::deliver_record;
use crate::limiter::ChunkedLimiter;
use crate::persist::persist_all;

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each concurrent chunk of a phase completes.
    fn chunk_done(&self, phase: &str, done: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn chunk_done(&self, _phase: &str, _done: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

const PHASE_DEDUP: &str = "Checking for known leads";
const PHASE_CLASSIFY: &str = "Classifying leads";
const PHASE_PERSIST: &str = "Saving leads";
const PHASE_DELIVER: &str = "Delivering leads";

/// One configured run over shared collaborator handles.
///
/// The handles are created once by the caller and shared by every
/// concurrent classification and delivery in the run.
pub struct Pipeline {
    store: Arc<dyn LeadStore>,
    classifier: Arc<dyn CategoryService>,
    sink: Arc<dyn LeadSink>,
    limiter: ChunkedLimiter,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn LeadStore>,
        classifier: Arc<dyn CategoryService>,
        sink: Arc<dyn LeadSink>,
        config: &RunConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            sink,
            limiter: ChunkedLimiter::from_config(config),
        }
    }

    /// Read records from a CSV file and run them. A source error aborts the run.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn run_file(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        progress.phase("Reading records");
        let records = leadflow_source::read_records(path)?;
        Ok(self.run(records, progress).await)
    }

    /// Run a batch through every stage and summarise the outcome.
    ///
    /// Only a source failure (see [`Pipeline::run_file`]) aborts a run. Every
    /// later failure is absorbed and shows up in the returned summary.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn run(&self, records: Vec<InputRecord>, progress: &dyn ProgressReporter) -> RunSummary {
        let start = Instant::now();
        let mut summary = RunSummary {
            total: records.len(),
            ..Default::default()
        };

        info!(
            total = summary.total,
            concurrency = self.limiter.concurrency(),
            "starting run"
        );

        if records.is_empty() {
            return self.finish(summary, start, progress);
        }

        // --- Phase 1: Dedup ---
        progress.phase(PHASE_DEDUP);
        let dedup = filter_new(self.store.as_ref(), records).await;
        summary.skipped = dedup.duplicate_count;
        summary.dedup_failed = dedup.lookup_failed;

        if dedup.new_records.is_empty() {
            info!(skipped = summary.skipped, "no new leads in batch");
            return self.finish(summary, start, progress);
        }

        // --- Phase 2: Classify ---
        progress.phase(PHASE_CLASSIFY);
        let classified = self.classify_all(dedup.new_records, progress).await;
        summary.classified = classified.len();
        for record in &classified {
            summary.categories.record(record.category);
            if record.is_fallback() {
                summary.classification_fallbacks += 1;
            }
        }

        // --- Phase 3: Persist ---
        progress.phase(PHASE_PERSIST);
        let persisted = persist_all(self.store.as_ref(), &classified).await;
        summary.persisted = persisted.count;
        summary.persist_failed = !persisted.success;

        // --- Phase 4: Deliver ---
        // Delivery runs even when persistence failed.
        progress.phase(PHASE_DELIVER);
        let delivered = self.deliver_all(classified, progress).await;
        summary.delivered = delivered.iter().filter(|ok| **ok).count();
        summary.delivery_failed = delivered.len() - summary.delivered;

        self.finish(summary, start, progress)
    }

    async fn classify_all(
        &self,
        records: Vec<InputRecord>,
        progress: &dyn ProgressReporter,
    ) -> Vec<ClassifiedRecord> {
        let results = self
            .limiter
            .run_with_progress(
                records.clone(),
                |record| {
                    let service = Arc::clone(&self.classifier);
                    async move { classify_record(service.as_ref(), record).await }
                },
                |done, total| progress.chunk_done(PHASE_CLASSIFY, done, total),
            )
            .await;

        records
            .into_iter()
            .zip(results)
            .map(|(record, result)| match result {
                Ok(classified) => classified,
                Err(e) => {
                    warn!(email = %record.email, error = %e, "classification task aborted");
                    classify::fallback(record, FallbackReason::ServiceError)
                }
            })
            .collect()
    }

    async fn deliver_all(
        &self,
        records: Vec<ClassifiedRecord>,
        progress: &dyn ProgressReporter,
    ) -> Vec<bool> {
        let results = self
            .limiter
            .run_with_progress(
                records,
                |record| {
                    let sink = Arc::clone(&self.sink);
                    async move { deliver_record(sink.as_ref(), &record).await }
                },
                |done, total| progress.chunk_done(PHASE_DELIVER, done, total),
            )
            .await;

        results
            .into_iter()
            .map(|result| match result {
                Ok(delivered) => delivered,
                Err(e) => {
                    warn!(error = %e, "delivery task aborted");
                    false
                }
            })
            .collect()
    }

    fn finish(
        &self,
        mut summary: RunSummary,
        start: Instant,
        progress: &dyn ProgressReporter,
    ) -> RunSummary {
        summary.elapsed = start.elapsed();

        info!(
            total = summary.total,
            skipped = summary.skipped,
            dedup_failed = summary.dedup_failed,
            classified = summary.classified,
            fallbacks = summary.classification_fallbacks,
            persisted = summary.persisted,
            delivered = summary.delivered,
            delivery_failed = summary.delivery_failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );

        progress.done(&summary);
        summary
    }
}
