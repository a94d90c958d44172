// src/pipeline/refresh.rs
//! Refresh pipeline: source -> enrichment worker pool (fan-out) -> merged stream
//! (fan-in) -> fixed-size batches -> saver.
//!
//! The first error observed anywhere wins. It halts the remaining workers through a
//! run-scoped cancellation token, and `refresh` only returns once every worker has
//! finished, so nothing outlives the call.

use std::sync::Arc;

use anyhow::Result;
use metrics::{counter, histogram};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ExecContext;
use crate::error::PipelineError;
use crate::model::{IncomingRecord, Record};
use crate::pipeline::types::{BatchSaver, RecordSource, SecondaryFetcher};

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 2;

pub struct Refresher<R, S, F> {
    source: R,
    saver: S,
    fetcher: Arc<F>,
    workers: usize,
    batch_size: usize,
}

impl<R, S, F> Refresher<R, S, F>
where
    R: RecordSource,
    S: BatchSaver,
    F: SecondaryFetcher + 'static,
{
    pub fn new(source: R, saver: S, fetcher: Arc<F>) -> Self {
        Self {
            source,
            saver,
            fetcher,
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Read, enrich and persist the whole source.
    ///
    /// Batches are saved as soon as they are full; a trailing partial batch is saved
    /// once the stream ends cleanly. Batches saved before a failure stay saved.
    pub async fn refresh(&self, ctx: &ExecContext) -> Result<()> {
        super::ensure_metrics_described();
        let t0 = std::time::Instant::now();

        let outcome = match ctx.err() {
            Some(reason) => Err(anyhow::Error::from(reason)),
            None => match self.source.open().await {
                Ok(queue) => self.run(ctx, queue).await,
                Err(e) => Err(e),
            },
        };

        histogram!("refresh_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        super::mark_run_finished();

        match outcome {
            Ok(saved) => {
                info!(
                    target: "refresh",
                    saved,
                    workers = self.workers,
                    batch_size = self.batch_size,
                    "refresh complete"
                );
                Ok(())
            }
            Err(e) => {
                counter!("refresh_failures_total").increment(1);
                warn!(target: "refresh", error = %e, "refresh failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        queue: mpsc::Receiver<IncomingRecord>,
    ) -> Result<usize> {
        let queue = WorkQueue::new(queue);
        let halt = ctx.child();
        let (tx, merged) = mpsc::channel::<IncomingRecord>(self.workers);

        // fan out
        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let worker = EnrichWorker {
                id,
                queue: queue.clone(),
                fetcher: Arc::clone(&self.fetcher),
                out: tx.clone(),
                halt: halt.token().clone(),
            };
            workers.spawn(worker.run());
        }
        // merged stream closes once every worker has dropped its sender
        drop(tx);

        let outcome = self.persist(ctx, merged).await;
        halt.cancel();

        let mut task_failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(join_err) = joined {
                warn!(target: "refresh", error = %join_err, "enrichment worker failed");
                task_failure.get_or_insert(PipelineError::from(join_err));
            }
        }

        match (outcome, task_failure) {
            (Ok(_), Some(failure)) => Err(failure.into()),
            (outcome, _) => outcome,
        }
    }

    /// Batching stage. Returns the number of records saved.
    async fn persist(
        &self,
        ctx: &ExecContext,
        mut merged: mpsc::Receiver<IncomingRecord>,
    ) -> Result<usize> {
        let mut batch: Vec<Record> = Vec::with_capacity(self.batch_size);
        let mut saved = 0usize;

        loop {
            let item = tokio::select! {
                biased;
                reason = ctx.done() => return Err(reason.into()),
                item = merged.recv() => item,
            };
            let Some(item) = item else { break };

            batch.push(item?);
            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                saved += self.save_batch(full).await?;
            }
        }

        if !batch.is_empty() {
            saved += self.save_batch(batch).await?;
        }
        Ok(saved)
    }

    async fn save_batch(&self, batch: Vec<Record>) -> Result<usize> {
        let n = batch.len();
        self.saver.save(batch).await?;
        counter!("refresh_batches_saved_total").increment(1);
        debug!(target: "refresh", size = n, "batch saved");
        Ok(n)
    }
}

/// Shared source queue. Each item goes to exactly one worker.
#[derive(Clone)]
struct WorkQueue {
    inner: Arc<Mutex<mpsc::Receiver<IncomingRecord>>>,
}

impl WorkQueue {
    fn new(rx: mpsc::Receiver<IncomingRecord>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    async fn next(&self, halt: &CancellationToken) -> Option<IncomingRecord> {
        let mut rx = tokio::select! {
            biased;
            _ = halt.cancelled() => return None,
            guard = self.inner.lock() => guard,
        };
        tokio::select! {
            biased;
            _ = halt.cancelled() => None,
            item = rx.recv() => item,
        }
    }
}

struct EnrichWorker<F> {
    id: usize,
    queue: WorkQueue,
    fetcher: Arc<F>,
    out: mpsc::Sender<IncomingRecord>,
    halt: CancellationToken,
}

impl<F: SecondaryFetcher> EnrichWorker<F> {
    async fn run(self) {
        let mut handled = 0usize;
        while let Some(item) = self.queue.next(&self.halt).await {
            let forwarded = match item {
                Ok(record) => match self.enrich(record).await {
                    Some(enriched) => enriched,
                    None => break,
                },
                Err(e) => Err(e),
            };

            let failed = forwarded.is_err();
            if self.out.send(forwarded).await.is_err() {
                break;
            }
            if failed {
                self.halt.cancel();
                break;
            }
            handled += 1;
        }
        debug!(target: "refresh", worker = self.id, handled, "worker done");
    }

    /// `None` when the run was halted mid-record; the partial record is dropped.
    async fn enrich(&self, mut record: Record) -> Option<IncomingRecord> {
        let mut enrichments = Vec::new();
        for reference in record.reference_list() {
            counter!("refresh_lookups_total").increment(1);
            let entry = tokio::select! {
                biased;
                _ = self.halt.cancelled() => return None,
                entry = self.fetcher.fetch_entry(reference) => entry,
            };
            match entry {
                Ok(entry) => enrichments.extend(entry.effects),
                Err(e) => {
                    debug!(
                        target: "refresh",
                        worker = self.id,
                        id = record.id,
                        reference,
                        "lookup failed"
                    );
                    return Some(Err(e));
                }
            }
        }
        record.enrichments = enrichments;
        counter!("refresh_records_enriched_total").increment(1);
        Some(Ok(record))
    }
}
