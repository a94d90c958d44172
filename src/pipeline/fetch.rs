// src/pipeline/fetch.rs
//! Fetch pipeline: one task per key, first failure wins, the writer sees either the
//! full record set or nothing.

use std::sync::Arc;

use anyhow::Result;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::ExecContext;
use crate::error::PipelineError;
use crate::model::{KeyRange, Record};
use crate::pipeline::types::{PrimaryFetcher, RecordWriter};

pub struct Fetcher<A, W> {
    api: Arc<A>,
    writer: W,
    max_in_flight: Option<usize>,
}

impl<A, W> Fetcher<A, W>
where
    A: PrimaryFetcher + 'static,
    W: RecordWriter,
{
    pub fn new(api: Arc<A>, writer: W) -> Self {
        Self {
            api,
            writer,
            max_in_flight: None,
        }
    }

    /// Cap the number of lookups running at once. `None` lets every lookup start
    /// immediately. One task is still spawned per key; tasks over the limit wait for a
    /// permit before calling the API.
    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.map(|n| n.max(1));
        self
    }

    /// Fetch every key in `range` and hand the complete set to the writer.
    ///
    /// Returns the first lookup error, the context error, or the writer's result.
    /// An empty range succeeds without calling the writer. Tasks still running when
    /// this returns early are aborted.
    pub async fn fetch(&self, ctx: &ExecContext, range: KeyRange) -> Result<()> {
        super::ensure_metrics_described();
        if range.is_empty() {
            debug!(
                target: "fetch",
                from = range.from,
                to = range.to,
                "empty range, nothing to do"
            );
            return Ok(());
        }

        let t0 = std::time::Instant::now();
        let outcome = self.run(ctx, range).await;
        histogram!("fetch_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        super::mark_run_finished();

        match &outcome {
            Ok(()) => info!(
                target: "fetch",
                from = range.from,
                to = range.to,
                records = range.len(),
                "fetch complete"
            ),
            Err(e) => {
                counter!("fetch_failures_total").increment(1);
                warn!(
                    target: "fetch",
                    from = range.from,
                    to = range.to,
                    error = %e,
                    "fetch failed"
                );
            }
        }
        outcome
    }

    async fn run(&self, ctx: &ExecContext, range: KeyRange) -> Result<()> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }
        let limiter = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));

        let mut tasks: JoinSet<Result<Record>> = JoinSet::new();
        for key in range.keys() {
            let api = Arc::clone(&self.api);
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => Some(sem.acquire_owned().await?),
                    None => None,
                };
                let mut record = api.fetch_record(key).await?;
                record.flatten_references();
                Ok::<_, anyhow::Error>(record)
            });
        }

        let mut records = Vec::with_capacity(range.len());
        loop {
            tokio::select! {
                biased;
                reason = ctx.done() => return Err(reason.into()),
                joined = tasks.join_next() => match joined {
                    Some(Ok(Ok(record))) => {
                        counter!("fetch_records_total").increment(1);
                        records.push(record);
                    }
                    Some(Ok(Err(e))) => return Err(e),
                    Some(Err(join_err)) => return Err(PipelineError::from(join_err).into()),
                    None => break,
                },
            }
        }

        self.writer.write(records).await
    }
}
