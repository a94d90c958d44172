// tests/common/mod.rs
// Trait mocks shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use enrichment_pipeline::pipeline::types::{
    BatchSaver, PrimaryFetcher, RecordSource, RecordWriter, SecondaryFetcher,
};
use enrichment_pipeline::{IncomingRecord, Record, SecondaryEntry};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("lookup failed for key {0}")]
pub struct LookupFailed(pub i64);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("reference lookup failed: {0}")]
pub struct ReferenceFailed(pub String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("read failed: {0}")]
pub struct ReadFailed(pub String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("save failed on call {0}")]
pub struct SaveFailed(pub usize);

pub fn record(id: i64, flat_references: &str) -> Record {
    Record {
        id,
        name: format!("record-{id}"),
        height: id,
        weight: id * 10,
        flat_references: flat_references.to_string(),
        ..Default::default()
    }
}

/// Small random pause so concurrent tasks interleave differently on each run.
pub async fn jitter(max_ms: u64) {
    if max_ms == 0 {
        return;
    }
    let ms = rand::rng().random_range(0..=max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ---------------------------------------------------------------------------
// Primary fetcher
// ---------------------------------------------------------------------------

/// Returns a record per key with two references `ref-{key}-a` / `ref-{key}-b`.
#[derive(Default)]
pub struct MockApi {
    pub failing: HashSet<i64>,
    pub delay: Duration,
    pub jitter_ms: u64,
    pub calls: AtomicUsize,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight_seen: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(keys: &[i64]) -> Self {
        Self {
            failing: keys.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the lookup future is dropped midway.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PrimaryFetcher for MockApi {
    async fn fetch_record(&self, key: i64) -> Result<Record> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(Arc::clone(&self.in_flight));
        self.max_in_flight_seen.fetch_max(now, Ordering::SeqCst);

        // failing keys fail straight away so the other lookups are still pending
        if self.failing.contains(&key) {
            return Err(LookupFailed(key).into());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        jitter(self.jitter_ms).await;

        Ok(Record {
            id: key,
            name: format!("record-{key}"),
            height: key,
            weight: key * 10,
            references: vec![format!("ref-{key}-a"), format!("ref-{key}-b")],
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Secondary fetcher
// ---------------------------------------------------------------------------

/// Returns `["{reference}:0", "{reference}:1"]` for every reference.
#[derive(Default)]
pub struct MockEffects {
    pub failing: HashSet<String>,
    pub jitter_ms: u64,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub in_flight: Arc<AtomicUsize>,
}

impl MockEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jitter(jitter_ms: u64) -> Self {
        Self {
            jitter_ms,
            ..Self::default()
        }
    }

    pub fn failing_on(refs: &[&str]) -> Self {
        Self {
            failing: refs.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryFetcher for MockEffects {
    async fn fetch_entry(&self, reference: &str) -> Result<SecondaryEntry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(Arc::clone(&self.in_flight));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        jitter(self.jitter_ms).await;

        if self.failing.contains(reference) {
            return Err(ReferenceFailed(reference.to_string()).into());
        }
        Ok(SecondaryEntry {
            reference: reference.to_string(),
            effects: vec![format!("{reference}:0"), format!("{reference}:1")],
        })
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockWriter {
    pub calls: Mutex<Vec<Vec<Record>>>,
    pub fail: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
pub struct DiskFull;

#[async_trait]
impl RecordWriter for MockWriter {
    async fn write(&self, records: Vec<Record>) -> Result<()> {
        self.calls.lock().push(records);
        if self.fail {
            return Err(DiskFull.into());
        }
        Ok(())
    }
}

/// Records every batch; optionally fails on the n-th call (1-based).
#[derive(Default)]
pub struct MockSaver {
    pub batches: Mutex<Vec<Vec<Record>>>,
    pub attempts: AtomicUsize,
    pub fail_on_call: Option<usize>,
}

impl MockSaver {
    pub fn failing_on_call(n: usize) -> Self {
        Self {
            fail_on_call: Some(n),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().clone()
    }

    pub fn saved_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.batches.lock().iter().flatten().map(|r| r.id).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl BatchSaver for MockSaver {
    async fn save(&self, batch: Vec<Record>) -> Result<()> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(n) {
            return Err(SaveFailed(n).into());
        }
        self.batches.lock().push(batch);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Streams a fixed list of items from a background task.
pub struct VecSource {
    items: Mutex<Option<Vec<IncomingRecord>>>,
    pub fail_open: bool,
}

impl VecSource {
    pub fn new(items: Vec<IncomingRecord>) -> Self {
        Self {
            items: Mutex::new(Some(items)),
            fail_open: false,
        }
    }

    pub fn good(n: i64) -> Self {
        Self::new((1..=n).map(|id| Ok(record(id, &format!("ref-{id}")))).collect())
    }

    pub fn failing_open() -> Self {
        Self {
            items: Mutex::new(None),
            fail_open: true,
        }
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn open(&self) -> Result<mpsc::Receiver<IncomingRecord>> {
        if self.fail_open {
            return Err(ReadFailed("cannot open".into()).into());
        }
        let items = self.items.lock().take().unwrap_or_default();
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}
