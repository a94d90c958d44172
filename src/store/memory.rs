// src/store/memory.rs
//! In-process store used for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::{IncomingRecord, Record};
use crate::pipeline::types::{BatchSaver, RecordGetter, RecordSource, RecordWriter};

/// Keeps written sets and saved batches, and can replay the last written set as a source.
#[derive(Debug, Default)]
pub struct MemoryStore {
    written: Mutex<Vec<Vec<Record>>>,
    batches: Mutex<Vec<Vec<Record>>>,
    cache: Mutex<BTreeMap<i64, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every set passed to `write`, in call order.
    pub fn written(&self) -> Vec<Vec<Record>> {
        self.written.lock().expect("memory store mutex poisoned").clone()
    }

    /// Every batch passed to `save`, in call order.
    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().expect("memory store mutex poisoned").clone()
    }
}

#[async_trait]
impl RecordWriter for MemoryStore {
    async fn write(&self, records: Vec<Record>) -> Result<()> {
        self.written
            .lock()
            .expect("memory store mutex poisoned")
            .push(records);
        Ok(())
    }
}

#[async_trait]
impl BatchSaver for MemoryStore {
    async fn save(&self, batch: Vec<Record>) -> Result<()> {
        {
            let mut cache = self.cache.lock().expect("memory store mutex poisoned");
            for r in &batch {
                cache.insert(r.id, r.clone());
            }
        }
        self.batches
            .lock()
            .expect("memory store mutex poisoned")
            .push(batch);
        Ok(())
    }
}

#[async_trait]
impl RecordGetter for MemoryStore {
    async fn records(&self) -> Result<Vec<Record>> {
        let cache = self.cache.lock().expect("memory store mutex poisoned");
        Ok(cache.values().cloned().collect())
    }
}

#[async_trait]
impl RecordSource for MemoryStore {
    async fn open(&self) -> Result<mpsc::Receiver<IncomingRecord>> {
        let last = self
            .written
            .lock()
            .expect("memory store mutex poisoned")
            .last()
            .cloned()
            .unwrap_or_default();
        let (tx, rx) = mpsc::channel(last.len().max(1));
        for r in last {
            // capacity covers every item, so this never waits
            let _ = tx.try_send(Ok(r));
        }
        Ok(rx)
    }
}
