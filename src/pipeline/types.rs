// src/pipeline/types.rs
//! Narrow capability traits the orchestrators are built from. Each orchestrator receives
//! exactly the capabilities it needs.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::{IncomingRecord, Record, SecondaryEntry};

/// Resolves one key to one record.
#[async_trait]
pub trait PrimaryFetcher: Send + Sync {
    async fn fetch_record(&self, key: i64) -> Result<Record>;
}

/// Resolves one reference to its enrichment data.
#[async_trait]
pub trait SecondaryFetcher: Send + Sync {
    async fn fetch_entry(&self, reference: &str) -> Result<SecondaryEntry>;
}

/// Persists a complete record set in one call.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn write(&self, records: Vec<Record>) -> Result<()>;
}

/// Persists one batch; each call succeeds or fails as a whole.
#[async_trait]
pub trait BatchSaver: Send + Sync {
    async fn save(&self, batch: Vec<Record>) -> Result<()>;
}

/// Produces a finite stream of records. Fails here if the source cannot be opened;
/// failures after that arrive as a final `Err` item.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn open(&self) -> Result<mpsc::Receiver<IncomingRecord>>;
}

/// Reads back everything persisted by a [`BatchSaver`].
#[async_trait]
pub trait RecordGetter: Send + Sync {
    async fn records(&self) -> Result<Vec<Record>>;
}

#[async_trait]
impl<T: PrimaryFetcher + ?Sized> PrimaryFetcher for Arc<T> {
    async fn fetch_record(&self, key: i64) -> Result<Record> {
        (**self).fetch_record(key).await
    }
}

#[async_trait]
impl<T: SecondaryFetcher + ?Sized> SecondaryFetcher for Arc<T> {
    async fn fetch_entry(&self, reference: &str) -> Result<SecondaryEntry> {
        (**self).fetch_entry(reference).await
    }
}

#[async_trait]
impl<T: RecordWriter + ?Sized> RecordWriter for Arc<T> {
    async fn write(&self, records: Vec<Record>) -> Result<()> {
        (**self).write(records).await
    }
}

#[async_trait]
impl<T: BatchSaver + ?Sized> BatchSaver for Arc<T> {
    async fn save(&self, batch: Vec<Record>) -> Result<()> {
        (**self).save(batch).await
    }
}

#[async_trait]
impl<T: RecordSource + ?Sized> RecordSource for Arc<T> {
    async fn open(&self) -> Result<mpsc::Receiver<IncomingRecord>> {
        (**self).open().await
    }
}

#[async_trait]
impl<T: RecordGetter + ?Sized> RecordGetter for Arc<T> {
    async fn records(&self) -> Result<Vec<Record>> {
        (**self).records().await
    }
}
