// src/store/csv_store.rs
//! Intermediate on-disk store: the fetch pipeline writes it, the refresh pipeline
//! streams it back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::PipelineError;
use crate::model::{IncomingRecord, Record};
use crate::pipeline::types::{RecordSource, RecordWriter};

const STREAM_CAPACITY: usize = 64;

/// One CSV row. Header: `id,name,height,weight,flat_references`.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: i64,
    name: String,
    height: i64,
    weight: i64,
    flat_references: String,
}

impl From<&Record> for CsvRow {
    fn from(r: &Record) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            height: r.height,
            weight: r.weight,
            flat_references: r.flat_references.clone(),
        }
    }
}

impl From<CsvRow> for Record {
    fn from(row: CsvRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            height: row.height,
            weight: row.weight,
            references: Vec::new(),
            flat_references: row.flat_references,
            enrichments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_rows(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    // explicit header so an empty set still produces a readable file
    wtr.write_record(["id", "name", "height", "weight", "flat_references"])?;
    for r in records {
        wtr.serialize(CsvRow::from(r))
            .with_context(|| format!("writing record {}", r.id))?;
    }
    wtr.flush().context("flushing csv")?;
    Ok(())
}

#[async_trait]
impl RecordWriter for CsvStore {
    async fn write(&self, records: Vec<Record>) -> Result<()> {
        let path = self.path.clone();
        let n = records.len();
        tokio::task::spawn_blocking(move || write_rows(&path, &records))
            .await
            .map_err(PipelineError::from)??;
        tracing::debug!(target: "store", path = %self.path.display(), records = n, "csv written");
        Ok(())
    }
}

#[async_trait]
impl RecordSource for CsvStore {
    async fn open(&self) -> Result<mpsc::Receiver<IncomingRecord>> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?
            .into_std()
            .await;
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);

        tokio::task::spawn_blocking(move || {
            let mut rdr = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_reader(file);
            for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
                let item = row
                    .map(Record::from)
                    .with_context(|| format!("parsing csv row {}", line + 1));
                let failed = item.is_err();
                if tx.blocking_send(item).is_err() || failed {
                    // consumer gone, or the stream just ended with an error
                    return;
                }
            }
        });

        Ok(rx)
    }
}
