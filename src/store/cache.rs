// src/store/cache.rs
//! Redis-backed record cache: one hash, field = record id, value = record JSON.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;

use crate::model::Record;
use crate::pipeline::types::{BatchSaver, RecordGetter};

pub const DEFAULT_CACHE_KEY: &str = "records";

pub struct RedisCache {
    client: redis::Client,
    key: String,
}

impl RedisCache {
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let client = redis::Client::open(url).with_context(|| format!("redis url {url}"))?;
        Ok(Self {
            client,
            key: key.to_string(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("redis connect")
    }
}

/// Hash fields for one batch.
pub fn encode_batch(batch: &[Record]) -> Result<Vec<(String, String)>> {
    batch
        .iter()
        .map(|r| {
            let json = serde_json::to_string(r)
                .with_context(|| format!("encoding record {}", r.id))?;
            Ok((r.id.to_string(), json))
        })
        .collect()
}

pub fn decode_records<I>(values: I) -> Result<Vec<Record>>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<Record> = values
        .into_iter()
        .map(|v| serde_json::from_str(&v).context("decoding cached record"))
        .collect::<Result<_>>()?;
    out.sort_by_key(|r| r.id);
    Ok(out)
}

#[async_trait]
impl BatchSaver for RedisCache {
    async fn save(&self, batch: Vec<Record>) -> Result<()> {
        let fields = encode_batch(&batch)?;
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let _: () = conn
            .hset_multiple(&self.key, fields.as_slice())
            .await
            .context("redis HSET")?;
        Ok(())
    }
}

#[async_trait]
impl RecordGetter for RedisCache {
    async fn records(&self) -> Result<Vec<Record>> {
        let mut conn = self.connection().await?;
        let raw: std::collections::HashMap<String, String> =
            conn.hgetall(&self.key).await.context("redis HGETALL")?;
        decode_records(raw.into_values())
    }
}
