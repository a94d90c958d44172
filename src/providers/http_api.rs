// src/providers/http_api.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{Record, SecondaryEntry};
use crate::pipeline::types::{PrimaryFetcher, SecondaryFetcher};

#[derive(Debug, Deserialize)]
struct RecordPayload {
    id: i64,
    name: String,
    #[serde(default)]
    height: i64,
    #[serde(default)]
    weight: i64,
    #[serde(default)]
    abilities: Vec<AbilitySlot>,
}

#[derive(Debug, Deserialize)]
struct AbilitySlot {
    ability: NamedLink,
}

#[derive(Debug, Deserialize)]
struct NamedLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AbilityPayload {
    #[serde(default)]
    effect_entries: Vec<EffectEntry>,
}

#[derive(Debug, Deserialize)]
struct EffectEntry {
    effect: String,
}

/// Parse a primary lookup body into a record; references are the nested ability urls.
pub fn parse_record(body: &str) -> Result<Record> {
    let p: RecordPayload = serde_json::from_str(body).context("parsing record payload")?;
    Ok(Record {
        id: p.id,
        name: p.name,
        height: p.height,
        weight: p.weight,
        references: p.abilities.into_iter().map(|a| a.ability.url).collect(),
        flat_references: String::new(),
        enrichments: Vec::new(),
    })
}

/// Parse a secondary lookup body; effects keep their response order.
pub fn parse_entry(reference: &str, body: &str) -> Result<SecondaryEntry> {
    let p: AbilityPayload = serde_json::from_str(body)
        .with_context(|| format!("parsing entry payload for {reference}"))?;
    Ok(SecondaryEntry {
        reference: reference.to_string(),
        effects: p.effect_entries.into_iter().map(|e| e.effect).collect(),
    })
}

/// PokeAPI-compatible REST client serving both lookups.
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("enrichment-pipeline/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn record_url(&self, key: i64) -> String {
        format!("{}/pokemon/{key}", self.base_url)
    }

    /// References are usually absolute; anything else is resolved against the base url.
    pub fn reference_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}/{}", self.base_url, reference.trim_start_matches('/'))
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} non-2xx"))?
            .text()
            .await
            .with_context(|| format!("GET {url} .text()"))
    }
}

#[async_trait]
impl PrimaryFetcher for HttpApi {
    async fn fetch_record(&self, key: i64) -> Result<Record> {
        let body = self.get_text(&self.record_url(key)).await?;
        parse_record(&body)
    }
}

#[async_trait]
impl SecondaryFetcher for HttpApi {
    async fn fetch_entry(&self, reference: &str) -> Result<SecondaryEntry> {
        let body = self.get_text(&self.reference_url(reference)).await?;
        parse_entry(reference, &body)
    }
}
