// src/model.rs
use serde::{Deserialize, Serialize};

/// Separator used when references are flattened into a single column.
pub const REFERENCE_DELIMITER: char = '|';

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub height: i64,
    pub weight: i64,
    /// Raw secondary references as returned by the primary lookup.
    #[serde(default)]
    pub references: Vec<String>,
    /// `references` joined with `|`; this is what survives the CSV round trip.
    #[serde(default)]
    pub flat_references: String,
    /// Effect strings attached by the refresh stage, in reference order.
    #[serde(default)]
    pub enrichments: Vec<String>,
}

impl Record {
    /// Derive `flat_references` from the nested reference list.
    pub fn flatten_references(&mut self) {
        let mut flat = String::new();
        for (i, r) in self.references.iter().enumerate() {
            if i > 0 {
                flat.push(REFERENCE_DELIMITER);
            }
            flat.push_str(r);
        }
        self.flat_references = flat;
    }

    /// References to look up during enrichment. Empty segments are skipped.
    pub fn reference_list(&self) -> impl Iterator<Item = &str> {
        self.flat_references
            .split(REFERENCE_DELIMITER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A record travelling through a pipeline stage, or the failure that replaced it.
pub type IncomingRecord = anyhow::Result<Record>;

/// Result of a single secondary lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecondaryEntry {
    pub reference: String,
    pub effects: Vec<String>,
}

/// Inclusive key interval. `to < from` is simply empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub from: i64,
    pub to: i64,
}

impl KeyRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        usize::try_from(self.to.abs_diff(self.from).saturating_add(1)).unwrap_or(usize::MAX)
    }

    pub fn keys(&self) -> std::ops::RangeInclusive<i64> {
        self.from..=self.to
    }
}
