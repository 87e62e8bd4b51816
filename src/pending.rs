use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::document_store::scan_document_ids;
use crate::error::ScrapeError;
use crate::formats::GameRecord;

/// Ids with a persisted document, built once per run from the documents
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIndex {
    ids: BTreeSet<u64>,
}

impl DocumentIndex {
    pub fn load(documents_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            ids: scan_document_ids(documents_dir)?,
        })
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Number of stored documents.
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

impl FromIterator<u64> for DocumentIndex {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

pub fn ensure_unique_ids(records: &[GameRecord]) -> Result<(), ScrapeError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id) {
            return Err(ScrapeError::IdentityViolation { id: record.id });
        }
    }
    Ok(())
}

/// Records still lacking a document, in manifest order. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSet {
    records: Vec<GameRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalStats {
    pub already_fetched: usize,
    pub total_distinct_links: usize,
    pub pending: usize,
}

impl PendingSet {
    /// Everything just harvested; storage is not consulted.
    pub fn full_range(records: Vec<GameRecord>) -> Result<Self, ScrapeError> {
        ensure_unique_ids(&records)?;
        Ok(Self { records })
    }

    /// Manifest records whose id has no document yet.
    pub fn incremental(
        manifest: Vec<GameRecord>,
        index: &DocumentIndex,
    ) -> Result<(Self, IncrementalStats), ScrapeError> {
        ensure_unique_ids(&manifest)?;

        let total_distinct_links = manifest
            .iter()
            .map(|r| r.link.as_str())
            .collect::<HashSet<_>>()
            .len();
        let records: Vec<GameRecord> = manifest
            .into_iter()
            .filter(|r| !index.contains(r.id))
            .collect();

        let stats = IncrementalStats {
            already_fetched: index.count(),
            total_distinct_links,
            pending: records.len(),
        };
        Ok((Self { records }, stats))
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.records
    }

    pub fn ids(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
