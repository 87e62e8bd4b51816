use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::Document;

const DOCUMENT_PREFIX: &str = "pgn_";
const DOCUMENT_SUFFIX: &str = ".txt";

pub fn document_file_name(id: u64) -> String {
    format!("{DOCUMENT_PREFIX}{id}{DOCUMENT_SUFFIX}")
}

pub fn document_path(documents_dir: &Path, id: u64) -> PathBuf {
    documents_dir.join(document_file_name(id))
}

/// Game id encoded in a `pgn_<id>.txt` file name.
pub fn parse_document_file_name(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(DOCUMENT_PREFIX)?
        .strip_suffix(DOCUMENT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Writes the body verbatim. Readers never observe a half-written file.
pub fn write_document(documents_dir: &Path, document: &Document) -> anyhow::Result<PathBuf> {
    let path = document_path(documents_dir, document.id);
    let mut tmp = tempfile::NamedTempFile::new_in(documents_dir)
        .with_context(|| format!("create temp document in {}", documents_dir.display()))?;
    tmp.write_all(document.raw_text.as_bytes())
        .with_context(|| format!("write document body for game {}", document.id))?;
    tmp.flush().context("flush document")?;
    tmp.persist(&path)
        .with_context(|| format!("persist document: {}", path.display()))?;
    Ok(path)
}

/// Ids of every document already persisted in `documents_dir`.
///
/// Files not named `pgn_<id>.txt` are ignored.
pub fn scan_document_ids(documents_dir: &Path) -> anyhow::Result<BTreeSet<u64>> {
    let mut ids = BTreeSet::new();
    for entry in std::fs::read_dir(documents_dir)
        .with_context(|| format!("read documents dir: {}", documents_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match parse_document_file_name(name) {
            Some(id) => {
                ids.insert(id);
            }
            None => tracing::debug!(file = name, "skipping non-document file"),
        }
    }
    Ok(ids)
}
