use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

use crate::formats::GameRecord;

pub const MANIFEST_DELIMITER: u8 = b';';
pub const MANIFEST_COLUMNS: [&str; 4] =
    ["game_id", "game_link", "game_quality", "game_comments_qtd"];

/// Fixed manifest name written by incremental runs.
pub const NEW_MANIFEST_NAME: &str = "game_urls_new.csv";

pub fn interval_manifest_name(initial_page: u32, final_page: u32) -> String {
    format!("game_urls_{initial_page}_{final_page}.csv")
}

/// Replaces `path` with a manifest holding `records` in order.
///
/// The header row is always written, even for an empty record set.
pub fn write_manifest(path: &Path, records: &[GameRecord]) -> anyhow::Result<()> {
    let parent_dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("manifest path must have parent: {}", path.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent_dir)
        .with_context(|| format!("create temp manifest in {}", parent_dir.display()))?;

    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(MANIFEST_DELIMITER)
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        writer
            .write_record(MANIFEST_COLUMNS)
            .context("write manifest header")?;
        for record in records {
            writer
                .serialize(record)
                .with_context(|| format!("write manifest row for game {}", record.id))?;
        }
        writer.flush().context("flush manifest")?;
    }
    tmp.as_file_mut().flush().context("flush manifest file")?;

    tmp.persist(path)
        .with_context(|| format!("persist manifest: {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = records.len(), "wrote manifest");
    Ok(())
}

pub fn read_manifest(path: &Path) -> anyhow::Result<Vec<GameRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(MANIFEST_DELIMITER)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("open manifest: {}", path.display()))?;

    let headers = reader.headers().context("read manifest header")?.clone();
    for column in MANIFEST_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("manifest {} is missing column {column}", path.display());
        }
    }

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<GameRecord>().enumerate() {
        // +2: one-based, after the header line.
        let record = row.with_context(|| format!("parse manifest row {}", idx + 2))?;
        records.push(record);
    }
    Ok(records)
}
