use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{RecordField, ScrapeError};
use crate::formats::{GameRecord, Quality, RawRow};

/// Query marker that precedes the per-render random token on listing links.
pub const RANDOM_TOKEN_MARKER: &str = "&rnd=";

static GAME_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[?&/])id=([0-9]+)").unwrap_or_else(|err| panic!("game id regex: {err}"))
});

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").unwrap_or_else(|err| panic!("number regex: {err}")));

/// Turns scraped listing strings into records.
///
/// Every row is normalized before the batch is judged; a single unusable
/// field rejects the whole batch.
pub fn normalize_rows(
    rows: &[RawRow],
    canonical_host: &str,
) -> Result<Vec<GameRecord>, ScrapeError> {
    let mut records = Vec::with_capacity(rows.len());
    let mut first_failure: Option<(usize, RecordField, String)> = None;
    let mut nulls = 0_usize;

    for (idx, row) in rows.iter().enumerate() {
        let mut fail = |field: RecordField, raw: &str| {
            nulls += 1;
            if first_failure.is_none() {
                first_failure = Some((idx, field, raw.to_owned()));
            }
        };

        let raw_link = row.link.as_deref().unwrap_or_default();
        let link = normalize_link(raw_link, canonical_host);
        let id = link.as_deref().and_then(extract_game_id);
        if link.is_none() {
            fail(RecordField::Link, raw_link);
        }
        if id.is_none() {
            fail(RecordField::Id, link.as_deref().unwrap_or(raw_link));
        }

        let raw_quality = row.quality_label.as_deref().unwrap_or_default();
        let quality = Quality::from_label(raw_quality);
        if quality.is_none() {
            fail(RecordField::Quality, raw_quality);
        }

        let comment_count = first_number(&row.comments_text);
        if comment_count.is_none() {
            fail(RecordField::CommentCount, &row.comments_text);
        }

        if let (Some(id), Some(link), Some(quality), Some(comment_count)) =
            (id, link, quality, comment_count)
        {
            records.push(GameRecord {
                id,
                link,
                quality,
                comment_count,
            });
        }
    }

    if let Some((row, field, raw)) = first_failure {
        return Err(ScrapeError::Normalization {
            nulls,
            row,
            field,
            raw,
        });
    }

    Ok(records)
}

/// Canonical absolute link for a scraped anchor target.
///
/// Keeps everything before the (last) random-token marker, starting at the
/// first quote when the target is wrapped in a script call, drops quote
/// characters and re-roots the path and query on `canonical_host`.
pub fn normalize_link(raw: &str, canonical_host: &str) -> Option<String> {
    let (head, _token) = raw.rsplit_once(RANDOM_TOKEN_MARKER)?;
    let head = match head.find(['\'', '"']) {
        Some(quote) => &head[quote..],
        None => head,
    };
    let head = head.trim_matches(|c| c == '\'' || c == '"').trim();
    if head.is_empty() {
        return None;
    }

    let path_and_query = match Url::parse(head) {
        Ok(url) if url.has_host() => {
            let mut out = url.path().to_owned();
            if let Some(query) = url.query() {
                out.push('?');
                out.push_str(query);
            }
            out
        }
        _ if head.starts_with('/') => head.to_owned(),
        _ => format!("/{head}"),
    };

    let host = canonical_host.trim_end_matches('/');
    Some(format!("{host}{path_and_query}"))
}

pub fn extract_game_id(link: &str) -> Option<u64> {
    let captures = GAME_ID.captures(link)?;
    let id: u64 = captures.get(1)?.as_str().parse().ok()?;
    (id > 0).then_some(id)
}

/// First run of ASCII digits in `text`.
pub fn first_number(text: &str) -> Option<u32> {
    FIRST_NUMBER.find(text)?.as_str().parse().ok()
}
