use std::fmt;

use crate::harvest::RowCategory;

/// Failures that end a scrape run.
///
/// Glue code carries these inside `anyhow::Error`; callers that need the
/// category recover it with `err.downcast_ref::<ScrapeError>()`.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error(
        "page {page}: {category} rows have mismatched columns \
         (links={links}, qualities={qualities}, comments={comments})"
    )]
    ExtractionShape {
        page: u32,
        category: RowCategory,
        links: usize,
        qualities: usize,
        comments: usize,
    },

    #[error("{nulls} field(s) failed normalization; first at row {row}: {field} from {raw:?}")]
    Normalization {
        nulls: usize,
        row: usize,
        field: RecordField,
        raw: String,
    },

    #[error("duplicate game id entering the fetch stage: {id}")]
    IdentityViolation { id: u64 },

    #[error("game {id}: {step} failed: {message}")]
    Retrieval {
        id: u64,
        step: FetchStep,
        message: String,
    },
}

impl ScrapeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Link,
    Id,
    Quality,
    CommentCount,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Link => "game_link",
            Self::Id => "game_id",
            Self::Quality => "game_quality",
            Self::CommentCount => "game_comments_qtd",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStep {
    Navigate,
    OpenExportMenu,
    GetDocument,
    ReadDocument,
    Persist,
}

impl fmt::Display for FetchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigate => "navigate to export page",
            Self::OpenExportMenu => "open export menu",
            Self::GetDocument => "select get-document entry",
            Self::ReadDocument => "read document text",
            Self::Persist => "persist document",
        };
        f.write_str(name)
    }
}
