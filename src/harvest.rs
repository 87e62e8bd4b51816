use std::fmt;
use std::ops::RangeInclusive;

use anyhow::Context as _;

use crate::error::ScrapeError;
use crate::formats::RawRow;
use crate::session::{Locator, PageSession};

/// The two alternating row styles of the listing table, scraped in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCategory {
    Even,
    Odd,
}

impl RowCategory {
    pub const ALL: [Self; 2] = [Self::Even, Self::Odd];

    pub fn class_name(self) -> &'static str {
        match self {
            Self::Even => "evn_list",
            Self::Odd => "odd_list",
        }
    }

    pub fn columns(self) -> ColumnLocators {
        let row = format!("//tr[@class=\"{}\"]/td[5]", self.class_name());
        ColumnLocators {
            link: Locator::xpath(format!("{row}/a[1]")),
            quality: Locator::xpath(format!("{row}/table[1]/tbody[1]/tr[1]/td[1]/div[1]/div[1]")),
            comments: Locator::xpath(format!("{row}/a[2]")),
        }
    }
}

impl fmt::Display for RowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Three parallel column queries over the same row locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLocators {
    pub link: Locator,
    pub quality: Locator,
    pub comments: Locator,
}

pub fn listing_url(listing_base: &str, page: u32) -> String {
    format!("{}&p={page}", listing_base.trim_end_matches('&'))
}

/// Scrapes every page in `pages`, concatenating rows in page order.
///
/// Any session error or column mismatch aborts the whole harvest; nothing
/// scraped so far is returned.
pub async fn harvest_pages(
    session: &dyn PageSession,
    listing_base: &str,
    pages: RangeInclusive<u32>,
) -> anyhow::Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for page in pages {
        let url = listing_url(listing_base, page);
        tracing::info!(page, %url, "harvest: listing page");
        let page_rows = harvest_page(session, &url, page)
            .await
            .with_context(|| format!("harvest listing page {page}"))?;
        tracing::debug!(page, rows = page_rows.len(), "harvest: page done");
        rows.extend(page_rows);
    }
    Ok(rows)
}

pub async fn harvest_page(
    session: &dyn PageSession,
    url: &str,
    page: u32,
) -> anyhow::Result<Vec<RawRow>> {
    session
        .navigate(url)
        .await
        .with_context(|| format!("navigate: {url}"))?;

    let mut rows = Vec::new();
    for category in RowCategory::ALL {
        rows.extend(harvest_category(session, page, category).await?);
    }
    Ok(rows)
}

async fn harvest_category(
    session: &dyn PageSession,
    page: u32,
    category: RowCategory,
) -> anyhow::Result<Vec<RawRow>> {
    let columns = category.columns();
    let links = session
        .find_all(&columns.link)
        .await
        .with_context(|| format!("query {category} links"))?;
    let qualities = session
        .find_all(&columns.quality)
        .await
        .with_context(|| format!("query {category} qualities"))?;
    let comments = session
        .find_all(&columns.comments)
        .await
        .with_context(|| format!("query {category} comment counts"))?;

    if links.len() != qualities.len() || links.len() != comments.len() {
        return Err(ScrapeError::ExtractionShape {
            page,
            category,
            links: links.len(),
            qualities: qualities.len(),
            comments: comments.len(),
        }
        .into());
    }

    let mut rows = Vec::with_capacity(links.len());
    for ((link, quality), comment) in links.iter().zip(&qualities).zip(&comments) {
        rows.push(RawRow {
            link: link.attribute("href").await.context("read link href")?,
            quality_label: quality.attribute("title").await.context("read quality title")?,
            comments_text: comment.text().await.context("read comment count text")?,
        });
    }
    Ok(rows)
}
