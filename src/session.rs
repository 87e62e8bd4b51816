//! The capability set the scraper needs from a driven browser.
//!
//! Harvesting and fetching only talk to these traits, so tests can swap the
//! real browser for a scripted session.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Delay between `find_all` queries while waiting for an element to render.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// XPath expression selecting page elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn expr(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xpath:{}", self.0)
    }
}

#[async_trait]
pub trait PageElement: Send + Sync {
    /// Rendered text of the element.
    async fn text(&self) -> anyhow::Result<String>;

    async fn attribute(&self, name: &str) -> anyhow::Result<Option<String>>;

    /// Move the pointer over the element, then click it.
    async fn hover_and_click(&self) -> anyhow::Result<()>;
}

pub type ElementHandle = Box<dyn PageElement>;

#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&self, url: &str) -> anyhow::Result<()>;

    /// All elements currently matching `locator`, in document order. No
    /// match is an empty list, not an error.
    async fn find_all(&self, locator: &Locator) -> anyhow::Result<Vec<ElementHandle>>;

    /// First element matching `locator`, waiting up to `timeout` for it to
    /// appear. Errors when nothing matches in time.
    async fn find(&self, locator: &Locator, timeout: Duration) -> anyhow::Result<ElementHandle> {
        wait_for_element(self, locator, timeout).await
    }

    async fn hover_and_click(&self, element: &ElementHandle) -> anyhow::Result<()> {
        element.hover_and_click().await
    }
}

/// Re-queries `locator` every [`POLL_INTERVAL`] until it matches or `timeout`
/// elapses. Query errors are returned at once; only an empty match is waited
/// out.
pub async fn wait_for_element<S>(
    session: &S,
    locator: &Locator,
    timeout: Duration,
) -> anyhow::Result<ElementHandle>
where
    S: PageSession + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        let mut found = session.find_all(locator).await?;
        if !found.is_empty() {
            return Ok(found.swap_remove(0));
        }
        let now = Instant::now();
        if now >= deadline {
            anyhow::bail!("no element matches {locator} after {timeout:?}");
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Opens independent sessions, one per fetch worker.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> anyhow::Result<Box<dyn PageSession>>;
}
