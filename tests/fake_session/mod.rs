#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pgnscrape::config::ScrapeConfig;
use pgnscrape::fetch::ExportLocators;
use pgnscrape::harvest::RowCategory;
use pgnscrape::session::{
    ElementHandle, Locator, PageElement, PageSession, SessionFactory, wait_for_element,
};

pub const LISTING_BASE: &str = "https://listing.test/list_annotated.pl?u=all";
pub const EXPORT_BASE: &str = "https://listing.test/annotate.pl?";

pub fn test_config(root: &Path) -> ScrapeConfig {
    ScrapeConfig {
        listing_base_url: LISTING_BASE.to_owned(),
        export_base_url: EXPORT_BASE.to_owned(),
        links_dir: root.join("game_links"),
        documents_dir: root.join("game_pgn_records"),
        ..ScrapeConfig::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Hidden locator that becomes visible once this element is clicked.
    pub reveals: Option<Locator>,
}

impl FakeElement {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_attr(name: &str, value: &str) -> Self {
        let mut element = Self::default();
        element.attributes.insert(name.to_owned(), value.to_owned());
        element
    }

    pub fn revealing(mut self, locator: &Locator) -> Self {
        self.reveals = Some(locator.clone());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<Locator, Vec<FakeElement>>,
    hidden: HashSet<Locator>,
    /// Empty `find_all` answers left before a locator starts matching.
    pending_polls: HashMap<Locator, usize>,
}

impl FakePage {
    pub fn with(mut self, locator: &Locator, elements: Vec<FakeElement>) -> Self {
        self.elements.insert(locator.clone(), elements);
        self
    }

    pub fn with_hidden(mut self, locator: &Locator, elements: Vec<FakeElement>) -> Self {
        self.hidden.insert(locator.clone());
        self.with(locator, elements)
    }

    /// `locator` renders only after `polls` empty queries.
    pub fn rendering_after(mut self, locator: &Locator, polls: usize) -> Self {
        self.pending_polls.insert(locator.clone(), polls);
        self
    }

    fn query(&mut self, locator: &Locator) -> Vec<FakeElement> {
        if self.hidden.contains(locator) {
            return Vec::new();
        }
        if let Some(left) = self.pending_polls.get_mut(locator) {
            if *left > 0 {
                *left -= 1;
                return Vec::new();
            }
        }
        self.elements.get(locator).cloned().unwrap_or_default()
    }
}

/// A listing row as (link href, quality title, comment text).
pub type Row<'a> = (&'a str, &'a str, &'a str);

pub fn listing_page(even: &[Row<'_>], odd: &[Row<'_>]) -> FakePage {
    let mut page = FakePage::default();
    for (category, rows) in [(RowCategory::Even, even), (RowCategory::Odd, odd)] {
        let columns = category.columns();
        page = page
            .with(
                &columns.link,
                rows.iter()
                    .map(|(href, _, _)| FakeElement::with_attr("href", href))
                    .collect(),
            )
            .with(
                &columns.quality,
                rows.iter()
                    .map(|(_, title, _)| FakeElement::with_attr("title", title))
                    .collect(),
            )
            .with(
                &columns.comments,
                rows.iter()
                    .map(|(_, _, text)| FakeElement::with_text(text))
                    .collect(),
            );
    }
    page
}

/// Game page whose export menu yields `body` after the two clicks.
pub fn export_page(body: &str) -> FakePage {
    let locators = ExportLocators::default();
    FakePage::default()
        .with(
            &locators.open_menu,
            vec![FakeElement::default().revealing(&locators.get_document)],
        )
        .with_hidden(
            &locators.get_document,
            vec![FakeElement::default().revealing(&locators.text_container)],
        )
        .with_hidden(&locators.text_container, vec![FakeElement::with_text(body)])
}

/// Game page whose export menu never offers the document entry.
pub fn broken_export_page() -> FakePage {
    let locators = ExportLocators::default();
    FakePage::default().with(&locators.open_menu, vec![FakeElement::default()])
}

pub fn listing_url(page: u32) -> String {
    pgnscrape::harvest::listing_url(LISTING_BASE, page)
}

pub fn export_url(id: u64) -> String {
    pgnscrape::fetch::export_url(EXPORT_BASE, id)
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
    timeouts: Arc<Mutex<Vec<Duration>>>,
}

impl CallLog {
    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Timeout passed to each `find`, in call order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("navigate ").map(str::to_owned))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
}

impl FakeSite {
    pub fn page(mut self, url: impl Into<String>, page: FakePage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }
}

type CurrentPage = Arc<Mutex<Option<FakePage>>>;

pub struct FakeSession {
    site: Arc<FakeSite>,
    current: CurrentPage,
    log: CallLog,
}

impl FakeSession {
    pub fn new(site: FakeSite) -> (Self, CallLog) {
        let log = CallLog::default();
        let session = Self {
            site: Arc::new(site),
            current: Arc::new(Mutex::new(None)),
            log: log.clone(),
        };
        (session, log)
    }

    fn handles(&self, elements: Vec<FakeElement>) -> Vec<ElementHandle> {
        elements
            .into_iter()
            .map(|element| {
                Box::new(FakeHandle {
                    element,
                    current: Arc::clone(&self.current),
                    log: self.log.clone(),
                }) as ElementHandle
            })
            .collect()
    }

    fn query(&self, locator: &Locator) -> anyhow::Result<Vec<FakeElement>> {
        let mut current = self.current.lock().unwrap();
        let page = current
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("no page loaded"))?;
        Ok(page.query(locator))
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.log.push(format!("navigate {url}"));
        let page = self
            .site
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 for {url}"))?;
        *self.current.lock().unwrap() = Some(page);
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> anyhow::Result<Vec<ElementHandle>> {
        self.log.push(format!("find_all {locator}"));
        Ok(self.handles(self.query(locator)?))
    }

    async fn find(&self, locator: &Locator, timeout: Duration) -> anyhow::Result<ElementHandle> {
        self.log.push(format!("find {locator}"));
        self.log.timeouts.lock().unwrap().push(timeout);
        wait_for_element(self, locator, timeout).await
    }
}

struct FakeHandle {
    element: FakeElement,
    current: CurrentPage,
    log: CallLog,
}

#[async_trait]
impl PageElement for FakeHandle {
    async fn text(&self) -> anyhow::Result<String> {
        Ok(self.element.text.clone())
    }

    async fn attribute(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.element.attributes.get(name).cloned())
    }

    async fn hover_and_click(&self) -> anyhow::Result<()> {
        self.log.push("click".to_owned());
        if let Some(locator) = &self.element.reveals {
            if let Some(page) = self.current.lock().unwrap().as_mut() {
                page.hidden.remove(locator);
            }
        }
        Ok(())
    }
}

/// Hands out sessions over one shared site and counts how many were opened.
pub struct FakeSessionFactory {
    site: FakeSite,
    opened: AtomicUsize,
    logs: Mutex<Vec<CallLog>>,
}

impl FakeSessionFactory {
    pub fn new(site: FakeSite) -> Arc<Self> {
        Arc::new(Self {
            site,
            opened: AtomicUsize::new(0),
            logs: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Navigations across every session, in the order sessions were opened.
    pub fn navigations(&self) -> Vec<String> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .flat_map(CallLog::navigations)
            .collect()
    }

    /// `find` timeouts across every session.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .flat_map(CallLog::timeouts)
            .collect()
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self) -> anyhow::Result<Box<dyn PageSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (session, log) = FakeSession::new(self.site.clone());
        self.logs.lock().unwrap().push(log);
        Ok(Box::new(session))
    }
}
