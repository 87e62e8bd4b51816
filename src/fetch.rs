use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::error::{FetchStep, ScrapeError};
use crate::formats::Document;
use crate::pending::PendingSet;
use crate::session::{Locator, PageSession};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed controls of the export flow on a game page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLocators {
    pub open_menu: Locator,
    pub get_document: Locator,
    pub text_container: Locator,
}

impl Default for ExportLocators {
    fn default() -> Self {
        Self {
            open_menu: Locator::xpath("//div[@id='anno-footer']/div[@id='anno-links']/a[3]"),
            get_document: Locator::xpath("//div[@class='popmenu']/a[2]"),
            text_container: Locator::xpath("//tr/td/textarea[@id='pgn_code']"),
        }
    }
}

/// What to do with the remaining ids after one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop handing out ids; in-flight fetches still finish.
    #[default]
    FailFast,
    /// Record the failure and keep going.
    Isolate,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub export_base_url: String,
    pub documents_dir: PathBuf,
    pub wait_timeout: Duration,
    pub policy: FailurePolicy,
    pub locators: ExportLocators,
}

pub fn export_url(export_base_url: &str, id: u64) -> String {
    if export_base_url.ends_with(['?', '&']) {
        format!("{export_base_url}id={id}")
    } else {
        format!("{export_base_url}&id={id}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub id: u64,
    pub step: FetchStep,
    pub message: String,
}

impl FetchFailure {
    fn at(id: u64, step: FetchStep) -> impl FnOnce(anyhow::Error) -> Self {
        move |err| Self {
            id,
            step,
            message: format!("{err:#}"),
        }
    }
}

impl From<FetchFailure> for ScrapeError {
    fn from(failure: FetchFailure) -> Self {
        Self::Retrieval {
            id: failure.id,
            step: failure.step,
            message: failure.message,
        }
    }
}

/// Runs the export protocol for one game and returns its document text.
pub async fn fetch_document(
    session: &dyn PageSession,
    options: &FetchOptions,
    id: u64,
) -> Result<Document, ScrapeError> {
    try_fetch(session, options, id).await.map_err(Into::into)
}

async fn try_fetch(
    session: &dyn PageSession,
    options: &FetchOptions,
    id: u64,
) -> Result<Document, FetchFailure> {
    let url = export_url(&options.export_base_url, id);
    session
        .navigate(&url)
        .await
        .with_context(|| format!("navigate: {url}"))
        .map_err(FetchFailure::at(id, FetchStep::Navigate))?;

    click(session, &options.locators.open_menu, options.wait_timeout)
        .await
        .map_err(FetchFailure::at(id, FetchStep::OpenExportMenu))?;
    click(session, &options.locators.get_document, options.wait_timeout)
        .await
        .map_err(FetchFailure::at(id, FetchStep::GetDocument))?;

    let raw_text = read_text(session, &options.locators.text_container, options.wait_timeout)
        .await
        .map_err(FetchFailure::at(id, FetchStep::ReadDocument))?;

    Ok(Document { id, raw_text })
}

async fn click(
    session: &dyn PageSession,
    locator: &Locator,
    timeout: Duration,
) -> anyhow::Result<()> {
    let element = session
        .find(locator, timeout)
        .await
        .with_context(|| format!("locate {locator}"))?;
    session
        .hover_and_click(&element)
        .await
        .with_context(|| format!("click {locator}"))
}

async fn read_text(
    session: &dyn PageSession,
    locator: &Locator,
    timeout: Duration,
) -> anyhow::Result<String> {
    let element = session
        .find(locator, timeout)
        .await
        .with_context(|| format!("locate {locator}"))?;
    element
        .text()
        .await
        .with_context(|| format!("read text of {locator}"))
}

async fn fetch_and_store(
    session: &dyn PageSession,
    options: &FetchOptions,
    id: u64,
) -> Result<PathBuf, FetchFailure> {
    let document = try_fetch(session, options, id).await?;
    crate::document_store::write_document(&options.documents_dir, &document)
        .map_err(FetchFailure::at(id, FetchStep::Persist))
}

/// Outcome of one fetch stage.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub fetched: Vec<u64>,
    pub failed: Vec<FetchFailure>,
    /// Ids never attempted because a fail-fast run stopped early.
    pub skipped: Vec<u64>,
}

impl RunReport {
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            total: 0,
            fetched: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Turns a report with failures into the first retrieval error.
    pub fn into_result(self) -> anyhow::Result<Self> {
        let Some(first) = self.failed.first() else {
            return Ok(self);
        };
        let summary = format!(
            "{} of {} documents failed ({} not attempted)",
            self.failed.len(),
            self.total,
            self.skipped.len()
        );
        Err(anyhow::Error::new(ScrapeError::from(first.clone())).context(summary))
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(self).context("serialize run report")?;
        std::fs::write(path, json).with_context(|| format!("write run report: {}", path.display()))
    }
}

struct WorkQueue {
    ids: Mutex<VecDeque<u64>>,
    stop: AtomicBool,
    done: AtomicUsize,
    total: usize,
    options: FetchOptions,
}

impl WorkQueue {
    fn next_id(&self) -> Option<u64> {
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn remaining(&self) -> Vec<u64> {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}

/// Fetches every pending document, one worker per session.
///
/// Each worker owns its session and pulls ids from a shared queue in
/// pending order, so a single session reproduces the sequential protocol
/// exactly. A failing id never interrupts another worker's in-flight id.
pub async fn fetch_all(
    sessions: Vec<Box<dyn PageSession>>,
    pending: &PendingSet,
    options: &FetchOptions,
) -> anyhow::Result<RunReport> {
    let started_at = Utc::now();
    let ids = pending.ids();
    if ids.is_empty() {
        return Ok(RunReport::empty());
    }
    if sessions.is_empty() {
        anyhow::bail!("no page session available to fetch {} documents", ids.len());
    }

    let position: HashMap<u64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let queue = Arc::new(WorkQueue {
        ids: Mutex::new(ids.iter().copied().collect()),
        stop: AtomicBool::new(false),
        done: AtomicUsize::new(0),
        total: ids.len(),
        options: options.clone(),
    });

    let mut workers = JoinSet::new();
    for (worker, session) in sessions.into_iter().enumerate() {
        let queue = Arc::clone(&queue);
        workers.spawn(async move { run_worker(worker, session, queue).await });
    }

    let mut fetched = Vec::new();
    let mut failed = Vec::new();
    while let Some(joined) = workers.join_next().await {
        let outcomes = joined.context("fetch worker panicked")?;
        for (id, outcome) in outcomes {
            match outcome {
                Ok(_) => fetched.push(id),
                Err(failure) => failed.push(failure),
            }
        }
    }
    fetched.sort_by_key(|id| position.get(id).copied());
    failed.sort_by_key(|f| position.get(&f.id).copied());

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        total: ids.len(),
        fetched,
        failed,
        skipped: queue.remaining(),
    })
}

async fn run_worker(
    worker: usize,
    session: Box<dyn PageSession>,
    queue: Arc<WorkQueue>,
) -> Vec<(u64, Result<PathBuf, FetchFailure>)> {
    let mut outcomes = Vec::new();
    while let Some(id) = queue.next_id() {
        let outcome = fetch_and_store(session.as_ref(), &queue.options, id).await;
        let done = queue.done.fetch_add(1, Ordering::SeqCst) + 1;
        match &outcome {
            Ok(path) => {
                tracing::info!(
                    worker,
                    id,
                    progress = %format!("{done}/{}", queue.total),
                    path = %path.display(),
                    "saved document"
                );
            }
            Err(failure) => {
                tracing::error!(
                    worker,
                    id,
                    progress = %format!("{done}/{}", queue.total),
                    step = %failure.step,
                    error = %failure.message,
                    "fetch failed"
                );
                if queue.options.policy == FailurePolicy::FailFast {
                    queue.stop.store(true, Ordering::SeqCst);
                }
            }
        }
        outcomes.push((id, outcome));
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_url_appends_id_parameter() {
        assert_eq!(
            export_url("https://gameknot.com/annotate.pl?", 12),
            "https://gameknot.com/annotate.pl?id=12"
        );
        assert_eq!(
            export_url("https://gameknot.com/annotate.pl?mode=x", 12),
            "https://gameknot.com/annotate.pl?mode=x&id=12"
        );
    }

    #[test]
    fn report_with_failures_surfaces_retrieval_error() {
        let mut report = RunReport::empty();
        report.total = 3;
        report.fetched = vec![1];
        report.failed = vec![FetchFailure {
            id: 2,
            step: FetchStep::GetDocument,
            message: "element not found".to_owned(),
        }];
        report.skipped = vec![3];

        let err = report.into_result().unwrap_err();

        assert!(err.to_string().contains("1 of 3 documents failed (1 not attempted)"));
        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::Retrieval {
                id: 2,
                step: FetchStep::GetDocument,
                ..
            })
        ));
    }

    #[test]
    fn clean_report_is_success() -> anyhow::Result<()> {
        let mut report = RunReport::empty();
        report.total = 1;
        report.fetched = vec![9];

        assert!(report.is_success());
        assert_eq!(report.into_result()?.fetched, vec![9]);
        Ok(())
    }
}
