use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;

use crate::browser::ChromeSessionFactory;
use crate::cli::{PendingArgs, RunArgs};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::fetch::{ExportLocators, FetchOptions, RunReport, fetch_all};
use crate::harvest::harvest_pages;
use crate::manifest::{NEW_MANIFEST_NAME, interval_manifest_name, read_manifest, write_manifest};
use crate::normalize::normalize_rows;
use crate::pending::{DocumentIndex, PendingSet};
use crate::session::{PageSession, SessionFactory};

pub const RUN_REPORT_NAME: &str = "run_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    UrlInterval,
    NewUrls,
}

impl Mode {
    pub fn parse(raw: &str) -> Result<Self, ScrapeError> {
        match raw {
            "url_interval" => Ok(Self::UrlInterval),
            "new_urls" => Ok(Self::NewUrls),
            other => Err(ScrapeError::configuration(format!(
                "invalid mode {other:?}; expected one of: url_interval, new_urls"
            ))),
        }
    }
}

/// A validated invocation. Building one performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPlan {
    UrlInterval { initial_page: u32, final_page: u32 },
    NewUrls { reference_manifest: String },
}

impl RunPlan {
    pub fn from_args(args: &RunArgs) -> Result<Self, ScrapeError> {
        match Mode::parse(&args.mode)? {
            Mode::UrlInterval => {
                let (Some(initial_page), Some(final_page)) = (args.initial_page, args.final_page)
                else {
                    return Err(ScrapeError::configuration(
                        "url_interval requires --initial-page and --final-page",
                    ));
                };
                if initial_page > final_page {
                    return Err(ScrapeError::configuration(format!(
                        "--initial-page {initial_page} is after --final-page {final_page}"
                    )));
                }
                Ok(Self::UrlInterval {
                    initial_page,
                    final_page,
                })
            }
            Mode::NewUrls => {
                let reference_manifest = args
                    .reference_url_file
                    .clone()
                    .filter(|f| !f.trim().is_empty())
                    .ok_or_else(|| {
                        ScrapeError::configuration("new_urls requires --reference-url-file")
                    })?;
                Ok(Self::NewUrls { reference_manifest })
            }
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::UrlInterval { .. } => Mode::UrlInterval,
            Self::NewUrls { .. } => Mode::NewUrls,
        }
    }
}

/// Wires harvest, manifest persistence, pending resolution and fetching.
pub struct Orchestrator {
    config: ScrapeConfig,
    sessions: Arc<dyn SessionFactory>,
}

impl Orchestrator {
    pub fn new(config: ScrapeConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        Self { config, sessions }
    }

    /// Runs `plan` to completion and writes the run report next to the
    /// manifests. Fetch failures are reported, not returned; see
    /// [`RunReport::into_result`].
    pub async fn execute(&self, plan: &RunPlan) -> anyhow::Result<RunReport> {
        self.config
            .ensure_storage_dirs()
            .context("bootstrap storage")?;

        let report = match plan {
            RunPlan::UrlInterval {
                initial_page,
                final_page,
            } => self.run_url_interval(*initial_page, *final_page).await?,
            RunPlan::NewUrls { reference_manifest } => {
                self.run_new_urls(reference_manifest).await?
            }
        };

        report
            .write_json(&self.config.links_dir.join(RUN_REPORT_NAME))
            .context("write run report")?;
        tracing::info!(
            total = report.total,
            fetched = report.fetched.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "run finished"
        );
        Ok(report)
    }

    async fn run_url_interval(
        &self,
        initial_page: u32,
        final_page: u32,
    ) -> anyhow::Result<RunReport> {
        let session = self.sessions.open().await.context("open harvest session")?;
        let rows = harvest_pages(
            session.as_ref(),
            &self.config.listing_base_url,
            initial_page..=final_page,
        )
        .await
        .context("harvest links")?;
        let records =
            normalize_rows(&rows, &self.config.canonical_host).context("normalize links")?;

        let manifest_path = self
            .config
            .manifest_path(interval_manifest_name(initial_page, final_page));
        write_manifest(&manifest_path, &records).context("persist manifest")?;

        let pending = PendingSet::full_range(records)?;
        self.fetch(pending, Some(session)).await
    }

    async fn run_new_urls(&self, reference_manifest: &str) -> anyhow::Result<RunReport> {
        let reference_path = self.config.manifest_path(reference_manifest);
        let manifest = read_manifest(&reference_path)
            .with_context(|| format!("load reference manifest: {}", reference_path.display()))?;
        let index = DocumentIndex::load(&self.config.documents_dir).context("index documents")?;

        let (pending, stats) = PendingSet::incremental(manifest, &index)?;
        tracing::info!(
            downloaded = stats.already_fetched,
            total = stats.total_distinct_links,
            pending = stats.pending,
            "resolved pending documents"
        );

        write_manifest(&self.config.manifest_path(NEW_MANIFEST_NAME), pending.records())
            .context("persist pending manifest")?;
        self.fetch(pending, None).await
    }

    async fn fetch(
        &self,
        pending: PendingSet,
        harvest_session: Option<Box<dyn PageSession>>,
    ) -> anyhow::Result<RunReport> {
        if pending.is_empty() {
            tracing::info!("no pending documents");
            return Ok(RunReport::empty());
        }

        let wanted = self.config.concurrency.clamp(1, pending.len());
        let mut sessions = Vec::with_capacity(wanted);
        sessions.extend(harvest_session);
        while sessions.len() < wanted {
            let session = self.sessions.open().await.context("open fetch session")?;
            sessions.push(session);
        }
        sessions.truncate(wanted);

        fetch_all(sessions, &pending, &self.fetch_options())
            .await
            .context("fetch documents")
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            export_base_url: self.config.export_base_url.clone(),
            documents_dir: self.config.documents_dir.clone(),
            wait_timeout: self.config.wait_timeout,
            policy: self.config.failure_policy,
            locators: ExportLocators::default(),
        }
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let plan = RunPlan::from_args(&args)?;
    let mut config = ScrapeConfig::from_env()?;
    config.apply_run_args(&args)?;
    tracing::info!(
        mode = ?plan.mode(),
        links_dir = %config.links_dir.display(),
        documents_dir = %config.documents_dir.display(),
        concurrency = config.concurrency,
        "starting run"
    );

    let chrome = Arc::new(ChromeSessionFactory::new(config.browser.clone()));
    let orchestrator = Orchestrator::new(config, Arc::clone(&chrome) as Arc<dyn SessionFactory>);
    let outcome = orchestrator.execute(&plan).await;
    if let Err(err) = chrome.shutdown().await {
        tracing::warn!(?err, "chrome shutdown failed");
    }

    outcome?.into_result()?;
    Ok(())
}

pub fn pending(args: PendingArgs) -> anyhow::Result<()> {
    let mut config = ScrapeConfig::from_env()?;
    config.apply_storage_args(&args.storage);

    let reference_path = config.manifest_path(&args.reference_url_file);
    let manifest = read_manifest(&reference_path)
        .with_context(|| format!("load reference manifest: {}", reference_path.display()))?;
    let index = if config.documents_dir.exists() {
        DocumentIndex::load(&config.documents_dir).context("index documents")?
    } else {
        DocumentIndex::default()
    };

    let (pending, stats) = PendingSet::incremental(manifest, &index)?;
    tracing::info!(
        downloaded = stats.already_fetched,
        total = stats.total_distinct_links,
        pending = stats.pending,
        "resolved pending documents"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for id in pending.ids() {
        writeln!(out, "{id}").context("write pending id")?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}
