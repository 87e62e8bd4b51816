use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::{RunArgs, StorageArgs};
use crate::error::ScrapeError;
use crate::fetch::{DEFAULT_WAIT_TIMEOUT, FailurePolicy};

pub const DEFAULT_LISTING_BASE_URL: &str =
    "https://gameknot.com/list_annotated.pl?u=all&c=0&sb=0&rm=0&rn=0&rx=9999&sr=0";
pub const DEFAULT_EXPORT_BASE_URL: &str = "https://gameknot.com/annotate.pl?";
pub const DEFAULT_CANONICAL_HOST: &str = "https://gameknot.com";
pub const DEFAULT_LINKS_DIR: &str = "game_links";
pub const DEFAULT_DOCUMENTS_DIR: &str = "game_pgn_records";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    pub listing_base_url: String,
    pub export_base_url: String,
    pub canonical_host: String,
    pub links_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub wait_timeout: Duration,
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub browser: BrowserOptions,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            listing_base_url: DEFAULT_LISTING_BASE_URL.to_owned(),
            export_base_url: DEFAULT_EXPORT_BASE_URL.to_owned(),
            canonical_host: DEFAULT_CANONICAL_HOST.to_owned(),
            links_dir: PathBuf::from(DEFAULT_LINKS_DIR),
            documents_dir: PathBuf::from(DEFAULT_DOCUMENTS_DIR),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            concurrency: 1,
            failure_policy: FailurePolicy::FailFast,
            browser: BrowserOptions::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Result<Self, ScrapeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `PGNSCRAPE_*` variables found through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ScrapeError> {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("PGNSCRAPE_LISTING_URL") {
            config.listing_base_url = url;
        }
        if let Some(url) = var("PGNSCRAPE_EXPORT_URL") {
            config.export_base_url = url;
        }
        if let Some(host) = var("PGNSCRAPE_HOST") {
            config.canonical_host = host;
        }
        if let Some(dir) = var("PGNSCRAPE_LINKS_DIR") {
            config.links_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("PGNSCRAPE_DOCUMENTS_DIR") {
            config.documents_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var("PGNSCRAPE_WAIT_TIMEOUT_MS") {
            let ms = parse_number("PGNSCRAPE_WAIT_TIMEOUT_MS", &raw)?;
            config.wait_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = var("PGNSCRAPE_CONCURRENCY") {
            config.concurrency = parse_number("PGNSCRAPE_CONCURRENCY", &raw)?;
        }
        if let Some(path) = var("PGNSCRAPE_CHROME") {
            config.browser.chrome_executable = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn apply_storage_args(&mut self, args: &StorageArgs) {
        if let Some(dir) = &args.links_dir {
            self.links_dir = PathBuf::from(dir);
        }
        if let Some(dir) = &args.documents_dir {
            self.documents_dir = PathBuf::from(dir);
        }
    }

    pub fn apply_run_args(&mut self, args: &RunArgs) -> Result<(), ScrapeError> {
        self.apply_storage_args(&args.storage);
        if let Some(ms) = args.wait_timeout_ms {
            self.wait_timeout = Duration::from_millis(ms);
        }
        if let Some(concurrency) = args.concurrency {
            self.concurrency = concurrency;
        }
        if args.keep_going {
            self.failure_policy = FailurePolicy::Isolate;
        }
        if let Some(chrome) = &args.chrome {
            self.browser.chrome_executable = Some(PathBuf::from(chrome));
        }
        if args.headful {
            self.browser.headless = false;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.concurrency == 0 {
            return Err(ScrapeError::configuration("concurrency must be at least 1"));
        }
        if self.wait_timeout.is_zero() {
            return Err(ScrapeError::configuration("wait timeout must be positive"));
        }
        url::Url::parse(&self.canonical_host).map_err(|err| {
            ScrapeError::configuration(format!(
                "canonical host must be an absolute url ({}): {err}",
                self.canonical_host
            ))
        })?;
        Ok(())
    }

    /// Manifest path for `name`; absolute names are used as-is.
    pub fn manifest_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.links_dir.join(name)
    }

    pub fn ensure_storage_dirs(&self) -> anyhow::Result<()> {
        for dir in [&self.links_dir, &self.documents_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create storage dir: {}", dir.display()))?;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ScrapeError> {
    raw.trim()
        .parse()
        .map_err(|_| ScrapeError::configuration(format!("{key} must be a number, got {raw:?}")))
}
