use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Harvest links and fetch move-record documents.
    Run(RunArgs),
    /// Print the ids an incremental run would fetch, without fetching.
    Pending(PendingArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct StorageArgs {
    /// Directory for link manifests (default: `game_links`).
    #[arg(long)]
    pub links_dir: Option<String>,

    /// Directory for `pgn_<id>.txt` documents (default: `game_pgn_records`).
    #[arg(long)]
    pub documents_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// `url_interval` (harvest a page range) or `new_urls` (fetch what a
    /// manifest lists but storage lacks).
    #[arg(long)]
    pub mode: String,

    /// Manifest to diff against storage, relative to the links directory
    /// (required for `new_urls`).
    #[arg(long)]
    pub reference_url_file: Option<String>,

    /// First listing page, inclusive (required for `url_interval`).
    #[arg(long)]
    pub initial_page: Option<u32>,

    /// Last listing page, inclusive (required for `url_interval`).
    #[arg(long)]
    pub final_page: Option<u32>,

    #[command(flatten)]
    pub storage: StorageArgs,

    /// How long to wait for export controls to render.
    #[arg(long)]
    pub wait_timeout_ms: Option<u64>,

    /// Number of independent browser sessions fetching documents.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keep fetching after a document fails; the run still exits non-zero.
    #[arg(long)]
    pub keep_going: bool,

    /// Chrome/Chromium executable (default: auto-detect).
    #[arg(long)]
    pub chrome: Option<String>,

    /// Show the browser window.
    #[arg(long)]
    pub headful: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PendingArgs {
    /// Manifest to diff against storage, relative to the links directory.
    #[arg(long)]
    pub reference_url_file: String,

    #[command(flatten)]
    pub storage: StorageArgs,
}
