use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    pgnscrape::logging::init().context("init logging")?;

    let cli = pgnscrape::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        pgnscrape::cli::Command::Run(args) => {
            pgnscrape::orchestrator::run(args).await.context("run")?;
        }
        pgnscrape::cli::Command::Pending(args) => {
            pgnscrape::orchestrator::pending(args).context("pending")?;
        }
    }

    Ok(())
}
