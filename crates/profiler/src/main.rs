use anyhow::{Context, Result};
use common::config::Config;
use common::moralis::MoralisClient;
use std::path::Path;
use std::time::Instant;

mod addresses;
mod aggregator;
mod batch;
mod cli;
mod fetcher;
mod metrics;
mod report;
mod summary;

use aggregator::WalletAggregator;
use batch::BatchOrchestrator;
use fetcher::{ChainFetcher, FetchSettings};
use report::ReportBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    let args = match cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)? {
        cli::Command::Help => {
            println!("{}", cli::USAGE);
            return Ok(());
        }
        cli::Command::Run(args) => args,
    };

    let config = Config::load(args.config.as_deref().unwrap_or(Config::DEFAULT_PATH))?;

    let (dispatch, _otel_guard) = common::observability::build_dispatch(
        "profiler",
        &config.general.log_level,
        config.general.log_format,
    );
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    if let Some(port) = config.observability.prometheus_port {
        metrics::install_prometheus(port)?;
    }
    metrics::describe();

    let started = Instant::now();
    tracing::info!(started_at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), "profiler starting");

    let addresses_path = args
        .addresses
        .unwrap_or_else(|| config.report.addresses_path.clone());
    let output_path = args
        .output
        .unwrap_or_else(|| config.report.output_path.clone());

    let addresses = addresses::load_addresses(Path::new(&addresses_path))?;
    tracing::info!(
        count = addresses.len(),
        chains = ?config.fetch.chains,
        max_concurrent_wallets = config.batch.max_concurrent_wallets,
        "addresses loaded"
    );

    let client =
        MoralisClient::from_config(&config.provider).context("failed to build provider client")?;
    let fetcher = ChainFetcher::new(client, FetchSettings::from(&config.fetch));
    let aggregator = WalletAggregator::new(fetcher, config.fetch.chains.clone());
    let orchestrator = BatchOrchestrator::new(
        aggregator,
        config.batch.max_concurrent_wallets,
        config.batch.wallet_timeout(),
    );

    let records = orchestrator.run(&addresses).await;
    let degraded = records.iter().filter(|r| r.unavailable_chains() > 0).count();
    if degraded > 0 {
        tracing::warn!(wallets = degraded, "some chains were unavailable; their counts read as zero");
    }

    let report = ReportBuilder::new(config.fetch.chains.clone()).build(records);
    report::write_csv_file(&report, Path::new(&output_path), config.report.mark_unavailable)?;

    tracing::info!(
        output = %output_path,
        rows = report.rows.len(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "report written"
    );
    Ok(())
}
