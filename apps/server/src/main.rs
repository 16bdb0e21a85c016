//! Process entrypoint: parse `Config` from the environment, open the
//! SQLite pool, run embedded migrations, construct the repository/service
//! graph, then run the scheduler loop until `Ctrl+C`.
//!
//! No HTTP routes live here — the API surface is an explicit
//! out-of-scope collaborator; this binary only runs the ingestion and
//! statistic-rebuild pipeline on a fixed cadence (spec §4.9, §6).

mod config;
mod scheduler_runtime;

use std::sync::Arc;

use wealthfolio_core::fx::FxTable;
use wealthfolio_core::ingestion::backfill::PriceBackfill;
use wealthfolio_core::ingestion::IngestionJobs;
use wealthfolio_core::portfolio::{AssetLifecycle, StatisticBuilder};
use wealthfolio_market_data::{RateLimitGate, TwelveDataProvider};
use wealthfolio_storage_sqlite::{
    build_pool, run_migrations, AssetRepository, BarRepository, FxRateRepository, InstrumentDirectoryRepository,
    StatisticRepository, WriteHandle,
};

use config::Config;
use scheduler_runtime::SchedulerRuntime;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        log::error!("fatal: {err}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let pool = build_pool(&config.database_url)?;
    run_migrations(&pool)?;
    let writer = WriteHandle::open(&config.database_url)?;

    let bar_repo = Arc::new(BarRepository::new(pool.clone(), writer.clone()));
    let directory_repo = Arc::new(InstrumentDirectoryRepository::new(pool.clone(), writer.clone()));
    let fx_repo = Arc::new(FxRateRepository::new(pool.clone(), writer.clone()));
    let asset_repo = Arc::new(AssetRepository::new(pool.clone(), writer.clone()));
    let statistic_repo = Arc::new(StatisticRepository::new(pool.clone(), writer.clone()));

    let fx_table = Arc::new(FxTable::load(fx_repo.load_all()?));

    let rate_limit_gate = Arc::new(RateLimitGate::default());
    let quote_provider = Arc::new(TwelveDataProvider::new(
        config.quote_provider_base_url.clone(),
        config.quote_provider_api_key.clone(),
        rate_limit_gate,
    ));

    let ingestion = Arc::new(IngestionJobs::new(
        bar_repo.clone(),
        directory_repo.clone(),
        fx_repo.clone(),
        quote_provider.clone(),
    ));

    let statistic_builder = Arc::new(StatisticBuilder::new(
        asset_repo.clone(),
        statistic_repo.clone(),
        bar_repo.clone(),
        fx_table.clone(),
    ));

    let backfill = Arc::new(PriceBackfill::new(bar_repo.clone(), quote_provider.clone()));
    // Wired but not called from this process: asset creation/mutation/close
    // are driven by the out-of-scope upstream API boundary (spec §6). This
    // is the hook that boundary calls into once it exists.
    let _asset_lifecycle = AssetLifecycle::new(backfill, statistic_builder.clone());

    log::info!("wealthfolio-server starting, scheduler_tz={}", config.scheduler_tz);
    let runtime = SchedulerRuntime::spawn(ingestion, statistic_builder, config.scheduler_tz).await;

    tokio::signal::ctrl_c().await?;
    log::info!("shutdown signal received, stopping scheduler");
    runtime.abort();

    Ok(())
}
