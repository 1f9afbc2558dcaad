use color_eyre::eyre::{WrapErr, eyre};
use crl_watch::{
    config::Config,
    crl::FileArchive,
    monitor::{CrlMonitor, HttpCrlFetcher},
    targets::JsonTargetRegistry,
    telemetry,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load().wrap_err("Failed to load configuration")?;
    info!("Loaded configuration: {:?}", config);

    let fetcher =
        HttpCrlFetcher::new(config.monitor.timeout()).wrap_err("Failed to build HTTP client")?;
    let registry = JsonTargetRegistry::new(&config.storage.targets_file);
    let archive_dir = config.storage.archive_dir.clone();

    let monitor = CrlMonitor::new(
        fetcher,
        registry,
        config.monitor.distribution_points.iter().cloned(),
        |url| FileArchive::for_distribution_point(&archive_dir, url),
    )
    .with_check_interval(config.monitor.check_interval());

    let restored = monitor.restore_all().await;
    info!("Restored {} CRL snapshots from the archive", restored);

    if config.monitor.run_once {
        let results = monitor.run_all().await;
        let failed = results.iter().filter(|(_, result)| result.is_err()).count();
        if failed > 0 {
            return Err(eyre!("{failed} of {} CRL checks failed", results.len()));
        }
        return Ok(());
    }

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
