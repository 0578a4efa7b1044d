use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use radio_srec::app::build_recorders;
use radio_srec::config::RecorderConfig;
use radio_srec::logging::init_logging;
use radio_srec::scheduler::Supervisor;
use radio_srec::utils::clock::{Clock, SystemClock};
use radio_srec::utils::fs::ensure_dir_all_with_op;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Record every program of every station, forever.
#[derive(Debug, Parser)]
#[command(name = "radio-srec", version, about)]
struct Args {
    /// Directory recordings are written to
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = RecorderConfig::from_env()?;

    let (logging, _guard) = init_logging(&config.log_dir)?;
    if let Some(filter) = config.log_filter.as_deref()
        && let Err(e) = logging.set_filter(filter)
    {
        warn!(error = %e, "Ignoring configured log filter");
    }
    debug!(filter = %logging.get_filter(), log_dir = %config.log_dir.display(), "Logging initialized");

    let cancel = CancellationToken::new();
    logging.start_retention_cleanup(cancel.child_token());

    ensure_dir_all_with_op("creating output directory", &args.output_dir).await?;
    info!(
        output_dir = %args.output_dir.display(),
        version = env!("CARGO_PKG_VERSION"),
        "radio-srec starting"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let recorders = build_recorders(&config, &args.output_dir, clock).await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for ctrl-c");
            return;
        }
        info!("Shutdown requested");
        shutdown.cancel();
    });

    let report = Supervisor::new(cancel.clone(), config.supervisor_config())
        .run(recorders)
        .await;
    cancel.cancel();

    let completed: u64 = report.workers.iter().map(|w| w.completed).sum();
    info!(
        workers = report.workers.len(),
        crashed = report.crashed,
        completed,
        "radio-srec stopped"
    );
    Ok(())
}
