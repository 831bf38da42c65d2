use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use doc_stress::configuration::Configuration;
use doc_stress::db::mem::MemStore;
use doc_stress::run::RunController;
use doc_stress::session::{build_workload_mix, WorkloadSessionFactory};
use doc_stress::settings::Settings;
use doc_stress::stats::{LatencyType, ShardedStats, StatsFactory, StatsPrinter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Arc::new(Settings::from_env().context("Failed to read the configuration")?);
    settings.print_settings();

    let mix = Arc::new(build_workload_mix(&settings));

    let stats_factory = StatsFactory::new(mix.len(), settings.measure_latency);
    let mut combined_stats = stats_factory.create();
    let sharded_stats = Arc::new(ShardedStats::new(stats_factory));

    // The dry-run target: an in-memory store, so the generator and mixture
    // overhead can be measured without a server. A real deployment
    // substitutes a driver-backed provisioner here.
    let store = Arc::new(MemStore::new());

    let session_factory = WorkloadSessionFactory::new(
        Arc::clone(&settings),
        Arc::clone(&mix),
        store,
        Arc::clone(&sharded_stats),
    )
    .context("Failed to build the workload")?;

    let config = Configuration {
        max_duration: settings.max_duration,
        users: settings.users,
        rate_limit_per_second: settings.rate_limit_per_second,
        session_factory: Arc::new(session_factory),
    };

    let (ctrl, run_finished) = doc_stress::run::run(config);
    let ctrl = Arc::new(ctrl);

    // Don't care about the leaking task, it won't prevent the runtime
    // from being stopped.
    tokio::task::spawn(stop_on_signal(Arc::clone(&ctrl)));

    // The coordinated-omission fix is only meaningful when operations have
    // scheduled start times, i.e. when a rate limit is set.
    let latency_type = settings.measure_latency.then(|| {
        if settings.rate_limit_per_second.is_some() {
            LatencyType::AdjustedForCoordinatedOmission
        } else {
            LatencyType::Raw
        }
    });
    let printer = StatsPrinter::new(&mix, latency_type);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    futures::pin_mut!(run_finished);

    // Skip the first tick, which is immediate
    ticker.tick().await;

    printer.print_header(&mut std::io::stdout())?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let partial_stats = sharded_stats.get_combined_and_clear();
                printer.print_partial(&partial_stats, &mut std::io::stdout())?;
                combined_stats.combine(&partial_stats);
            }
            result = &mut run_finished => {
                let partial_stats = sharded_stats.get_combined_and_clear();
                combined_stats.combine(&partial_stats);
                if result.is_ok() {
                    printer.print_final(&combined_stats, &mut std::io::stdout())?;
                }
                return result.context("An error occurred during the workload run");
            }
        }
    }
}

async fn stop_on_signal(runner: Arc<RunController>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        runner.ask_to_stop();
    }
}
