use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use agent_client::AgentClient;
use browserless_client::BrowserlessClient;
use imolink_common::{Config, StrategyKind, Tuning};
use imolink_engine::strategies::{AgentStrategy, DirectStrategy, SearchStrategy};
use imolink_engine::traits::BrowserlessFetcher;
use imolink_engine::{DiscoveryStrategy, Orchestrator};
use imolink_store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("imolink=info".parse()?))
        .init();

    info!("Imolink discovery engine starting...");

    let config = Config::from_env();
    let tuning = Tuning::from_env();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store = Arc::new(store);

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_handler(shutdown.clone());

    let fetcher = Arc::new(BrowserlessFetcher::new(
        BrowserlessClient::new(&config.browserless_url, config.browserless_token.as_deref()),
        &tuning,
    ));
    let agent = Arc::new(AgentClient::new(
        &config.agent_url,
        config.agent_token.as_deref(),
    ));

    let strategies: Vec<Arc<dyn DiscoveryStrategy>> = tuning
        .strategy_order
        .iter()
        .map(|kind| -> Arc<dyn DiscoveryStrategy> {
            match kind {
                StrategyKind::Direct => Arc::new(DirectStrategy::new(fetcher.clone())),
                StrategyKind::Search => Arc::new(SearchStrategy::new(fetcher.clone(), &tuning)),
                StrategyKind::Agent => {
                    Arc::new(AgentStrategy::new(agent.clone(), tuning.agent_max_steps))
                }
            }
        })
        .collect();

    let orchestrator = Orchestrator::new(
        store.clone(),
        store.clone(),
        strategies,
        tuning.clone(),
        shutdown.clone(),
    );

    let mut cycle_number = 0u32;
    while !shutdown.load(Ordering::SeqCst) {
        cycle_number += 1;
        match orchestrator.run_cycle(cycle_number).await {
            Ok(stats) => {
                info!(%stats, "Cycle complete");
                sleep_responsive(tuning.cycle_interval, &shutdown).await;
            }
            Err(err) => {
                error!(cycle_number, error = %err, "Cycle aborted, cooling down");
                sleep_responsive(tuning.failure_cooldown, &shutdown).await;
            }
        }
    }

    match store.coverage_report().await {
        Ok(report) => info!(
            total_links = report.total_links,
            platforms_covered = report.platforms_covered,
            localities_covered = report.localities_covered,
            touched_last_day = report.touched_last_day,
            "Final report"
        ),
        Err(err) => warn!(error = %err, "Final report unavailable"),
    }

    info!("Imolink discovery engine stopped");
    Ok(())
}

/// Flip the shutdown flag on SIGINT/SIGTERM. The orchestrator checks it
/// between targets, so the current target finishes before exit.
fn spawn_signal_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        let _ = ctrl_c.await;

        info!("Shutdown requested, finishing current target");
        shutdown.store(true, Ordering::SeqCst);
    });
}

/// Sleep in short slices so a shutdown request does not have to wait out
/// a 12 hour inter-cycle interval.
async fn sleep_responsive(total: Duration, shutdown: &AtomicBool) {
    let slice = Duration::from_secs(1);
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}
