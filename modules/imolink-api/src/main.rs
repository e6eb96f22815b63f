use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agent_client::AgentClient;
use browserless_client::BrowserlessClient;
use imolink_common::{Config, StrategyKind, Tuning};
use imolink_engine::strategies::{AgentStrategy, DirectStrategy, SearchStrategy};
use imolink_engine::traits::BrowserlessFetcher;
use imolink_engine::{DiscoveryStrategy, Orchestrator};
use imolink_store::PgStore;

mod rest;

pub struct AppState {
    pub store: PgStore,
    pub orchestrator: Orchestrator,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("imolink=info".parse()?))
        .init();

    let config = Config::from_env();
    let tuning = Tuning::from_env();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let shared_store = Arc::new(store.clone());

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

    // On-demand discoveries never race a shutdown flag; requests run to
    // completion.
    let orchestrator = Orchestrator::new(
        shared_store.clone(),
        shared_store,
        strategies,
        tuning,
        Arc::new(AtomicBool::new(false)),
    );

    let state = Arc::new(AppState { store, orchestrator });

    let app = Router::new()
        .route("/", get(rest::health))
        .route("/links/discover", post(rest::discover_link))
        .route("/links", get(rest::list_links))
        .route("/status", get(rest::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!(addr, "Imolink API listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
