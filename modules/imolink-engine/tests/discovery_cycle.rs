//! End-to-end orchestration: real strategies wired over the mocked
//! fetcher, agent, and store, driven through full cycles via the public
//! API. No network, no renderer, no database.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use agent_client::AgentRun;
use imolink_common::types::LinkKey;
use imolink_common::{StrategyKind, Tuning};
use imolink_engine::strategies::{AgentStrategy, DirectStrategy};
use imolink_engine::testing::{
    locality, operation, platform, MemStore, MockAgent, MockFetcher, MockPage,
};
use imolink_engine::{DiscoveryStrategy, Orchestrator};

fn fast_tuning(order: Vec<StrategyKind>) -> Tuning {
    Tuning {
        strategy_order: order,
        inter_target_min: Duration::from_millis(1),
        inter_target_max: Duration::from_millis(2),
        locality_pause: Duration::from_millis(1),
        ..Tuning::default()
    }
}

fn listing_page(url: &str, title: &str, count: &str) -> MockPage {
    MockPage::new(url)
        .title(title)
        .texts("[data-testid=\"results-title\"]", &[count])
}

fn key(platform_id: i32, operation_type_id: i32, locality_id: i32) -> LinkKey {
    LinkKey {
        platform_id,
        operation_type_id,
        state_id: 1,
        locality_id,
    }
}

#[tokio::test]
async fn full_cycle_discovers_every_target_then_skips_them_while_fresh() {
    let store = Arc::new(MemStore::with_reference(
        vec![locality(1, "Curitiba", "PR"), locality(2, "Pinhais", "PR")],
        vec![platform(1, "VivaReal")],
        vec![operation(1, "VENDA"), operation(2, "ALUGUEL")],
    ));

    let fetcher = Arc::new(MockFetcher::default());
    for (loc, slug) in [("Curitiba", "curitiba"), ("Pinhais", "pinhais")] {
        for op in ["venda", "aluguel"] {
            let url = format!("https://www.vivareal.com.br/{op}/pr/{slug}/");
            fetcher.on_open(
                &url,
                listing_page(&url, &format!("Imóveis em {loc}"), "1.234 imóveis"),
            );
        }
    }

    let strategies: Vec<Arc<dyn DiscoveryStrategy>> =
        vec![Arc::new(DirectStrategy::new(fetcher))];
    let orchestrator = Orchestrator::new(
        store.clone(),
        store.clone(),
        strategies,
        fast_tuning(vec![StrategyKind::Direct]),
        Arc::new(AtomicBool::new(false)),
    );

    let stats = orchestrator.run_cycle(1).await.expect("first cycle failed");
    assert_eq!(stats.processed, 4);
    assert_eq!(stats.succeeded, 4);
    assert_eq!(stats.failed, 0);

    assert_eq!(store.link_count(), 4);
    let row = store.link(&key(1, 2, 2)).expect("Pinhais rental link missing");
    assert_eq!(row.url, "https://www.vivareal.com.br/aluguel/pr/pinhais/");
    assert_eq!(row.status, "discovered");

    let log = store.log_entries();
    assert_eq!(log.len(), 4);
    assert!(log.iter().all(|entry| entry.engine_used == "direct"));

    // Everything is younger than the TTL now, so a rerun does no work.
    let stats = orchestrator.run_cycle(2).await.expect("second cycle failed");
    assert_eq!(stats.processed, 4);
    assert_eq!(stats.skipped, 4);
    assert_eq!(store.link_count(), 4);
    assert_eq!(store.recorded_cycles().len(), 2);
}

#[tokio::test]
async fn agent_strategy_covers_targets_the_direct_strategy_cannot_reach() {
    let store = Arc::new(MemStore::with_reference(
        vec![locality(1, "Araucária", "PR")],
        vec![platform(1, "VivaReal")],
        vec![operation(1, "VENDA")],
    ));

    // No pages registered: every direct navigation times out.
    let fetcher = Arc::new(MockFetcher::default());
    let agent = Arc::new(MockAgent::with_run(AgentRun {
        status: "done".into(),
        success: Some(true),
        final_result: Some(
            r#"{"url":"https://www.vivareal.com.br/venda/pr/araucaria/","title":"Imóveis à venda em Araucária","item_count":"98 imóveis"}"#
                .into(),
        ),
        steps: vec![],
    }));

    let strategies: Vec<Arc<dyn DiscoveryStrategy>> = vec![
        Arc::new(DirectStrategy::new(fetcher)),
        Arc::new(AgentStrategy::new(agent.clone(), 40)),
    ];
    let orchestrator = Orchestrator::new(
        store.clone(),
        store.clone(),
        strategies,
        fast_tuning(vec![StrategyKind::Direct, StrategyKind::Agent]),
        Arc::new(AtomicBool::new(false)),
    );

    let stats = orchestrator.run_cycle(1).await.expect("cycle failed");
    assert_eq!(stats.succeeded, 1);

    let row = store.link(&key(1, 1, 1)).expect("link missing");
    assert_eq!(row.url, "https://www.vivareal.com.br/venda/pr/araucaria/");
    assert!(!row.search_term.is_empty(), "agent task should be recorded");

    let log = store.log_entries();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].engine_used, "agent");
    assert_eq!(log[0].note.as_deref(), Some("98 imóveis"));

    // The delegated task names the platform domain.
    let tasks = agent.tasks();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].contains("www.vivareal.com.br"));
}
