//! Freshness gate: skip targets whose persisted link is younger than the
//! TTL. The gate fails open; a store hiccup must never silently drop
//! coverage, so lookup errors mean "not fresh, do the work".

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use imolink_common::types::DiscoveryTarget;
use imolink_store::LinkStore;

/// True iff a link exists for the target and was touched within the TTL
/// of `now`. Comparison is strict: a link aged exactly the TTL is stale.
pub async fn should_skip(
    store: &dyn LinkStore,
    target: &DiscoveryTarget,
    ttl: Duration,
    now: DateTime<Utc>,
) -> bool {
    let ttl = match chrono::Duration::from_std(ttl) {
        Ok(d) => d,
        Err(_) => chrono::Duration::hours(24),
    };

    match store.find_link(&target.key()).await {
        Ok(Some(link)) => now - link.last_touched() < ttl,
        Ok(None) => false,
        Err(err) => {
            warn!(target = %target, error = %err, "Freshness lookup failed, treating as stale");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    use imolink_common::types::{LinkStatus, NewLink};
    use crate::testing::{target, MemStore};

    const TTL: Duration = Duration::from_secs(24 * 3600);

    fn store_with_link_aged(age: ChronoDuration) -> MemStore {
        let store = MemStore::default();
        let t = target("Curitiba", "PR", "VivaReal", "VENDA");
        store.seed_link_at(
            &t.key(),
            NewLink {
                url: "https://www.vivareal.com.br/venda/pr/curitiba/".into(),
                search_term: String::new(),
                result_position: 1,
                status: LinkStatus::Discovered,
            },
            Utc::now() - age,
        );
        store
    }

    #[tokio::test]
    async fn fresh_link_is_skipped() {
        let store = store_with_link_aged(ChronoDuration::hours(1));
        let now = Utc::now();
        assert!(should_skip(&store, &target("Curitiba", "PR", "VivaReal", "VENDA"), TTL, now).await);
    }

    #[tokio::test]
    async fn ttl_boundary_is_strict() {
        let now = Utc::now();
        let store =
            store_with_link_aged(ChronoDuration::hours(23) + ChronoDuration::minutes(59));
        assert!(should_skip(&store, &target("Curitiba", "PR", "VivaReal", "VENDA"), TTL, now).await);

        let store =
            store_with_link_aged(ChronoDuration::hours(24) + ChronoDuration::minutes(1));
        assert!(!should_skip(&store, &target("Curitiba", "PR", "VivaReal", "VENDA"), TTL, now).await);
    }

    #[tokio::test]
    async fn missing_link_is_not_skipped() {
        let store = MemStore::default();
        assert!(!should_skip(&store, &target("Curitiba", "PR", "VivaReal", "VENDA"), TTL, Utc::now()).await);
    }

    #[tokio::test]
    async fn lookup_error_fails_open() {
        let store = store_with_link_aged(ChronoDuration::hours(1));
        store.fail_reads();
        assert!(
            !should_skip(&store, &target("Curitiba", "PR", "VivaReal", "VENDA"), TTL, Utc::now())
                .await
        );
    }
}
