//! Persisting discovery outcomes. The link upsert is the consistency
//! unit; the audit log entry is best-effort and must never fail the
//! link write.

use std::sync::Arc;

use tracing::{info, warn};

use imolink_common::types::{
    Discovery, DiscoveryTarget, LinkStatus, NewLink, NewLogEntry, UpsertOutcome,
};
use imolink_common::ImolinkError;
use imolink_store::LinkStore;

pub struct Persister {
    store: Arc<dyn LinkStore>,
}

impl Persister {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }

    /// Upsert the discovered link and append the audit entry. Running
    /// this twice for the same (target, discovery) leaves one row.
    pub async fn persist_discovery(
        &self,
        target: &DiscoveryTarget,
        discovery: &Discovery,
        engine_used: &str,
    ) -> Result<UpsertOutcome, ImolinkError> {
        let link = NewLink {
            url: discovery.url.clone(),
            search_term: discovery.search_term.clone(),
            result_position: discovery.result_position,
            status: LinkStatus::Discovered,
        };
        let outcome = match self.store.upsert_link(&target.key(), &link).await {
            Ok(outcome) => outcome,
            // The attempt is still recorded; only the link row is not.
            Err(err @ ImolinkError::PersistenceConflict(_)) => {
                self.log_attempt(NewLogEntry {
                    engine_used: engine_used.to_string(),
                    query_or_task: discovery.search_term.clone(),
                    platform_id: target.platform.id,
                    locality_id: target.locality.locality_id,
                    links_found: 1,
                    links_saved: 0,
                    note: Some(err.to_string()),
                })
                .await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        info!(target = %target, url = %discovery.url, ?outcome, "Link persisted");

        self.log_attempt(NewLogEntry {
            engine_used: engine_used.to_string(),
            query_or_task: discovery.search_term.clone(),
            platform_id: target.platform.id,
            locality_id: target.locality.locality_id,
            links_found: 1,
            links_saved: 1,
            note: discovery.item_count.clone(),
        })
        .await;

        Ok(outcome)
    }

    /// All strategies failed: persist the deterministic template URL,
    /// flagged so downstream consumers can tell it apart from a
    /// discovered one, and log the attempt with zero counts.
    pub async fn persist_default(
        &self,
        target: &DiscoveryTarget,
    ) -> Result<String, ImolinkError> {
        let url = target.default_url();
        let link = NewLink {
            url: url.clone(),
            search_term: String::new(),
            result_position: 0,
            status: LinkStatus::Default,
        };
        if let Err(err) = self.store.upsert_link(&target.key(), &link).await {
            if let ImolinkError::PersistenceConflict(_) = &err {
                self.log_attempt(NewLogEntry {
                    engine_used: "default".to_string(),
                    query_or_task: url.clone(),
                    platform_id: target.platform.id,
                    locality_id: target.locality.locality_id,
                    links_found: 0,
                    links_saved: 0,
                    note: Some(err.to_string()),
                })
                .await;
            }
            return Err(err);
        }
        info!(target = %target, url = %url, "Default URL persisted");

        self.log_attempt(NewLogEntry {
            engine_used: "default".to_string(),
            query_or_task: url.clone(),
            platform_id: target.platform.id,
            locality_id: target.locality.locality_id,
            links_found: 0,
            links_saved: 0,
            note: Some("all strategies failed".to_string()),
        })
        .await;

        Ok(url)
    }

    async fn log_attempt(&self, entry: NewLogEntry) {
        if let Err(err) = self.store.append_log(&entry).await {
            warn!(error = %err, "Audit log append failed, link write already committed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{target, MemStore};

    fn sample_discovery(target: &DiscoveryTarget) -> Discovery {
        Discovery {
            url: target.default_url(),
            title: "Imóveis à venda em Araucária".into(),
            item_count: Some("1.234 imóveis".into()),
            search_term: "venda Araucária PR".into(),
            result_position: 1,
        }
    }

    #[tokio::test]
    async fn persisting_twice_leaves_one_row_and_advances_updated_at() {
        let store = Arc::new(MemStore::default());
        let persister = Persister::new(store.clone());
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let discovery = sample_discovery(&t);

        let first = persister.persist_discovery(&t, &discovery, "direct").await.unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);
        let row = store.link(&t.key()).unwrap();
        assert!(row.updated_at.is_none());

        let second = persister.persist_discovery(&t, &discovery, "direct").await.unwrap();
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.link_count(), 1);
        let row = store.link(&t.key()).unwrap();
        assert!(row.updated_at.is_some());
        assert_eq!(row.url, discovery.url);
    }

    #[tokio::test]
    async fn default_persist_logs_zero_counts() {
        let store = Arc::new(MemStore::default());
        let persister = Persister::new(store.clone());
        let t = target("Araucária", "PR", "VivaReal", "VENDA");

        let url = persister.persist_default(&t).await.unwrap();
        assert_eq!(url, "https://www.vivareal.com.br/venda/pr/araucaria/");
        assert_eq!(store.link(&t.key()).unwrap().status, "default");

        let log = store.log_entries();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].links_found, 0);
        assert_eq!(log[0].links_saved, 0);
    }

    #[tokio::test]
    async fn conflict_still_logs_the_attempt() {
        let store = Arc::new(MemStore::default());
        let persister = Persister::new(store.clone());
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let discovery = sample_discovery(&t);

        store.conflict_on(t.key());
        let err = persister.persist_discovery(&t, &discovery, "direct").await.unwrap_err();
        assert!(!err.is_cycle_fatal());
        assert_eq!(store.link_count(), 0);

        let log = store.log_entries();
        assert_eq!(log.len(), 1);
        assert_eq!((log[0].links_found, log[0].links_saved), (1, 0));
    }

    #[tokio::test]
    async fn log_failure_does_not_fail_the_link_write() {
        let store = Arc::new(MemStore::default());
        let persister = Persister::new(store.clone());
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let discovery = sample_discovery(&t);

        store.fail_log();
        let outcome = persister.persist_discovery(&t, &discovery, "direct").await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(store.link_count(), 1);
        assert!(store.log_entries().is_empty());
    }
}
