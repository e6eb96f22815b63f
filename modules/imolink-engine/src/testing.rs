// Test mocks for the discovery engine.
//
// Four mocks matching the trait boundaries:
// - MockFetcher (PageFetcher): URL to MockPage map
// - MockAgent (AgentRunner): canned AgentRun transcript
// - MemStore (ReferenceStore + LinkStore): stateful in-memory store
// - StubStrategy (DiscoveryStrategy): scripted outcome with call count
//
// Plus helpers for building reference rows and targets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use agent_client::AgentRun;
use browserless_client::error::{BrowserlessError, Result as FetchResult};
use browserless_client::PageLink;
use imolink_common::types::{
    CycleStats, DiscoveredLink, Discovery, DiscoveryTarget, LinkKey, LocalityRef, NewLink,
    NewLogEntry, OperationType, Platform, UpsertOutcome,
};
use imolink_common::ImolinkError;
use imolink_store::{LinkStore, ReferenceStore};

use crate::strategies::{DiscoveryStrategy, StrategyFailure};
use crate::traits::{AgentRunner, PageFetcher, PageHandle};

// ---------------------------------------------------------------------------
// Reference-row helpers
// ---------------------------------------------------------------------------

pub fn locality(id: i32, name: &str, state_abbr: &str) -> LocalityRef {
    LocalityRef {
        locality_id: id,
        locality_name: name.to_string(),
        state_id: 1,
        state_name: "Paraná".to_string(),
        state_abbr: state_abbr.to_string(),
    }
}

pub fn platform(id: i32, name: &str) -> Platform {
    let base_url = match name {
        "VivaReal" | "VIVA-REAL" => "https://www.vivareal.com.br/".to_string(),
        "ZAP" => "https://www.zapimoveis.com.br/".to_string(),
        other => format!("https://www.{}.com.br/", other.to_lowercase()),
    };
    Platform {
        id,
        name: name.to_string(),
        base_url,
        active: true,
    }
}

pub fn operation(id: i32, name: &str) -> OperationType {
    OperationType {
        id,
        name: name.to_string(),
    }
}

pub fn target(locality_name: &str, state_abbr: &str, platform_name: &str, op: &str) -> DiscoveryTarget {
    DiscoveryTarget {
        locality: locality(1, locality_name, state_abbr),
        platform: platform(1, platform_name),
        operation: operation(1, op),
    }
}

// ---------------------------------------------------------------------------
// MockPage / MockFetcher
// ---------------------------------------------------------------------------

/// Scripted page handle. Builder pattern: `.title()`, `.meta()`,
/// `.texts()`, `.links()`, `.eval_result()`.
#[derive(Clone, Default)]
pub struct MockPage {
    final_url: String,
    title: String,
    meta: HashMap<String, String>,
    texts: HashMap<String, Vec<String>>,
    links: HashMap<String, Vec<PageLink>>,
    eval: Option<Value>,
}

impl MockPage {
    pub fn new(final_url: &str) -> Self {
        Self {
            final_url: final_url.to_string(),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn meta(mut self, property: &str, content: &str) -> Self {
        self.meta.insert(property.to_string(), content.to_string());
        self
    }

    pub fn texts(mut self, css: &str, texts: &[&str]) -> Self {
        self.texts
            .insert(css.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn links(mut self, css: &str, links: &[(&str, &str)]) -> Self {
        self.links.insert(
            css.to_string(),
            links
                .iter()
                .map(|(href, text)| PageLink {
                    href: href.to_string(),
                    text: text.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn eval_result(mut self, value: Value) -> Self {
        self.eval = Some(value);
        self
    }
}

#[async_trait]
impl PageHandle for MockPage {
    fn final_url(&self) -> &str {
        &self.final_url
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn meta_content(&self, property: &str) -> Option<String> {
        self.meta.get(property).cloned()
    }

    fn select_texts(&self, css: &str) -> Vec<String> {
        self.texts.get(css).cloned().unwrap_or_default()
    }

    fn select_links(&self, css: &str) -> Vec<PageLink> {
        self.links.get(css).cloned().unwrap_or_default()
    }

    async fn evaluate(&self, _expression: &str) -> FetchResult<Value> {
        Ok(self.eval.clone().unwrap_or(Value::Null))
    }
}

/// HashMap-based fetcher. Unregistered URLs time out, which is also how
/// a dead renderer presents in production.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, MockPage>>,
    opened: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn on_open(&self, url: &str, page: MockPage) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), page);
    }

    /// Every URL opened, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn open(&self, url: &str) -> FetchResult<Box<dyn PageHandle>> {
        self.opened.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().get(url) {
            Some(page) => Ok(Box::new(page.clone())),
            None => Err(BrowserlessError::NavigationTimeout(30)),
        }
    }
}

// ---------------------------------------------------------------------------
// MockAgent
// ---------------------------------------------------------------------------

pub struct MockAgent {
    run: AgentRun,
    tasks: Mutex<Vec<String>>,
}

impl MockAgent {
    pub fn with_run(run: AgentRun) -> Self {
        Self {
            run,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn tasks(&self) -> Vec<String> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRunner for MockAgent {
    async fn run_task(&self, task: &str, _max_steps: u32) -> agent_client::Result<AgentRun> {
        self.tasks.lock().unwrap().push(task.to_string());
        Ok(self.run.clone())
    }
}

// ---------------------------------------------------------------------------
// MemStore
// ---------------------------------------------------------------------------

/// Stateful in-memory store implementing both store traits, with knobs
/// for simulating read failures, write outages, and per-key conflicts.
#[derive(Default)]
pub struct MemStore {
    localities: Mutex<Vec<LocalityRef>>,
    platforms: Mutex<Vec<Platform>>,
    operations: Mutex<Vec<OperationType>>,
    links: Mutex<HashMap<LinkKey, DiscoveredLink>>,
    log: Mutex<Vec<NewLogEntry>>,
    cycles: Mutex<Vec<CycleStats>>,
    next_id: AtomicI32,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_log: AtomicBool,
    conflict_key: Mutex<Option<LinkKey>>,
}

impl MemStore {
    pub fn with_reference(
        localities: Vec<LocalityRef>,
        platforms: Vec<Platform>,
        operations: Vec<OperationType>,
    ) -> Self {
        let store = Self::default();
        *store.localities.lock().unwrap() = localities;
        *store.platforms.lock().unwrap() = platforms;
        *store.operations.lock().unwrap() = operations;
        store
    }

    /// Every store read fails until reset. Covers the fail-open paths.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Every store write fails until reset. Simulates a store outage.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Only the audit log breaks; link writes keep working.
    pub fn fail_log(&self) {
        self.fail_log.store(true, Ordering::SeqCst);
    }

    /// Upserts for exactly this key fail with a conflict.
    pub fn conflict_on(&self, key: LinkKey) {
        *self.conflict_key.lock().unwrap() = Some(key);
    }

    /// Insert a link row with an explicit creation time, bypassing the
    /// failure knobs. For seeding freshness scenarios.
    pub fn seed_link_at(&self, key: &LinkKey, link: NewLink, at: DateTime<Utc>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.links.lock().unwrap().insert(
            *key,
            DiscoveredLink {
                id,
                url: link.url,
                platform_id: key.platform_id,
                operation_type_id: key.operation_type_id,
                state_id: key.state_id,
                locality_id: key.locality_id,
                district_id: None,
                search_term: link.search_term,
                result_position: link.result_position,
                status: link.status.to_string(),
                processed: false,
                created_at: at,
                updated_at: None,
            },
        );
    }

    pub fn link(&self, key: &LinkKey) -> Option<DiscoveredLink> {
        self.links.lock().unwrap().get(key).cloned()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub fn log_entries(&self) -> Vec<NewLogEntry> {
        self.log.lock().unwrap().clone()
    }

    pub fn recorded_cycles(&self) -> Vec<CycleStats> {
        self.cycles.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReferenceStore for MemStore {
    async fn active_localities(&self) -> Result<Vec<LocalityRef>, ImolinkError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ImolinkError::StoreUnavailable("reads disabled".into()));
        }
        Ok(self.localities.lock().unwrap().clone())
    }

    async fn active_platforms(&self) -> Result<Vec<Platform>, ImolinkError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ImolinkError::StoreUnavailable("reads disabled".into()));
        }
        Ok(self.platforms.lock().unwrap().clone())
    }

    async fn operation_types(&self) -> Result<Vec<OperationType>, ImolinkError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ImolinkError::StoreUnavailable("reads disabled".into()));
        }
        Ok(self.operations.lock().unwrap().clone())
    }
}

#[async_trait]
impl LinkStore for MemStore {
    async fn find_link(&self, key: &LinkKey) -> Result<Option<DiscoveredLink>, ImolinkError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ImolinkError::StoreUnavailable("reads disabled".into()));
        }
        Ok(self.links.lock().unwrap().get(key).cloned())
    }

    async fn upsert_link(
        &self,
        key: &LinkKey,
        link: &NewLink,
    ) -> Result<UpsertOutcome, ImolinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ImolinkError::StoreUnavailable("writes disabled".into()));
        }
        if self.conflict_key.lock().unwrap().as_ref() == Some(key) {
            return Err(ImolinkError::PersistenceConflict(format!(
                "unknown reference combination {key:?}"
            )));
        }

        let mut links = self.links.lock().unwrap();
        if let Some(existing) = links.get_mut(key) {
            existing.url = link.url.clone();
            existing.search_term = link.search_term.clone();
            existing.result_position = link.result_position;
            existing.status = link.status.to_string();
            existing.updated_at = Some(Utc::now());
            Ok(UpsertOutcome::Updated)
        } else {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            links.insert(
                *key,
                DiscoveredLink {
                    id,
                    url: link.url.clone(),
                    platform_id: key.platform_id,
                    operation_type_id: key.operation_type_id,
                    state_id: key.state_id,
                    locality_id: key.locality_id,
                    district_id: None,
                    search_term: link.search_term.clone(),
                    result_position: link.result_position,
                    status: link.status.to_string(),
                    processed: false,
                    created_at: Utc::now(),
                    updated_at: None,
                },
            );
            Ok(UpsertOutcome::Inserted)
        }
    }

    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), ImolinkError> {
        if self.fail_writes.load(Ordering::SeqCst) || self.fail_log.load(Ordering::SeqCst) {
            return Err(ImolinkError::StoreUnavailable("writes disabled".into()));
        }
        self.log.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn record_cycle(&self, stats: &CycleStats) -> Result<(), ImolinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ImolinkError::StoreUnavailable("writes disabled".into()));
        }
        self.cycles.lock().unwrap().push(stats.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StubStrategy
// ---------------------------------------------------------------------------

type StubOutcome =
    Box<dyn Fn(&DiscoveryTarget) -> Result<Discovery, StrategyFailure> + Send + Sync>;

/// Scripted strategy with a call counter, for orchestration tests.
pub struct StubStrategy {
    name: &'static str,
    outcome: StubOutcome,
    calls: AtomicUsize,
}

impl StubStrategy {
    pub fn with(
        name: &'static str,
        outcome: impl Fn(&DiscoveryTarget) -> Result<Discovery, StrategyFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            outcome: Box::new(outcome),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always succeeds with the target's constructed URL.
    pub fn succeeding(name: &'static str) -> Self {
        Self::with(name, |target| {
            Ok(Discovery {
                url: target.default_url(),
                title: format!("Imóveis em {}", target.locality.locality_name),
                item_count: Some("100 imóveis".to_string()),
                search_term: "stub".to_string(),
                result_position: 1,
            })
        })
    }

    pub fn failing(name: &'static str) -> Self {
        Self::with(name, |_| {
            Err(StrategyFailure::Mismatch("scripted failure".into()))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoveryStrategy for StubStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn discover(&self, target: &DiscoveryTarget) -> Result<Discovery, StrategyFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)(target)
    }
}
