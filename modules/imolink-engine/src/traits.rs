// Trait abstractions for the engine's external capabilities.
//
// PageFetcher wraps the Browserless rendering service; AgentRunner wraps
// the browsing-agent runner. Both enable deterministic testing with the
// mocks in `testing.rs`: no network, no renderer, no agent service.

use async_trait::async_trait;

use agent_client::{AgentClient, AgentRun};
use browserless_client::error::Result as FetchResult;
use browserless_client::{BrowserlessClient, Page, PageLink, PageOptions};
use imolink_common::Tuning;

// ---------------------------------------------------------------------------
// PageFetcher / PageHandle
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Render a page and return a handle over its DOM snapshot.
    async fn open(&self, url: &str) -> FetchResult<Box<dyn PageHandle>>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    fn final_url(&self) -> &str;

    fn title(&self) -> &str;

    fn meta_content(&self, property: &str) -> Option<String>;

    fn select_texts(&self, css: &str) -> Vec<String>;

    fn select_links(&self, css: &str) -> Vec<PageLink>;

    /// Run a JS expression in page context and return its JSON result.
    async fn evaluate(&self, expression: &str) -> FetchResult<serde_json::Value>;
}

/// Production fetcher: Browserless client plus the rendering options
/// derived from tuning (navigation timeout, settle delay).
pub struct BrowserlessFetcher {
    client: BrowserlessClient,
    opts: PageOptions,
}

impl BrowserlessFetcher {
    pub fn new(client: BrowserlessClient, tuning: &Tuning) -> Self {
        let opts = PageOptions {
            timeout: tuning.navigation_timeout,
            settle: tuning.settle_delay,
            ..PageOptions::default()
        };
        Self { client, opts }
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn open(&self, url: &str) -> FetchResult<Box<dyn PageHandle>> {
        let page = self.client.open(url, &self.opts).await?;
        Ok(Box::new(page))
    }
}

#[async_trait]
impl PageHandle for Page {
    fn final_url(&self) -> &str {
        Page::final_url(self)
    }

    fn title(&self) -> &str {
        Page::title(self)
    }

    fn meta_content(&self, property: &str) -> Option<String> {
        Page::meta_content(self, property)
    }

    fn select_texts(&self, css: &str) -> Vec<String> {
        Page::select_texts(self, css)
    }

    fn select_links(&self, css: &str) -> Vec<PageLink> {
        Page::select_links(self, css)
    }

    async fn evaluate(&self, expression: &str) -> FetchResult<serde_json::Value> {
        Page::evaluate(self, expression).await
    }
}

// ---------------------------------------------------------------------------
// AgentRunner
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run_task(&self, task: &str, max_steps: u32) -> agent_client::Result<AgentRun>;
}

#[async_trait]
impl AgentRunner for AgentClient {
    async fn run_task(&self, task: &str, max_steps: u32) -> agent_client::Result<AgentRun> {
        AgentClient::run_task(self, task, max_steps).await
    }
}
