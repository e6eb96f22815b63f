//! Agent fallback: hand the whole search-and-verify procedure to the
//! browsing agent and recover a JSON payload from its free-form output.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use agent_client::AgentRun;
use imolink_common::types::{Discovery, DiscoveryTarget};
use imolink_common::urls::{normalize_listing_url, platform_domain, url_on_domain};

use crate::strategies::{DiscoveryStrategy, StrategyFailure};
use crate::traits::AgentRunner;

pub struct AgentStrategy {
    runner: Arc<dyn AgentRunner>,
    max_steps: u32,
}

impl AgentStrategy {
    pub fn new(runner: Arc<dyn AgentRunner>, max_steps: u32) -> Self {
        Self { runner, max_steps }
    }

    fn task_for(target: &DiscoveryTarget) -> String {
        let domain = platform_domain(&target.platform.base_url);
        format!(
            "Open a web search engine and search for real-estate listings: \
             \"{platform} {operation} {locality} {state}\". \
             Open the top organic result that is on the {domain} domain, \
             confirm the page shows property listings for {locality}, and \
             report the final page address. \
             Answer with a JSON object only: \
             {{\"url\": \"<the listing page URL>\", \"title\": \"<the page title>\", \
             \"item_count\": \"<the listing total shown, or null>\"}}",
            platform = target.platform.name,
            operation = target.operation.slug(),
            locality = target.locality.locality_name,
            state = target.locality.state_abbr,
        )
    }

    /// Brace-delimited JSON object embedded in free text, if any.
    fn embedded_object(text: &str) -> Option<Value> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&text[start..=end]).ok()
    }

    /// Recover the payload, in priority order: the final result parsed
    /// whole, a brace-delimited substring of it, then each extracted
    /// content unit scanned newest first.
    fn recover_payload(run: &AgentRun) -> Option<Value> {
        if let Some(final_result) = run.final_result() {
            if let Ok(value) = serde_json::from_str::<Value>(final_result) {
                if value.is_object() {
                    return Some(value);
                }
            }
            if let Some(value) = Self::embedded_object(final_result) {
                return Some(value);
            }
        }

        run.extracted_content()
            .into_iter()
            .rev()
            .find_map(Self::embedded_object)
    }

    fn discovery_from(
        target: &DiscoveryTarget,
        payload: &Value,
    ) -> Result<Discovery, StrategyFailure> {
        let url = payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                StrategyFailure::MalformedAgentOutput("payload has no url field".into())
            })?;

        let url = normalize_listing_url(url)
            .map_err(|e| StrategyFailure::MalformedAgentOutput(format!("bad url: {e}")))?;

        let domain = platform_domain(&target.platform.base_url);
        if !url_on_domain(&url, &domain) {
            return Err(StrategyFailure::Mismatch(format!(
                "agent URL is off the platform domain: {url}"
            )));
        }

        let title = payload
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("{} - {}", target.platform.name, target.locality.locality_name)
            });

        let item_count = payload
            .get("item_count")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(Discovery {
            url,
            title,
            item_count,
            search_term: String::new(),
            result_position: 1,
        })
    }
}

#[async_trait]
impl DiscoveryStrategy for AgentStrategy {
    fn name(&self) -> &'static str {
        "agent"
    }

    async fn discover(&self, target: &DiscoveryTarget) -> Result<Discovery, StrategyFailure> {
        let task = Self::task_for(target);
        debug!(target = %target, max_steps = self.max_steps, "Delegating to browsing agent");

        let run = self.runner.run_task(&task, self.max_steps).await?;

        if !run.is_done() {
            return Err(StrategyFailure::Timeout(format!(
                "agent stopped before finishing ({} steps)",
                run.steps.len()
            )));
        }
        if !run.is_successful() {
            return Err(StrategyFailure::Mismatch(format!(
                "agent reported failure: {}",
                run.errors().join("; ")
            )));
        }

        let payload = Self::recover_payload(&run).ok_or_else(|| {
            StrategyFailure::MalformedAgentOutput("no JSON object in agent output".into())
        })?;

        let mut discovery = Self::discovery_from(target, &payload)?;
        discovery.search_term = task;
        info!(target = %target, url = %discovery.url, "Agent discovery succeeded");
        Ok(discovery)
    }
}
