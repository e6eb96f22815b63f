//! Discovery strategies share one contract: a target goes in, a
//! validated candidate link or a typed failure comes out. The
//! orchestrator runs them in priority order and stops at the first
//! success; failures here are per-strategy, never cycle-fatal.

pub mod agent;
pub mod direct;
pub mod search;

use async_trait::async_trait;
use thiserror::Error;

use imolink_common::types::{Discovery, DiscoveryTarget};

pub use agent::AgentStrategy;
pub use direct::DirectStrategy;
pub use search::SearchStrategy;

#[derive(Debug, Error)]
pub enum StrategyFailure {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("no qualifying match: {0}")]
    Mismatch(String),

    #[error("agent output could not be parsed: {0}")]
    MalformedAgentOutput(String),
}

impl From<browserless_client::BrowserlessError> for StrategyFailure {
    fn from(err: browserless_client::BrowserlessError) -> Self {
        match err {
            browserless_client::BrowserlessError::NavigationTimeout(secs) => {
                StrategyFailure::Timeout(format!("navigation exceeded {secs}s"))
            }
            other => StrategyFailure::Navigation(other.to_string()),
        }
    }
}

impl From<agent_client::AgentError> for StrategyFailure {
    fn from(err: agent_client::AgentError) -> Self {
        match err {
            agent_client::AgentError::Timeout(secs) => {
                StrategyFailure::Timeout(format!("agent run exceeded {secs}s"))
            }
            other => StrategyFailure::Navigation(other.to_string()),
        }
    }
}

#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn discover(&self, target: &DiscoveryTarget) -> Result<Discovery, StrategyFailure>;
}
