//! Client for the browsing-agent service: submit a natural-language task,
//! get back the run transcript with the agent's final answer.

pub mod error;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{AgentError, Result};

/// Seconds of wall clock allowed per agent step when sizing the HTTP
/// timeout. Agent runs are slow by nature.
const SECS_PER_STEP: u64 = 30;

pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct TaskRequest<'a> {
    task: &'a str,
    max_steps: u32,
}

/// One step of an agent run, as reported by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentStep {
    #[serde(default)]
    pub extracted_content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The full transcript of a finished (or aborted) agent run.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentRun {
    pub status: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub final_result: Option<String>,
    #[serde(default)]
    pub steps: Vec<AgentStep>,
}

impl AgentRun {
    /// Whether the agent considers the task finished (as opposed to
    /// hitting the step limit or being cancelled).
    pub fn is_done(&self) -> bool {
        self.status == "done"
    }

    /// Finished and self-reported successful.
    pub fn is_successful(&self) -> bool {
        self.is_done() && self.success.unwrap_or(false)
    }

    /// The agent's final answer text, when it produced one.
    pub fn final_result(&self) -> Option<&str> {
        self.final_result.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Every non-empty piece of content the agent extracted along the
    /// way, in step order.
    pub fn extracted_content(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.extracted_content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.error.as_deref())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl AgentClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        }
    }

    /// Run a task to completion and return the transcript. Blocks for
    /// the whole run; the timeout scales with `max_steps`.
    pub async fn run_task(&self, task: &str, max_steps: u32) -> Result<AgentRun> {
        let budget_secs = (max_steps as u64) * SECS_PER_STEP;
        let url = format!("{}/task", self.base_url);

        debug!(max_steps, "Submitting agent task");

        let mut req = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(budget_secs))
            .json(&TaskRequest { task, max_steps });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(e, budget_secs))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Api { status, message });
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(json: &str) -> AgentRun {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn successful_run_exposes_final_result() {
        let r = run(
            r#"{"status":"done","success":true,"final_result":" https://example.com/venda/ ","steps":[]}"#,
        );
        assert!(r.is_successful());
        assert_eq!(r.final_result(), Some("https://example.com/venda/"));
    }

    #[test]
    fn step_limit_run_is_not_successful() {
        let r = run(r#"{"status":"max_steps","success":null,"steps":[]}"#);
        assert!(!r.is_done());
        assert!(!r.is_successful());
        assert_eq!(r.final_result(), None);
    }

    #[test]
    fn extracted_content_drops_empty_steps() {
        let r = run(
            r#"{"status":"done","success":true,"steps":[
                {"extracted_content":"found 12 listings"},
                {"extracted_content":"  "},
                {"error":"retry after captcha"},
                {"extracted_content":"https://example.com/x/"}
            ]}"#,
        );
        assert_eq!(r.extracted_content(), vec!["found 12 listings", "https://example.com/x/"]);
        assert_eq!(r.errors(), vec!["retry after captcha"]);
    }
}
