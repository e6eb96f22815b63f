use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent service network error: {0}")]
    Network(String),

    #[error("Agent service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Agent run exceeded {0}s")]
    Timeout(u64),
}

impl AgentError {
    pub(crate) fn from_reqwest(err: reqwest::Error, budget_secs: u64) -> Self {
        if err.is_timeout() {
            AgentError::Timeout(budget_secs)
        } else {
            AgentError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
