use thiserror::Error;

pub type Result<T> = std::result::Result<T, EspnError>;

#[derive(Debug, Clone, Error)]
pub enum EspnError {
    /// Timeouts, connection failures, HTTP 429 and 5xx. Retried by the client.
    #[error("Transient network error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transient { status: Option<u16>, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous lookup for {query:?}: {candidates} candidate(s), none scoped to mma")]
    Ambiguous { query: String, candidates: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Client setup failed: {0}")]
    Setup(String),
}

impl EspnError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EspnError::Transient { .. })
    }
}

impl From<serde_json::Error> for EspnError {
    fn from(err: serde_json::Error) -> Self {
        EspnError::Parse(err.to_string())
    }
}
