/// Domain-specific error types for the pricing and analytics engine.
/// The core never masks a failure with a default value:
/// - bad inputs are rejected before any formula runs
/// - short histories are reported, not padded
/// - collaborator failures propagate to the caller, which owns any fallback
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("data source error: {0}")]
    DataSource(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EngineError::DataSource(format!("request timed out: {e}"))
        } else {
            EngineError::DataSource(format!("request failed: {e}"))
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::DataSource(format!("malformed payload: {e}"))
    }
}

impl From<smartcore::error::Failed> for EngineError {
    fn from(e: smartcore::error::Failed) -> Self {
        EngineError::Model(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
