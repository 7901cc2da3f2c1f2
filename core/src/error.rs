use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Payout for agent '{agent_id}' in period '{period}' is already batched")]
    ConcurrencyConflict { agent_id: String, period: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Whether a scheduled job may retry this failure on its next run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

pub type CompResult<T> = Result<T, CompError>;
