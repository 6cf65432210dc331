use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Poll {0} not found")]
    PollNotFound(String),

    #[error("User {user_id} already responded to {poll_id}")]
    UserAlreadyResponded { user_id: i64, poll_id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Persisted question/answer payloads that no longer decode
    #[error("Invalid JSON data: {0}")]
    MalformedData(#[from] serde_json::Error),

    #[error("Invalid question index {0}")]
    InvalidQuestionIndex(String),

    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}
