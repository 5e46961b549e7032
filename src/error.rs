use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
