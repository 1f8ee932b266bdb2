use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed page {page}: {reason}")]
    MalformedPage { page: usize, reason: String },

    #[error("Invalid posting date: {0}")]
    InvalidDate(String),

    #[error("Unknown grammar: {0}")]
    UnknownGrammar(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
