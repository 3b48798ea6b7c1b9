/// Shared error type used across all AgentBay SDK crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Transport(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("API error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Api {
        code: Option<String>,
        message: String,
    },

    #[error("validation: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
