use thiserror::Error;

/// Errors raised while loading configuration or parsing user input.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid number range: {0}")]
    InvalidRange(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidRange(_) => "invalid_range",
            Self::Io(_) => "io",
        }
    }
}
