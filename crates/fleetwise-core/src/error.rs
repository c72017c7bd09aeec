use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetwiseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid site id: {0}")]
    InvalidSiteId(String),
}

impl FleetwiseError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            FleetwiseError::Config(_) => "CONFIG_ERROR",
            FleetwiseError::InvalidSiteId(_) => "INVALID_SITE_ID",
        }
    }
}

pub type Result<T> = std::result::Result<T, FleetwiseError>;
