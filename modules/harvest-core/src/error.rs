/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Invalid job request: {0}")]
    InvalidInput(String),

    #[error("Control '{selector}' not actionable: {reason}")]
    Navigation { selector: String, reason: String },

    #[error("Content session error: {0}")]
    Session(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl HarvestError {
    /// Job status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            HarvestError::InvalidInput(_) => 400,
            _ => 500,
        }
    }
}

impl From<webdriver_client::WebDriverError> for HarvestError {
    fn from(err: webdriver_client::WebDriverError) -> Self {
        HarvestError::Session(err.to_string())
    }
}
