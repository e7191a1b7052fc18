use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebDriverError>;

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("WebDriver error (status {status}, {error}): {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Timed out after {waited_ms}ms waiting for {selector}")]
    Timeout { selector: String, waited_ms: u128 },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for WebDriverError {
    fn from(err: reqwest::Error) -> Self {
        WebDriverError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for WebDriverError {
    fn from(err: serde_json::Error) -> Self {
        WebDriverError::Protocol(err.to_string())
    }
}
