use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("`{tool}` failed: {message}")]
    ToolError { tool: String, message: String },
    #[error("Invalid scheduler payload: {0}")]
    PayloadError(String),
    #[error("Convergence error: {0}")]
    ConvergenceError(String),
    #[error("Cancelled")]
    Cancelled,
}

impl HarnessError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolError {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::error::Error> for HarnessError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<base64::DecodeError> for HarnessError {
    fn from(e: base64::DecodeError) -> Self {
        Self::SerializationError(e.to_string())
    }
}
