//! Error types for RobotCLI
//!
//! A single error enum covers every layer of the crate. Capability-level
//! variants (`Tool`, `InvalidArguments`, `ToolNotFound`) never escape the
//! dispatcher; they are rendered to text for the model. The remaining
//! variants end the current turn and are reported to the user.

use thiserror::Error;

/// The main error type for RobotCLI operations.
#[derive(Error, Debug)]
pub enum RobotError {
    /// I/O errors from filesystem operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A capability failed while executing
    #[error("{0}")]
    Tool(String),

    /// Arguments did not match the capability's declared parameters
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Requested capability is not registered
    #[error("Function {0} not implemented.")]
    ToolNotFound(String),

    /// Network, timeout or remote failure talking to the model
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model replied with a shape the current state cannot accept
    #[error("Unexpected model reply: {0}")]
    UnexpectedReply(String),

    /// A conversation invariant would have been broken
    #[error("Session error: {0}")]
    Session(String),

    /// The turn was cancelled by the user
    #[error("request cancelled")]
    Cancelled,
}

/// A specialized Result type for RobotCLI operations.
pub type Result<T> = std::result::Result<T, RobotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RobotError::Config("missing api key".into());
        assert_eq!(err.to_string(), "Configuration error: missing api key");

        let err = RobotError::ToolNotFound("frobnicate".into());
        assert_eq!(err.to_string(), "Function frobnicate not implemented.");

        let err = RobotError::Tool("permission denied".into());
        assert_eq!(err.to_string(), "permission denied");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RobotError = io.into();
        assert!(matches!(err, RobotError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
