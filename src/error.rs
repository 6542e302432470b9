//! Error types for shellport operations.

use std::time::Duration;

use thiserror::Error;

use crate::schema::ValidationError;

/// Main error type for shellport operations
#[derive(Error, Debug)]
pub enum ShellportError {
    /// A tool with this name is already registered
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    /// No tool with this name is registered
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments for a tool failed schema validation
    #[error("invalid arguments for tool '{0}': {1}")]
    InvalidArguments(String, ValidationError),

    /// The interpreter executable could not be started
    #[error("failed to launch '{0}': {1}")]
    ProcessLaunch(String, String),

    /// The interpreter started but the command failed
    #[error("{0}")]
    ProcessExecution(String),

    /// The interpreter did not finish within the configured timeout
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// MCP transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for shellport operations
pub type Result<T> = std::result::Result<T, ShellportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tool_display() {
        let err = ShellportError::DuplicateTool("get-file-info".to_string());
        assert_eq!(err.to_string(), "duplicate tool name: get-file-info");
    }

    #[test]
    fn test_invalid_arguments_display() {
        let err = ShellportError::InvalidArguments(
            "execute-powershell".to_string(),
            ValidationError::MissingParameter("command".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "invalid arguments for tool 'execute-powershell': missing required parameter 'command'"
        );
    }

    #[test]
    fn test_launch_display() {
        let err = ShellportError::ProcessLaunch("pwsh".to_string(), "not found".to_string());
        assert_eq!(err.to_string(), "failed to launch 'pwsh': not found");
    }

    #[test]
    fn test_timeout_display() {
        let err = ShellportError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "command timed out after 30s");
    }
}
