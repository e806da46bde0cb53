//! Error types for RulesForge.
//!
//! Library crates use [`RulesForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all RulesForge operations.
#[derive(Debug, thiserror::Error)]
pub enum RulesForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Document header or body could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A category's input directory does not exist.
    #[error("category input not found: {path:?}")]
    MissingInput { path: PathBuf },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RulesForgeError>;

impl RulesForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Flag a category whose input directory is absent.
    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RulesForgeError::config("unknown output mode");
        assert_eq!(err.to_string(), "config error: unknown output mode");

        let err = RulesForgeError::parse("unterminated frontmatter block");
        assert!(err.to_string().contains("unterminated frontmatter"));
    }

    #[test]
    fn missing_input_carries_path() {
        let err = RulesForgeError::missing_input("Rules/Classes");
        assert!(err.to_string().contains("Classes"));
    }
}
