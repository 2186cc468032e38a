use thiserror::Error;

/// Main error type for the media-compositor library
#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors about individual input resources
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("Invalid parameters for resource #{index}: {details}")]
    InvalidParameters { index: usize, details: String },

    #[error("Failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },
}

/// Errors raised while turning a resource list into a filter graph
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("Resource list is empty")]
    EmptyResourceList,

    #[error("Video output needs at least one image or video resource")]
    NoVisualContent,

    #[error("Invalid output options: {details}")]
    InvalidOutputOptions { details: String },

    #[error("Invalid operation #{index}: {details}")]
    InvalidOperation { index: usize, details: String },
}

/// Errors from the external encoder and image tool processes
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Failed to launch {program}: {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("Process exited with {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    ProcessFailed { code: Option<i32>, stderr: String },

    #[error("{tool} is not installed or not on PATH")]
    NotInstalled { tool: String },

    #[error("Process did not finish within {seconds}s")]
    TimedOut { seconds: u64 },
}

/// Errors from the uploads/outputs file areas
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid file name: {name}")]
    InvalidFileName { name: String },

    #[error("File not found: {name}")]
    FileNotFound { name: String },

    #[error("Unknown storage area: {area}")]
    UnknownArea { area: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ComposerError
pub type Result<T> = std::result::Result<T, ComposerError>;

impl ComposerError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Shorthand for an `InvalidParameters` resource error
    pub fn invalid_resource<S: Into<String>>(index: usize, details: S) -> Self {
        ResourceError::InvalidParameters {
            index,
            details: details.into(),
        }
        .into()
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Resource(ResourceError::DownloadFailed { .. }) => true,
            Self::Encoder(EncoderError::TimedOut { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Resource(ResourceError::NotFound { path }) => {
                format!("Could not find '{}'. Please check the file exists.", path)
            }
            Self::Encoder(EncoderError::NotInstalled { tool }) => {
                format!("{} was not found. Install it or set its path in the configuration.", tool)
            }
            Self::Encoder(EncoderError::ProcessFailed { stderr, .. }) => {
                let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
                let tail: Vec<&str> = tail.into_iter().rev().collect();
                format!("Encoding failed:\n{}", tail.join("\n"))
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_failure_message_keeps_code() {
        let err: ComposerError = EncoderError::ProcessFailed {
            code: Some(1),
            stderr: "Invalid argument".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Encoder error: Process exited with 1: Invalid argument"
        );
    }

    #[test]
    fn test_user_message_shows_stderr_tail() {
        let stderr = (1..=8).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let err: ComposerError = EncoderError::ProcessFailed { code: Some(1), stderr }.into();
        let message = err.user_message();
        assert!(message.contains("line 8"));
        assert!(message.contains("line 4"));
        assert!(!message.contains("line 3"));
    }

    #[test]
    fn test_recoverable_errors() {
        let download: ComposerError = ResourceError::DownloadFailed {
            url: "http://example.com/a.png".to_string(),
            reason: "timeout".to_string(),
        }
        .into();
        assert!(download.is_recoverable());
        assert!(!ComposerError::from(CompositionError::EmptyResourceList).is_recoverable());
    }
}
