use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Error, Debug)]
pub enum HarvestError {
    /// Feed source or blob storage unreachable, rate-limited or failing.
    #[error("I/O failure: {message}")]
    TransientIo { message: String, retryable: bool },

    /// A mapping path could not be resolved on a platform item (strict mode only).
    #[error("Cannot resolve `{path}` on {item_type}: {reason}")]
    AttributeResolution {
        item_type: String,
        path: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data inconsistency: {0}")]
    DataInconsistency(String),
}

impl HarvestError {
    pub fn transient(message: impl Into<String>) -> Self {
        HarvestError::TransientIo {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        HarvestError::TransientIo {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HarvestError::TransientIo { retryable: true, .. })
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(err: serde_json::Error) -> Self {
        HarvestError::DataInconsistency(err.to_string())
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let retryable = matches!(
            err.kind(),
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
        );
        HarvestError::TransientIo {
            message: err.to_string(),
            retryable,
        }
    }
}
