use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A fault returned by the remote store, carried as received.
///
/// `code` and `exception` together identify the fault class; `message` is
/// free text for humans. The throttle detector matches on the first two and
/// never on the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFault {
    pub code: String,
    pub exception: String,
    pub message: String,
}

impl StoreFault {
    pub fn new(code: &str, exception: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            exception: exception.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.exception, self.message)
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Store fault: {0}")]
    Remote(StoreFault),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("List '{0}' not found")]
    ListNotFound(String),

    #[error("Item {1} not found in list '{0}'")]
    ItemNotFound(String, String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

impl FetchError {
    /// The fault payload, if this error came back from the store.
    pub fn store_fault(&self) -> Option<&StoreFault> {
        match self {
            Self::Remote(fault) => Some(fault),
            _ => None,
        }
    }
}
