//! Error types for Fathom

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Criteria the compiler can reject before anything is sent to the store
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// The store could not be reached or did not answer in time
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store refused the compiled query
    #[error("Query rejected by store (HTTP {status}): {reason}")]
    QueryRejected { status: u16, reason: String },

    /// The store answered with a payload that does not fit the transaction contract
    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn invalid_criteria(msg: impl Into<String>) -> Self {
        Self::InvalidCriteria(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// True for failures that mean "could not talk to the store", as opposed
    /// to the store answering with something unusable
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
