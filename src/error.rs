//! Typed error hierarchy. Every fallible operation in this crate returns
//! `Result<T, WftsError>` (or a narrower error that converts into it via `?`
//! at the module boundary).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WftsError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("key not found")]
    KvNotFound,

    #[error("kv io error: {0}")]
    KvIo(String),

    #[error("kv serialization error: {0}")]
    KvSerialization(String),

    #[error("transaction too large: {0} entries")]
    KvTransactionTooLarge(usize),

    #[error("transient http error: {0}")]
    HttpTransient(String),

    #[error("permanent http error: {0}")]
    HttpPermanent(String),

    #[error("page already indexed as a near-duplicate")]
    DuplicatePage,

    #[error("page is a sitemap, not a document")]
    SitemapPage,

    #[error("query produced no usable tokens")]
    EmptyTokens,

    #[error("operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for WftsError {
    fn from(e: std::io::Error) -> Self {
        WftsError::KvIo(e.to_string())
    }
}

impl From<serde_json::Error> for WftsError {
    fn from(e: serde_json::Error) -> Self {
        WftsError::KvSerialization(e.to_string())
    }
}

impl From<sled::Error> for WftsError {
    fn from(e: sled::Error) -> Self {
        WftsError::KvIo(e.to_string())
    }
}

impl From<reqwest::Error> for WftsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            WftsError::HttpTransient(e.to_string())
        } else {
            WftsError::HttpPermanent(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, WftsError>;
