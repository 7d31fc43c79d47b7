mod client;
#[cfg(test)]
pub mod fake;
pub mod protocol;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub use client::ClassifierClient;
pub use protocol::ListAction;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("classification service timed out")]
    Timeout,
    #[error("classification service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("classification service returned HTTP {0}")]
    Status(StatusCode),
    #[error("classification service error: {0}")]
    Rejected(String),
    #[error("malformed classification response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.is_decode() {
            ServiceError::Malformed(err.to_string())
        } else {
            ServiceError::Transport(err)
        }
    }
}

/// The remote side of every scan. Implemented over HTTP by
/// [`ClassifierClient`]; tests substitute in-process fakes.
pub trait ClassificationService: Send + Sync {
    /// Raw `check-url` body. Fails on transport errors, non-2xx statuses and
    /// bodies carrying an `error` field.
    fn check_url<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, ServiceError>>;

    fn submit<'a>(
        &'a self,
        action: ListAction,
        url: &'a str,
    ) -> BoxFuture<'a, Result<Value, ServiceError>>;

    fn is_online(&self) -> BoxFuture<'_, bool>;
}
