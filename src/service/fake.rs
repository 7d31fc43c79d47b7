use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::{ClassificationService, ListAction, ServiceError};

/// In-process classification service that counts calls.
pub struct FakeService {
    calls: AtomicUsize,
    responses: Mutex<HashMap<String, Value>>,
    failing: Mutex<Vec<String>>,
    default: Value,
    online: bool,
    delay: Option<Duration>,
}

impl FakeService {
    pub fn answering(default: Value) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            default,
            online: true,
            delay: None,
        }
    }

    pub fn safe() -> Self {
        Self::answering(json!({ "risk": "safe", "score": 0.05, "reasons": [] }))
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::safe()
        }
    }

    /// Makes every `check_url` call take `delay` before answering.
    pub fn slow(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    pub fn respond(&self, url: &str, body: Value) {
        self.responses.lock().insert(url.to_string(), body);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().push(url.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClassificationService for FakeService {
    fn check_url<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, ServiceError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.lock().iter().any(|failing| failing == url) {
                return Err(ServiceError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }
            let body = self
                .responses
                .lock()
                .get(url)
                .cloned()
                .unwrap_or_else(|| self.default.clone());
            match super::protocol::error_field(&body) {
                Some(message) => Err(ServiceError::Rejected(message)),
                None => Ok(body),
            }
        })
    }

    fn submit<'a>(
        &'a self,
        action: ListAction,
        url: &'a str,
    ) -> BoxFuture<'a, Result<Value, ServiceError>> {
        Box::pin(async move {
            if self.failing.lock().iter().any(|failing| failing == url) {
                return Err(ServiceError::Rejected(format!("{action:?} refused")));
            }
            Ok(json!({ "ok": true }))
        })
    }

    fn is_online(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.online })
    }
}
