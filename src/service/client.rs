use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::config::ServiceConfig;

use super::{
    protocol::{error_field, ListAction, UrlPayload, CHECK_URL_PATH},
    ClassificationService, ServiceError,
};

/// HTTP client for the remote classification service.
#[derive(Clone)]
pub struct ClassifierClient {
    http: Client,
    base_url: Url,
}

impl ClassifierClient {
    /// `http` should carry the request timeout; every call relies on it to
    /// stay bounded.
    pub fn new(http: Client, config: &ServiceConfig) -> Self {
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|err| ServiceError::Malformed(format!("bad endpoint {path}: {err}")))
    }

    async fn post_url(&self, path: &str, url: &str) -> Result<Value, ServiceError> {
        let endpoint = self.endpoint(path)?;
        let response = self
            .http
            .post(endpoint)
            .json(&UrlPayload { url })
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let body = serde_json::from_str::<Value>(&raw).ok();

        if let Some(message) = body.as_ref().and_then(error_field) {
            return Err(ServiceError::Rejected(message));
        }
        if !status.is_success() {
            return Err(ServiceError::Status(status));
        }
        body.ok_or_else(|| ServiceError::Malformed("response body is not JSON".to_string()))
    }

    pub async fn check(&self, url: &str) -> Result<Value, ServiceError> {
        let body = self.post_url(CHECK_URL_PATH, url).await?;
        tracing::debug!(target: "service", url, "check-url answered");
        Ok(body)
    }

    pub async fn list_action(&self, action: ListAction, url: &str) -> Result<Value, ServiceError> {
        self.post_url(action.path(), url).await
    }

    pub async fn health(&self) -> bool {
        let response = self.http.get(self.base_url.clone()).send().await;
        match response {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(target: "service", status = %response.status(), "health probe failed");
                false
            }
            Err(err) => {
                tracing::warn!(target: "service", error = %err, "health probe failed");
                false
            }
        }
    }
}

impl ClassificationService for ClassifierClient {
    fn check_url<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, ServiceError>> {
        Box::pin(self.check(url))
    }

    fn submit<'a>(
        &'a self,
        action: ListAction,
        url: &'a str,
    ) -> BoxFuture<'a, Result<Value, ServiceError>> {
        Box::pin(self.list_action(action, url))
    }

    fn is_online(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.health())
    }
}
