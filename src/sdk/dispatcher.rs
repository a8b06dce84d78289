use crate::core::errors::DConnectError;
use crate::core::kernel::RequestBody;
use crate::core::profiles::common;
use crate::core::uri::{replace_query_parameter, UriBuilder};
use crate::sdk::DConnectSdk;
use reqwest::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument, warn};

/// Where a request goes: an already built URI or a builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    Uri(String),
    Builder(UriBuilder),
}

impl RequestTarget {
    pub fn to_uri(&self) -> String {
        match self {
            Self::Uri(uri) => uri.clone(),
            Self::Builder(builder) => builder.build(),
        }
    }

    /// The target as a builder, parsing a plain URI when needed.
    pub fn to_builder(&self) -> Result<UriBuilder, DConnectError> {
        match self {
            Self::Uri(uri) => UriBuilder::parse(uri),
            Self::Builder(builder) => Ok(builder.clone()),
        }
    }
}

impl From<String> for RequestTarget {
    fn from(value: String) -> Self {
        Self::Uri(value)
    }
}

impl From<&str> for RequestTarget {
    fn from(value: &str) -> Self {
        Self::Uri(value.to_string())
    }
}

impl From<UriBuilder> for RequestTarget {
    fn from(value: UriBuilder) -> Self {
        Self::Builder(value)
    }
}

impl From<&UriBuilder> for RequestTarget {
    fn from(value: &UriBuilder) -> Self {
        Self::Builder(value.clone())
    }
}

/// Counters kept by the request dispatcher
#[derive(Debug, Default)]
pub struct DispatchStats {
    requests: AtomicU64,
    reauthorizations: AtomicU64,
    replays: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub requests: u64,
    pub reauthorizations: u64,
    pub replays: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            reauthorizations: self.reauthorizations.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
        }
    }
}

impl DConnectSdk {
    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.inner.stats.snapshot()
    }

    /// Send a request, re-authorizing and replaying on authorization errors
    ///
    /// Errors with a code in the authorization range trigger at most
    /// `max_auth_retries` re-authorizations; each replay carries the fresh
    /// access token in place of the stale one. Once the budget is spent the
    /// authorization error is returned as is. Every other failure, including a
    /// failed re-authorization, is reported as [`DConnectError::AccessFailed`]
    /// with the original error as its source.
    #[instrument(skip(self, target, headers, body), fields(method = %method))]
    pub async fn send_request(
        &self,
        method: Method,
        target: impl Into<RequestTarget>,
        headers: &[(String, String)],
        body: Option<RequestBody>,
    ) -> Result<Value, DConnectError> {
        let mut uri = target.into().to_uri();
        let mut attempts = 0u32;
        self.inner.stats.requests.fetch_add(1, Ordering::Relaxed);

        loop {
            let generation = self.inner.tokens.generation();
            let verifier = self.verifier();
            let result = self
                .inner
                .executor
                .execute(
                    method.clone(),
                    &uri,
                    headers,
                    body.clone(),
                    verifier.as_deref(),
                )
                .await;

            let error = match result {
                Ok(json) => return Ok(json),
                Err(e) => e,
            };

            if !error.is_authorization_class() {
                debug!(error = %error, "request failed");
                return Err(DConnectError::access_failed(error));
            }
            if attempts >= self.inner.config.max_auth_retries {
                warn!(error = %error, attempts, "authorization retries exhausted");
                return Err(error);
            }
            attempts += 1;

            debug!(code = error.error_code(), "authorization error, re-authorizing");
            self.append_scope(&uri);
            self.inner.stats.reauthorizations.fetch_add(1, Ordering::Relaxed);
            let token = self.reauthorize(generation).await?;

            uri = replace_query_parameter(&uri, common::PARAM_ACCESS_TOKEN, &token);
            self.inner.stats.replays.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn get(
        &self,
        target: impl Into<RequestTarget>,
        headers: &[(String, String)],
    ) -> Result<Value, DConnectError> {
        self.send_request(Method::GET, target, headers, None).await
    }

    pub async fn post(
        &self,
        target: impl Into<RequestTarget>,
        body: Option<RequestBody>,
        headers: &[(String, String)],
    ) -> Result<Value, DConnectError> {
        self.send_request(Method::POST, target, headers, body).await
    }

    pub async fn put(
        &self,
        target: impl Into<RequestTarget>,
        body: Option<RequestBody>,
        headers: &[(String, String)],
    ) -> Result<Value, DConnectError> {
        self.send_request(Method::PUT, target, headers, body).await
    }

    pub async fn delete(
        &self,
        target: impl Into<RequestTarget>,
        headers: &[(String, String)],
    ) -> Result<Value, DConnectError> {
        self.send_request(Method::DELETE, target, headers, None).await
    }
}
