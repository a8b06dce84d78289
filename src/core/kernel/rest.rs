use crate::core::errors::DConnectError;
use crate::core::kernel::verifier::{generate_random, ResponseVerifier};
use crate::core::profiles::common;
use crate::core::types::{HEADER_EXTENDED_ORIGIN, NONCE_BYTES, RESULT_OK};
use crate::core::uri::{add_request_parameter, UriBuilder};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, trace};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Sent verbatim
    Text(String),
    /// `multipart/form-data`; the transport chooses the boundary and content type
    Multipart(Vec<(String, String)>),
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RequestBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<UriBuilder> for RequestBody {
    fn from(value: UriBuilder) -> Self {
        Self::Text(value.build())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    /// Header names are lower-cased
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Moves a single request over the wire
///
/// Implementations only report transport-level outcomes; interpreting the
/// gateway envelope is left to [`RestExecutor`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DConnectError>;
}

/// Configuration for the reqwest transport
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            user_agent: "dConnectSDK-Rust/0.1".to_string(),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// [`HttpTransport`] backed by reqwest
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, DConnectError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DConnectError::InvalidParameters(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, uri = %request.uri))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DConnectError> {
        let mut builder = self.client.request(request.method, &request.uri);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        builder = match request.body {
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Multipart(parts)) => {
                let form = parts
                    .into_iter()
                    .fold(reqwest::multipart::Form::new(), |form, (k, v)| form.text(k, v));
                builder.multipart(form)
            }
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| DConnectError::NetworkError(format!("Request failed: {}", e)))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            DConnectError::NetworkError(format!("Failed to read response body: {}", e))
        })?;
        Ok(HttpResponse { status, body })
    }
}

/// Issues one request and enforces the gateway's `result` contract
#[derive(Clone)]
pub struct RestExecutor {
    transport: Arc<dyn HttpTransport>,
    extended_origin: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for RestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestExecutor")
            .field("extended_origin", &self.extended_origin)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, extended_origin: Option<String>) -> Self {
        Self {
            transport,
            extended_origin,
            timeout: Duration::from_secs(60),
        }
    }

    /// Advisory only; enforcement is up to the transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn prepare_headers(
        &self,
        headers: &[(String, String)],
        body: Option<&RequestBody>,
    ) -> Vec<(String, String)> {
        let mut prepared: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        let has_content_type = prepared.iter().any(|(k, _)| k == "content-type");

        if let Some(origin) = &self.extended_origin {
            prepared.push((HEADER_EXTENDED_ORIGIN.to_lowercase(), origin.clone()));
        }
        if !has_content_type && !body.is_some_and(RequestBody::is_multipart) {
            prepared.push(("content-type".to_string(), FORM_CONTENT_TYPE.to_string()));
        }
        prepared
    }

    #[instrument(skip(self, headers, body, verifier), fields(method = %method, uri = %uri))]
    pub async fn execute(
        &self,
        method: Method,
        uri: &str,
        headers: &[(String, String)],
        body: Option<RequestBody>,
        verifier: Option<&ResponseVerifier>,
    ) -> Result<Value, DConnectError> {
        let verifier = verifier.filter(|v| !v.is_empty());
        let nonce = verifier.map(|_| generate_random(NONCE_BYTES));
        let uri = match &nonce {
            Some(nonce) => add_request_parameter(uri, common::PARAM_NONCE, nonce),
            None => uri.to_string(),
        };

        let headers = self.prepare_headers(headers, body.as_ref());
        // Some clients never see a response to a body-less DELETE.
        let body = match body {
            None if method == Method::DELETE => Some(RequestBody::Text(String::new())),
            other => other,
        };

        let response = self
            .transport
            .send(HttpRequest {
                method,
                uri,
                headers,
                body,
            })
            .await?;

        trace!("Response body: {}", response.body);

        if response.status != 200 {
            return Err(DConnectError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }

        let json: Value = serde_json::from_str(&response.body)?;

        if let (Some(verifier), Some(nonce)) = (verifier, nonce.as_deref()) {
            let hmac = json.get(common::PARAM_HMAC).and_then(Value::as_str);
            if !verifier.check(nonce, hmac) {
                return Err(DConnectError::InvalidServer(
                    "The response was received from the invalid server.".to_string(),
                ));
            }
        }

        if json.get(common::PARAM_RESULT).and_then(Value::as_i64) == Some(RESULT_OK) {
            Ok(json)
        } else {
            Err(DConnectError::from_envelope(json))
        }
    }
}
