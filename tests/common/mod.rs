#![allow(dead_code)]

use async_trait::async_trait;
use dconnect::core::kernel::{HttpRequest, HttpResponse, HttpTransport, ResponseVerifier};
use dconnect::DConnectError;
use parking_lot::Mutex;
use reqwest::Url;
use serde_json::{json, Value};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Test configuration utilities
pub struct TestConfig;

impl TestConfig {
    /// Check if tests against a running manager should run
    pub fn should_run_live_tests() -> bool {
        env::var("RUN_LIVE_TESTS").unwrap_or_default() == "true"
    }

    /// Get test timeout duration
    pub fn test_timeout_seconds() -> u64 {
        env::var("TEST_TIMEOUT_SECONDS")
            .unwrap_or_default()
            .parse()
            .unwrap_or(5)
    }

    pub fn timeout() -> Duration {
        Duration::from_secs(Self::test_timeout_seconds())
    }
}

/// Scripted in-process gateway behind the `HttpTransport` seam
///
/// Authorization issues `token-1`, `token-2`, ... and every other profile
/// only accepts the most recently issued token (any token while none was
/// issued and `accepted_token` is unset).
#[derive(Default)]
pub struct MockGateway {
    requests: Mutex<Vec<HttpRequest>>,
    issued: AtomicU64,
    accepted_token: Mutex<Option<String>>,
    grant_error: Mutex<Option<i32>>,
    token_error: Mutex<Option<i32>>,
    resource_error: Mutex<Option<i32>>,
    signing_key: Mutex<Option<String>>,
    services: Mutex<Vec<(String, Vec<String>)>>,
}

fn envelope_error(code: i32) -> Value {
    json!({ "result": 1, "errorCode": code, "errorMessage": format!("error {}", code) })
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every token other than `token` until a new one is issued.
    pub fn accept_only(self, token: &str) -> Self {
        *self.accepted_token.lock() = Some(token.to_string());
        self
    }

    pub fn fail_grant(self, code: i32) -> Self {
        *self.grant_error.lock() = Some(code);
        self
    }

    pub fn fail_access_token(self, code: i32) -> Self {
        *self.token_error.lock() = Some(code);
        self
    }

    pub fn fail_resources(self, code: i32) -> Self {
        *self.resource_error.lock() = Some(code);
        self
    }

    /// Sign responses to nonce-carrying requests with `hex_key`.
    pub fn sign_with(self, hex_key: &str) -> Self {
        *self.signing_key.lock() = Some(hex_key.to_string());
        self
    }

    pub fn with_service(self, id: &str, supports: &[&str]) -> Self {
        self.services
            .lock()
            .push((id.to_string(), supports.iter().map(|s| (*s).to_string()).collect()));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose path ends with `suffix`
    pub fn requests_to(&self, suffix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| {
                Url::parse(&r.uri)
                    .map(|u| u.path().ends_with(suffix))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn issued_tokens(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &HttpRequest) -> Value {
        let url = Url::parse(&request.uri).expect("mock received an invalid uri");
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        let path = url.path().to_string();

        let mut body = if path.ends_with("/authorization/grant") {
            match *self.grant_error.lock() {
                Some(code) => envelope_error(code),
                None => json!({ "result": 0, "clientId": "client-1" }),
            }
        } else if path.ends_with("/authorization/accesstoken") {
            match *self.token_error.lock() {
                Some(code) => envelope_error(code),
                None => {
                    let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                    let token = format!("token-{}", n);
                    *self.accepted_token.lock() = Some(token.clone());
                    json!({ "result": 0, "accessToken": token })
                }
            }
        } else if path.ends_with("/availability") {
            json!({ "result": 0, "version": "2.3.0" })
        } else if let Some(code) = *self.resource_error.lock() {
            envelope_error(code)
        } else {
            let accepted = self.accepted_token.lock().clone();
            match accepted {
                Some(expected) if param("accessToken").as_deref() != Some(expected.as_str()) => {
                    envelope_error(12)
                }
                _ if path.ends_with("/servicediscovery") => {
                    let services: Vec<Value> = self
                        .services
                        .lock()
                        .iter()
                        .map(|(id, _)| json!({ "id": id, "name": id, "online": true }))
                        .collect();
                    json!({ "result": 0, "services": services })
                }
                _ if path.ends_with("/serviceinformation") => {
                    let id = param("serviceId").unwrap_or_default();
                    let services = self.services.lock();
                    match services.iter().find(|(sid, _)| *sid == id) {
                        Some((_, supports)) => json!({ "result": 0, "supports": supports }),
                        None => envelope_error(6),
                    }
                }
                _ => json!({ "result": 0, "path": path }),
            }
        };

        if let (Some(key), Some(nonce)) = (self.signing_key.lock().clone(), param("nonce")) {
            let hmac = ResponseVerifier::new(key)
                .expected_hmac(&nonce)
                .expect("mock signing failed");
            body["hmac"] = Value::String(hmac);
        }
        body
    }
}

#[async_trait]
impl HttpTransport for MockGateway {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DConnectError> {
        let body = self.respond(&request);
        self.requests.lock().push(request);
        // Let concurrent callers interleave like they would on a real network.
        tokio::task::yield_now().await;
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }
}

/// Query parameter `name` of a recorded request
pub fn query_param(request: &HttpRequest, name: &str) -> Option<String> {
    Url::parse(&request.uri)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
