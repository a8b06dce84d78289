//! The SDK context object and the flows built on top of the kernel.
//!
//! A [`DConnectSdk`] owns exactly one token store, one scope set, one event
//! listener registry and one WebSocket slot. Clones share that state, so a
//! handle can be moved into tasks freely.

pub mod auth;
pub mod dispatcher;
pub mod events;
pub mod launch;
pub mod services;
pub mod websocket;

use crate::core::config::SdkConfig;
use crate::core::errors::DConnectError;
use crate::core::kernel::{
    HttpTransport, ReqwestTransport, ResponseVerifier, RestExecutor, TransportConfig,
};
use crate::core::store::{CredentialStorage, FileStorage, MemoryStorage, TokenStore};
use crate::core::uri::UriBuilder;
use auth::ScopeSet;
use dispatcher::DispatchStats;
use events::EventRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use websocket::WebSocketChannel;

/// Device Connect client
#[derive(Clone)]
pub struct DConnectSdk {
    pub(crate) inner: Arc<SdkInner>,
}

pub(crate) struct SdkInner {
    pub(crate) config: SdkConfig,
    pub(crate) executor: RestExecutor,
    pub(crate) tokens: TokenStore,
    pub(crate) scopes: RwLock<ScopeSet>,
    pub(crate) registry: EventRegistry,
    pub(crate) channel: WebSocketChannel,
    /// Serialises authorization runs so concurrent failures share one result
    pub(crate) auth_gate: tokio::sync::Mutex<()>,
    pub(crate) hmac_key: RwLock<Option<Arc<ResponseVerifier>>>,
    pub(crate) stats: DispatchStats,
}

impl std::fmt::Debug for DConnectSdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DConnectSdk")
            .field("config", &self.inner.config)
            .field("tokens", &self.inner.tokens)
            .field("websocket", &self.websocket_state())
            .finish_non_exhaustive()
    }
}

/// Builder for [`DConnectSdk`]
pub struct DConnectSdkBuilder {
    config: SdkConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    storage: Option<Arc<dyn CredentialStorage>>,
}

impl DConnectSdkBuilder {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            transport: None,
            storage: None,
        }
    }

    /// Replace the reqwest transport
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the storage selected by `storage_path`
    pub fn with_storage(mut self, storage: Arc<dyn CredentialStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the SDK, loading stored credentials for the configured application
    pub async fn build(self) -> Result<DConnectSdk, DConnectError> {
        let config = self.config;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                &TransportConfig::default().with_timeout(config.timeout_seconds),
            )?),
        };
        let storage: Arc<dyn CredentialStorage> = match (self.storage, &config.storage_path) {
            (Some(storage), _) => storage,
            (None, Some(path)) => Arc::new(FileStorage::new(path)),
            (None, None) => Arc::new(MemoryStorage::new()),
        };

        let executor = RestExecutor::new(transport, config.extended_origin.clone())
            .with_timeout(Duration::from_secs(config.timeout_seconds));
        let tokens = TokenStore::load(config.app_name.clone(), storage).await;
        let scopes = config
            .scopes
            .as_ref()
            .map_or_else(ScopeSet::defaults, |s| ScopeSet::new(s.iter().cloned()));
        let registry = EventRegistry::new(config.event_matching);

        Ok(DConnectSdk {
            inner: Arc::new(SdkInner {
                config,
                executor,
                tokens,
                scopes: RwLock::new(scopes),
                registry,
                channel: WebSocketChannel::default(),
                auth_gate: tokio::sync::Mutex::new(()),
                hmac_key: RwLock::new(None),
                stats: DispatchStats::default(),
            }),
        })
    }
}

impl DConnectSdk {
    pub fn builder(config: SdkConfig) -> DConnectSdkBuilder {
        DConnectSdkBuilder::new(config)
    }

    /// SDK with the default transport and storage
    pub async fn new(config: SdkConfig) -> Result<Self, DConnectError> {
        DConnectSdkBuilder::new(config).build().await
    }

    pub fn config(&self) -> &SdkConfig {
        &self.inner.config
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.tokens.access_token()
    }

    pub fn client_id(&self) -> Option<String> {
        self.inner.tokens.client_id()
    }

    /// A request target on the configured gateway, seeded with the stored token
    pub fn uri_builder(&self) -> UriBuilder {
        UriBuilder::new(&self.inner.config, self.access_token().as_deref())
    }

    /// Install the key the manager signs responses with; `None` or an empty key disables checks.
    pub fn set_hmac_key(&self, key: Option<String>) {
        *self.inner.hmac_key.write() = key
            .filter(|k| !k.is_empty())
            .map(|k| Arc::new(ResponseVerifier::new(k)));
    }

    /// Whether a response HMAC check applies to the next request
    pub fn is_response_authentication_active(&self) -> bool {
        self.verifier().is_some()
    }

    pub(crate) fn verifier(&self) -> Option<Arc<ResponseVerifier>> {
        if !self.inner.config.anti_spoofing {
            return None;
        }
        self.inner.hmac_key.read().clone()
    }
}
