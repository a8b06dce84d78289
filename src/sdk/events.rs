use crate::core::errors::DConnectError;
use crate::core::kernel::EventFrame;
pub use crate::core::types::EventMatching;
use crate::core::uri::UriBuilder;
use crate::sdk::dispatcher::RequestTarget;
use crate::sdk::DConnectSdk;
use parking_lot::RwLock;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Identity of a registered listener
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    /// Lower-cased `/<api>/<profile>[/<interface>]/<attribute>`
    pub path: String,
    /// Service the listener is scoped to; `None` receives every service
    pub service_id: Option<String>,
    /// Session the subscription was made under; only tells registrations apart
    pub session_key: Option<String>,
}

impl EventKey {
    pub fn new(path: impl Into<String>, service_id: Option<String>) -> Self {
        Self {
            path: path.into().to_lowercase(),
            service_id,
            session_key: None,
        }
    }

    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    pub fn from_builder(builder: &UriBuilder) -> Self {
        let key = Self::new(
            builder.event_path(),
            builder.service_id().map(str::to_string),
        );
        match builder.session_key() {
            Some(session_key) => key.with_session_key(session_key),
            None => key,
        }
    }

    fn matches(&self, matching: EventMatching, path: &str, service_id: Option<&str>) -> bool {
        let path_matches = match matching {
            EventMatching::Exact => self.path == path,
            EventMatching::Containment => self.path.contains(path),
        };
        let service_matches = match (self.service_id.as_deref(), service_id) {
            (Some(registered), Some(received)) => registered == received,
            _ => true,
        };
        path_matches && service_matches
    }
}

pub type EventCallback = Arc<dyn Fn(&EventFrame) + Send + Sync>;

/// Event listener registry, at most one callback per key
pub struct EventRegistry {
    matching: EventMatching,
    entries: RwLock<HashMap<EventKey, EventCallback>>,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("matching", &self.matching)
            .field("len", &self.len())
            .finish()
    }
}

impl EventRegistry {
    pub fn new(matching: EventMatching) -> Self {
        Self {
            matching,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn matching(&self) -> EventMatching {
        self.matching
    }

    /// Register `callback`, replacing any callback already under `key`.
    pub fn insert(&self, key: EventKey, callback: EventCallback) {
        self.entries.write().insert(key, callback);
    }

    pub fn remove(&self, key: &EventKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Callbacks whose key matches `path`, optionally scoped to `service_id`.
    pub fn matching_callbacks(&self, path: &str, service_id: Option<&str>) -> Vec<EventCallback> {
        let path = path.to_lowercase();
        self.entries
            .read()
            .iter()
            .filter(|(key, _)| key.matches(self.matching, &path, service_id))
            .map(|(_, callback)| callback.clone())
            .collect()
    }

    /// Deliver `frame` to every matching callback; returns how many were called.
    pub fn dispatch(&self, api: &str, frame: &EventFrame) -> usize {
        let path = frame.path(api);
        let callbacks = self.matching_callbacks(&path, frame.service_id.as_deref());
        trace!(path = %path, listeners = callbacks.len(), "dispatching event");
        for callback in &callbacks {
            callback(frame);
        }
        callbacks.len()
    }
}

impl DConnectSdk {
    /// Subscribe to an event on the gateway and register `callback` for it
    ///
    /// The callback is registered only after the gateway accepted the
    /// subscription; a failed `PUT` leaves the registry untouched.
    pub async fn add_event_listener<F>(
        &self,
        target: impl Into<RequestTarget>,
        callback: F,
    ) -> Result<(), DConnectError>
    where
        F: Fn(&EventFrame) + Send + Sync + 'static,
    {
        let target = target.into();
        let key = EventKey::from_builder(&target.to_builder()?);
        self.send_request(Method::PUT, target, &[], None).await?;
        debug!(
            path = %key.path,
            service_id = ?key.service_id,
            session_key = ?key.session_key,
            "event listener added"
        );
        self.inner.registry.insert(key, Arc::new(callback));
        Ok(())
    }

    /// Unsubscribe from an event and drop its callback.
    pub async fn remove_event_listener(
        &self,
        target: impl Into<RequestTarget>,
    ) -> Result<(), DConnectError> {
        let target = target.into();
        let key = EventKey::from_builder(&target.to_builder()?);
        self.send_request(Method::DELETE, target, &[], None).await?;
        if self.inner.registry.remove(&key) {
            debug!(path = %key.path, service_id = ?key.service_id, "event listener removed");
        }
        Ok(())
    }

    pub fn event_listener_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn has_event_listener(
        &self,
        target: impl Into<RequestTarget>,
    ) -> Result<bool, DConnectError> {
        let key = EventKey::from_builder(&target.into().to_builder()?);
        Ok(self.inner.registry.contains(&key))
    }
}
